//! Output rows of the analytics views.

use serde::Serialize;

/// Delay summary for one line code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineDelay {
    pub line: String,
    pub avg_delay_min: f64,
    pub total_trips: i64,
    pub delayed_trips: i64,
}

/// Delay summary for one line, with its on-time share.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorstLine {
    pub line: String,
    pub line_name: Option<String>,
    pub avg_delay_min: f64,
    pub total_trips: i64,
    pub delayed_trips: i64,
    pub on_time_pct: f64,
}

/// Delay summary for one hour of the local day (0-23).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyDelay {
    pub hour: i64,
    pub avg_delay_min: f64,
    pub total_trips: i64,
}
