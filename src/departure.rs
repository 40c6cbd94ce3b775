use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delay::minutes_between;

/// Line code prefixes shown in the live view and counted by analytics:
/// trains, light rail, metro and the S-prefixed line families.
pub const TRACKED_LINE_PREFIXES: &[&str] = &["T", "L", "M", "S"];

/// One departure as reported by the departure monitor, after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDeparture {
    pub line: Option<String>,
    pub line_name: Option<String>,
    pub destination: Option<String>,
    pub operator: Option<String>,
    pub platform: Option<String>,
    #[serde(rename = "scheduled_dt")]
    pub scheduled: Option<DateTime<Utc>>,
    #[serde(rename = "estimated_dt")]
    pub estimated: Option<DateTime<Utc>>,
    pub delay_min: Option<f64>,
    pub realtime: bool,
}

impl NormalizedDeparture {
    /// Fills `delay_min` from the scheduled and estimated instants.
    pub fn compute_delay(&mut self) {
        self.delay_min = match (self.scheduled, self.estimated) {
            (Some(scheduled), Some(estimated)) => Some(minutes_between(scheduled, estimated)),
            _ => None,
        };
    }

    /// True if the line code starts with one of `prefixes`.
    pub fn is_on_line_family(&self, prefixes: &[&str]) -> bool {
        self.line
            .as_deref()
            .is_some_and(|line| prefixes.iter().any(|p| line.starts_with(p)))
    }
}

/// A departure as persisted: the normalized fields plus where and when it was
/// observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartureRecord {
    pub line: String,
    pub line_name: Option<String>,
    pub destination: Option<String>,
    pub operator: Option<String>,
    pub platform: Option<String>,
    pub scheduled: DateTime<Utc>,
    pub estimated: Option<DateTime<Utc>>,
    pub delay_min: Option<f64>,
    pub realtime: bool,
    pub stop_id: String,
    pub fetched_at: DateTime<Utc>,
}

impl DepartureRecord {
    /// Builds the persisted form of a departure.
    ///
    /// Returns `None` when the line code or the scheduled time is missing,
    /// since such a departure has no `(line, scheduled, stop_id)` key.
    pub fn from_departure(
        departure: &NormalizedDeparture,
        stop_id: &str,
        fetched_at: DateTime<Utc>,
    ) -> Option<Self> {
        Some(DepartureRecord {
            line: departure.line.clone()?,
            line_name: departure.line_name.clone(),
            destination: departure.destination.clone(),
            operator: departure.operator.clone(),
            platform: departure.platform.clone(),
            scheduled: departure.scheduled?,
            estimated: departure.estimated,
            delay_min: departure.delay_min,
            realtime: departure.realtime,
            stop_id: stop_id.to_string(),
            fetched_at,
        })
    }
}
