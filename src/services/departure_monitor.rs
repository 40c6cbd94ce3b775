//! Trait for sources of raw stop events.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::UpstreamError;
use crate::parser::DepartureMonitorResponse;

/// Abstraction over a departure monitor provider (e.g., TfNSW Trip Planner).
#[async_trait]
pub trait DepartureMonitor: Send + Sync {
    /// Returns the upcoming stop events at `stop_id`, starting from the local
    /// wall-clock time `at`.
    async fn stop_events(
        &self,
        stop_id: &str,
        at: NaiveDateTime,
    ) -> Result<DepartureMonitorResponse, UpstreamError>;
}
