//! Delay analytics over the stored departure history.
//!
//! Every view is restricted to the tracked line families (see
//! [`DepartureFilter::tracked_lines`]) and reports averages rounded to two
//! decimals, with "no delay data" shown as 0.

pub mod aggregate;
pub mod types;
pub mod utility;

use chrono::FixedOffset;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{DepartureFilter, DepartureStore};
use types::{HourlyDelay, LineDelay, WorstLine};

/// Offset used for hour-of-day bucketing (Sydney daylight time).
pub const REPORTING_OFFSET_SECS: i32 = 11 * 3600;

pub struct Analytics {
    store: DepartureStore,
    offset: FixedOffset,
}

impl Analytics {
    pub fn new(store: DepartureStore) -> Self {
        Self {
            store,
            offset: reporting_offset(),
        }
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Average delay per line code, worst first.
    pub async fn by_line(&self, stop_id: Option<&str>) -> Result<Vec<LineDelay>, StoreError> {
        let rows = self.store.query_grouped_by_line(&filter(stop_id)).await?;
        debug!(groups = rows.len(), "Delays by line queried");
        Ok(aggregate::line_delays(rows))
    }

    /// Lines ranked by average delay, with their on-time percentage.
    pub async fn worst_lines(&self, stop_id: Option<&str>) -> Result<Vec<WorstLine>, StoreError> {
        let rows = self
            .store
            .query_grouped_by_line_and_name(&filter(stop_id))
            .await?;
        debug!(groups = rows.len(), "Worst lines queried");
        Ok(aggregate::worst_lines(rows))
    }

    /// Average delay per local hour of the scheduled departure.
    pub async fn by_hour(&self, stop_id: Option<&str>) -> Result<Vec<HourlyDelay>, StoreError> {
        let rows = self
            .store
            .query_grouped_by_hour(&filter(stop_id), self.offset)
            .await?;
        debug!(groups = rows.len(), offset = %self.offset, "Delays by hour queried");
        Ok(aggregate::hourly_delays(rows))
    }
}

pub fn reporting_offset() -> FixedOffset {
    FixedOffset::east_opt(REPORTING_OFFSET_SECS).expect("+11:00 is within +/-24h")
}

fn filter(stop_id: Option<&str>) -> DepartureFilter {
    match stop_id {
        Some(stop_id) => DepartureFilter::tracked_lines().at_stop(stop_id),
        None => DepartureFilter::tracked_lines(),
    }
}
