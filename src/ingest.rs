//! One stop's fetch, normalize, delay and persist cycle.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, error, info, warn};

use crate::departure::{DepartureRecord, NormalizedDeparture, TRACKED_LINE_PREFIXES};
use crate::error::{IngestError, StoreError, UpstreamError};
use crate::parser::normalize_events;
use crate::services::DepartureMonitor;
use crate::store::DepartureStore;

/// Outcome of one ingestion cycle.
#[derive(Debug)]
pub struct IngestReport {
    pub stop_id: String,
    /// Shared by every record written in this cycle.
    pub fetched_at: DateTime<Utc>,
    pub departures: Vec<NormalizedDeparture>,
    /// Stop events that could not be decoded and were dropped.
    pub skipped_events: usize,
    /// Rows inserted, or why the whole batch was discarded.
    pub persisted: Result<u64, StoreError>,
}

pub struct IngestPipeline {
    monitor: Arc<dyn DepartureMonitor>,
    store: DepartureStore,
}

impl IngestPipeline {
    pub fn new(monitor: Arc<dyn DepartureMonitor>, store: DepartureStore) -> Self {
        Self { monitor, store }
    }

    /// Runs a full cycle for `stop_id`.
    ///
    /// Only an upstream failure is returned as an error; a store failure is
    /// logged and reported in [`IngestReport::persisted`] so callers still get
    /// the fetched departures.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self, stop_id: &str) -> Result<IngestReport, UpstreamError> {
        let fetched_at = Utc::now();
        let (departures, skipped_events) =
            fetch_departures(self.monitor.as_ref(), stop_id).await?;

        let records: Vec<DepartureRecord> = departures
            .iter()
            .filter_map(|d| DepartureRecord::from_departure(d, stop_id, fetched_at))
            .collect();
        let keyless = departures.len() - records.len();
        if keyless > 0 {
            debug!(keyless, "Departures without line or scheduled time are not persisted");
        }

        let persisted = self.store.insert_batch(&records).await;
        match &persisted {
            Ok(inserted) => info!(
                departures = departures.len(),
                inserted,
                skipped = skipped_events,
                "Ingestion cycle complete"
            ),
            Err(e) => error!(
                error = %e,
                batch = records.len(),
                "Departure batch discarded"
            ),
        }

        Ok(IngestReport {
            stop_id: stop_id.to_string(),
            fetched_at,
            departures,
            skipped_events,
            persisted,
        })
    }

    /// Runs a cycle and returns the number of newly stored departures.
    pub async fn ingest(&self, stop_id: &str) -> Result<u64, IngestError> {
        let report = self.run_cycle(stop_id).await?;
        Ok(report.persisted?)
    }

    /// Fetches departures for a departure board without storing them.
    pub async fn live(&self, stop_id: &str) -> Result<Vec<NormalizedDeparture>, UpstreamError> {
        live_departures(self.monitor.as_ref(), stop_id).await
    }
}

/// Fetches the stop's upcoming events and turns them into departures with
/// delays filled in. Malformed events are logged and skipped; the second
/// value is how many.
pub async fn fetch_departures(
    monitor: &dyn DepartureMonitor,
    stop_id: &str,
) -> Result<(Vec<NormalizedDeparture>, usize), UpstreamError> {
    let at = Local::now().naive_local();
    let response = monitor.stop_events(stop_id, at).await?;

    let (mut departures, failures) = normalize_events(response.into_events());
    for failure in &failures {
        warn!(error = %failure, "Skipping stop event");
    }
    for departure in &mut departures {
        departure.compute_delay();
    }

    Ok((departures, failures.len()))
}

/// Departure board for a stop. Needs no store.
#[tracing::instrument(skip(monitor))]
pub async fn live_departures(
    monitor: &dyn DepartureMonitor,
    stop_id: &str,
) -> Result<Vec<NormalizedDeparture>, UpstreamError> {
    let (departures, _) = fetch_departures(monitor, stop_id).await?;
    Ok(live_view(departures))
}

/// Keeps tracked line families and orders by scheduled time, departures
/// without a scheduled time last.
pub fn live_view(mut departures: Vec<NormalizedDeparture>) -> Vec<NormalizedDeparture> {
    departures.retain(|d| d.is_on_line_family(TRACKED_LINE_PREFIXES));
    departures.sort_by(|a, b| match (a.scheduled, b.scheduled) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    departures
}
