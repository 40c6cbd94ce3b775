//! Background task that ingests the configured stops on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, error, info};

use crate::ingest::IngestPipeline;

pub struct Poller {
    pipeline: Arc<IngestPipeline>,
    stops: Vec<String>,
    interval: Duration,
}

impl Poller {
    pub fn new(pipeline: Arc<IngestPipeline>, stops: Vec<String>, interval: Duration) -> Self {
        Self {
            pipeline,
            stops,
            interval,
        }
    }

    /// Runs one cycle per stop, one stop after the other. A failing stop is
    /// logged and does not stop the others. Returns the rows inserted.
    pub async fn poll_once(&self) -> u64 {
        let mut inserted = 0;

        for stop_id in &self.stops {
            match self.pipeline.ingest(stop_id).await {
                Ok(n) => inserted += n,
                Err(e) => error!(stop_id = %stop_id, error = %e, "Poll cycle failed"),
            }
        }

        inserted
    }

    /// Polls forever. The first round starts immediately; a round that
    /// overruns the interval delays the next one instead of stacking up.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut round = 0u64;
        loop {
            ticker.tick().await;
            round += 1;
            let span = tracing::info_span!("poll_round", round);
            let inserted = self.poll_once().instrument(span).await;
            info!(
                round,
                inserted,
                interval_secs = self.interval.as_secs(),
                "Waiting before next poll"
            );
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        info!(
            stops = ?self.stops,
            interval_secs = self.interval.as_secs(),
            "Starting departure poller"
        );
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;
    use crate::parser::DepartureMonitorResponse;
    use crate::services::DepartureMonitor;
    use crate::store::DepartureStore;
    use async_trait::async_trait;
    use chrono::NaiveDateTime;
    use serde_json::json;

    /// Serves one departure for stop "good" and fails for anything else.
    struct OneStopMonitor;

    #[async_trait]
    impl DepartureMonitor for OneStopMonitor {
        async fn stop_events(
            &self,
            stop_id: &str,
            _at: NaiveDateTime,
        ) -> Result<DepartureMonitorResponse, UpstreamError> {
            if stop_id != "good" {
                return Err(UpstreamError::InvalidRequest(format!("unknown stop {stop_id}")));
            }
            Ok(DepartureMonitorResponse::new(vec![json!({
                "transportation": { "disassembledName": "T2" },
                "departureTimePlanned": "2024-01-01T10:00:00Z",
            })]))
        }
    }

    #[tokio::test]
    async fn test_failing_stop_does_not_block_others() {
        let store = DepartureStore::in_memory().await.unwrap();
        let pipeline = Arc::new(IngestPipeline::new(Arc::new(OneStopMonitor), store.clone()));
        let poller = Poller::new(
            pipeline,
            vec!["bad".to_string(), "good".to_string()],
            Duration::from_secs(60),
        );

        assert_eq!(poller.poll_once().await, 1);
        assert_eq!(poller.poll_once().await, 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
