use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Url;
use tracing::debug;

use crate::error::UpstreamError;
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::parser::{DepartureMonitorResponse, parse_response};
use crate::services::DepartureMonitor;

pub const DEFAULT_BASE_URL: &str = "https://api.transport.nsw.gov.au/v1/tp/departure_mon";

/// Fixed part of every departure monitor query.
static STATIC_PARAMS: &[(&str, &str)] = &[
    ("outputFormat", "rapidJSON"),
    ("coordOutputFormat", "EPSG:4326"),
    ("type_dm", "stop"),
    ("departureMonitorMacro", "true"),
    ("TfNSWDM", "true"),
    ("version", "10.2.1.42"),
    ("mode", "direct"),
    ("numberOfResultsDeparture", "40"),
];

/// Client for the TfNSW Trip Planner `departure_mon` endpoint.
pub struct TfnswClient<C = ApiKey<BasicClient>> {
    http: C,
    base_url: Url,
}

impl TfnswClient {
    /// Creates a client that authenticates with `Authorization: apikey <key>`.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, UpstreamError> {
        let http = ApiKey::tfnsw(BasicClient::new()?, api_key)?;
        Self::with_http(http, base_url)
    }
}

impl<C: HttpClient> TfnswClient<C> {
    pub fn with_http(http: C, base_url: &str) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| UpstreamError::InvalidRequest(format!("base url '{base_url}': {e}")))?;
        Ok(Self { http, base_url })
    }

    /// Builds the request URL for `stop_id` at local time `at`
    /// (`itdDate` = `YYYYMMDD`, `itdTime` = `HHMM`).
    pub fn request_url(&self, stop_id: &str, at: NaiveDateTime) -> Result<Url, UpstreamError> {
        if stop_id.trim().is_empty() {
            return Err(UpstreamError::InvalidRequest("empty stop id".to_string()));
        }

        let date = at.format("%Y%m%d").to_string();
        let time = at.format("%H%M").to_string();

        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.extend_pairs(STATIC_PARAMS.iter().copied());
            query.append_pair("name_dm", stop_id);
            query.append_pair("itdDate", &date);
            query.append_pair("itdTime", &time);
        }
        Ok(url)
    }
}

#[async_trait]
impl<C: HttpClient> DepartureMonitor for TfnswClient<C> {
    #[tracing::instrument(skip(self))]
    async fn stop_events(
        &self,
        stop_id: &str,
        at: NaiveDateTime,
    ) -> Result<DepartureMonitorResponse, UpstreamError> {
        let url = self.request_url(stop_id, at)?;
        debug!(%at, "Requesting departure monitor");
        let bytes = fetch_bytes(&self.http, url).await?;
        parse_response(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    struct NoHttp;

    #[async_trait]
    impl HttpClient for NoHttp {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            unreachable!("request_url tests never send")
        }
    }

    fn client() -> TfnswClient<NoHttp> {
        TfnswClient::with_http(NoHttp, DEFAULT_BASE_URL).unwrap()
    }

    #[test]
    fn test_request_url_params() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(8, 5, 42)
            .unwrap();
        let url = client().request_url("200060", at).unwrap();

        assert!(url.as_str().starts_with(DEFAULT_BASE_URL));
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["outputFormat"], "rapidJSON");
        assert_eq!(params["coordOutputFormat"], "EPSG:4326");
        assert_eq!(params["type_dm"], "stop");
        assert_eq!(params["name_dm"], "200060");
        assert_eq!(params["departureMonitorMacro"], "true");
        assert_eq!(params["TfNSWDM"], "true");
        assert_eq!(params["version"], "10.2.1.42");
        assert_eq!(params["itdDate"], "20240307");
        assert_eq!(params["itdTime"], "0805");
        assert_eq!(params["mode"], "direct");
        assert_eq!(params["numberOfResultsDeparture"], "40");
        assert_eq!(params.len(), 11);
    }

    #[test]
    fn test_request_url_rejects_empty_stop() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap();
        assert!(matches!(
            client().request_url(" ", at),
            Err(UpstreamError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(TfnswClient::with_http(NoHttp, "not a url").is_err());
    }
}
