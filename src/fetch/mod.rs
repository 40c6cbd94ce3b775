mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use crate::error::UpstreamError;
use reqwest::Url;
use tracing::debug;

/// GETs `url` and returns the body bytes.
///
/// # Errors
///
/// A non-success status becomes [`UpstreamError::Status`] with the body text
/// kept verbatim.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    url: Url,
) -> Result<Vec<u8>, UpstreamError> {
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(UpstreamError::Status { status, body });
    }

    let bytes = resp.bytes().await?.to_vec();
    debug!(%status, bytes = bytes.len(), "Upstream response received");
    Ok(bytes)
}
