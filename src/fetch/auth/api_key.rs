use crate::error::UpstreamError;
use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header.
///
/// The header value is validated once, at construction, so sending a request
/// cannot fail on a malformed key.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: HeaderName, value: &str) -> Result<Self, UpstreamError> {
        let mut value = HeaderValue::from_str(value)
            .map_err(|e| UpstreamError::InvalidRequest(format!("API key header: {e}")))?;
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    /// `Authorization: apikey <key>`, the scheme used by the TfNSW open data
    /// platform.
    pub fn tfnsw(inner: C, key: &str) -> Result<Self, UpstreamError> {
        Self::new(inner, AUTHORIZATION, &format!("apikey {key}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tfnsw_header_value() {
        let client = ApiKey::tfnsw((), "abc123").unwrap();
        assert_eq!(client.header_name, AUTHORIZATION);
        assert_eq!(client.value.to_str().unwrap(), "apikey abc123");
        assert!(client.value.is_sensitive());
    }

    #[test]
    fn test_rejects_key_with_newline() {
        assert!(ApiKey::tfnsw((), "abc\n123").is_err());
    }
}
