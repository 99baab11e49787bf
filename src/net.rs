//! HTTP plumbing: request/response values, the reqwest-backed client and the
//! default API-key credential provider.

use crate::traits::{CredentialProvider, HttpClient};
use crate::{LoopError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("tileloop/", env!("CARGO_PKG_VERSION"));

/// Environment variables read by [`ApiKeyCredentials::from_env`]
pub const APP_ID_ENV: &str = "TILELOOP_APP_ID";
pub const APP_KEY_ENV: &str = "TILELOOP_APP_KEY";

/// Shared async HTTP client reused by every [`ReqwestClient`]
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(16)
        .build()
        .expect("failed to build reqwest async client")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout: None,
        }
    }

    /// Sets a header, replacing any previous value with the same name
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// [`HttpClient`] backed by reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self {
            client: HTTP_CLIENT.clone(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LoopError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| LoopError::Network(e.to_string()))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Application id / key pair sent as request headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyCredentials {
    pub app_id: String,
    pub app_key: String,
}

impl ApiKeyCredentials {
    pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            app_key: app_key.into(),
        }
    }

    /// Reads the pair from `TILELOOP_APP_ID` and `TILELOOP_APP_KEY`. Missing
    /// variables become empty strings and are rejected by `validate`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(APP_ID_ENV).unwrap_or_default(),
            std::env::var(APP_KEY_ENV).unwrap_or_default(),
        )
    }
}

impl CredentialProvider for ApiKeyCredentials {
    fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(LoopError::MissingCredentials("app_id is empty".into()));
        }
        if self.app_key.trim().is_empty() {
            return Err(LoopError::MissingCredentials("app_key is empty".into()));
        }
        Ok(())
    }

    fn authorize(&self, request: HttpRequest) -> HttpRequest {
        request
            .with_header("Content-Type", "application/json")
            .with_header("app_id", self.app_id.as_str())
            .with_header("app_key", self.app_key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_adds_headers() {
        let creds = ApiKeyCredentials::new("id", "key");
        let request = creds.authorize(HttpRequest::new("http://example.com").with_header("app_id", "stale"));

        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("app_id"), Some("id"));
        assert_eq!(request.header("app_key"), Some("key"));
        assert_eq!(request.headers.iter().filter(|(n, _)| n == "app_id").count(), 1);
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(ApiKeyCredentials::new("id", "key").validate().is_ok());
        assert!(matches!(
            ApiKeyCredentials::new("", "key").validate(),
            Err(LoopError::MissingCredentials(_))
        ));
        assert!(matches!(
            ApiKeyCredentials::new("id", "  ").validate(),
            Err(LoopError::MissingCredentials(_))
        ));
    }
}
