//! Transport adapter: one HTTP round trip per call

use std::time::Duration;

use async_trait::async_trait;
pub use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{SyzgyError, SyzgyResult};

/// Issues a single JSON request against the service.
///
/// `path` is relative to the configured base URL and starts with `/`.
/// Implementations fail with [`SyzgyError::Service`] on any status >= 400
/// and never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `body` (if any) and return the decoded JSON response, or
    /// `Value::Null` when the service sent no body.
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> SyzgyResult<Value>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from configuration.
    pub fn new(config: &ClientConfig) -> SyzgyResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| SyzgyError::Transport(err.to_string()))?;

        Ok(Self {
            base_url: normalize_base_url(&config.base_url),
            http,
        })
    }

    /// Base URL with the trailing slash removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.strip_suffix('/').unwrap_or(base_url).to_string()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> SyzgyResult<Value> {
        let mut request = self.http.request(method.clone(), self.endpoint(path));
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| SyzgyError::Transport(err.to_string()))?;

        let status = response.status();
        debug!(method = %method, path, status = status.as_u16(), "syzgy request");

        if status.as_u16() >= 400 {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(SyzgyError::Service {
                status_code: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| SyzgyError::Transport(err.to_string()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|err| SyzgyError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::{Method::DELETE, Method::GET, Method::POST, MockServer};
    use serde_json::json;

    use super::*;

    fn transport_for(base_url: String) -> HttpTransport {
        HttpTransport::new(&ClientConfig::new(base_url)).unwrap()
    }

    #[test]
    fn strips_one_trailing_slash() {
        assert_eq!(normalize_base_url("http://h:8080/"), "http://h:8080");
        assert_eq!(normalize_base_url("http://h:8080"), "http://h:8080");
        assert_eq!(normalize_base_url("http://h:8080/api//"), "http://h:8080/api/");
    }

    #[test]
    fn rejects_invalid_base_url() {
        let error = HttpTransport::new(&ClientConfig::new("nope")).unwrap_err();
        assert!(matches!(error, SyzgyError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn posts_json_body_to_joined_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/collections")
                    .json_body(json!({"name": "tweets"}));
                then.status(201).json_body(json!({"collection_name": "tweets"}));
            })
            .await;

        let transport = transport_for(format!("{}/", server.base_url()));
        let value = transport
            .request(Method::POST, "/api/v1/collections", Some(json!({"name": "tweets"})))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(value["collection_name"], "tweets");
    }

    #[tokio::test]
    async fn status_400_and_above_is_a_service_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/collections/missing");
                then.status(404).body("Collection not found\n");
            })
            .await;

        let transport = transport_for(server.base_url());
        let error = transport
            .request(Method::GET, "/api/v1/collections/missing", None)
            .await
            .unwrap_err();

        match error {
            SyzgyError::Service { status_code, body } => {
                assert_eq!(status_code, 404);
                assert!(body.contains("Collection not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_body_decodes_as_null() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/v1/collections/old");
                then.status(204);
            })
            .await;

        let transport = transport_for(server.base_url());
        let value = transport
            .request(Method::DELETE, "/api/v1/collections/old", None)
            .await
            .unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/collections");
                then.status(200).body("<html>");
            })
            .await;

        let transport = transport_for(server.base_url());
        let error = transport
            .request(Method::GET, "/api/v1/collections", None)
            .await
            .unwrap_err();
        assert!(matches!(error, SyzgyError::Decode(_)));
    }

    #[tokio::test]
    async fn connection_failure_is_a_transport_error() {
        let transport = transport_for("http://127.0.0.1:1".to_string());
        let error = transport
            .request(Method::GET, "/api/v1/collections", None)
            .await
            .unwrap_err();
        assert!(matches!(error, SyzgyError::Transport(_)));
        assert!(error.is_retryable());
    }
}
