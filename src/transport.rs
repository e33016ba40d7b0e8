//! HTTP transport abstraction.
//!
//! The dispatcher never talks to `reqwest` directly; it goes through
//! [`Transport`] so tests can substitute a recording mock and never touch the
//! network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::request::Method;

/// Fully resolved request as it goes on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL, query string included.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Connection-level failure: timeout, reset, DNS, unreadable body.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError(e.to_string())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));

        Ok(Self {
            client: reqwest::Client::builder()
                .default_headers(headers)
                .timeout(timeout)
                .build()?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), request.url.as_str());

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}


#[cfg(test)]
mod test {
    use super::mock::MockTransport;
    use super::*;

    fn get(url: &str) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            url: url.into(),
            headers: vec![],
            body: None,
        }
    }

    #[tokio::test]
    async fn test_mock_matches_unversioned_path() {
        let transport = MockTransport::new().with_response("/data/tiers", 200, "[]");

        let response = transport
            .send(&get("http://example.test/v1/data/tiers"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "[]");

        let missing = transport
            .send(&get("http://example.test/v1/data/seasons"))
            .await
            .unwrap();
        assert_eq!(missing.status, 404);
        assert_eq!(transport.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_reqwest_transport_roundtrip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/player/batch")
            .match_header("authorization", "asdf1234")
            .match_body(r#"[{"platformId":"1","uniqueId":"abc"}]"#)
            .with_status(201)
            .with_body("[]")
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let response = transport
            .send(&HttpRequest {
                method: Method::Post,
                url: format!("{}/v1/player/batch", server.url()),
                headers: vec![("authorization".into(), "asdf1234".into())],
                body: Some(r#"[{"platformId":"1","uniqueId":"abc"}]"#.into()),
            })
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(response.status, 201);
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_reqwest_transport_connection_refused() {
        let transport = ReqwestTransport::new(Duration::from_secs(1)).unwrap();
        // port 9 (discard) on localhost is closed on any sane test host
        let result = transport.send(&get("http://127.0.0.1:9/v1/data/tiers")).await;
        assert!(result.is_err());
    }
}
