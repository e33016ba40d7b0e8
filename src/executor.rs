//! Turns one [`Request`] into one terminal [`Outcome`].
//!
//! The executor never retries. Whatever the transport says is classified once
//! and handed back to the dispatcher, which resolves the caller's handle.

use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;

use crate::error::ApiError;
use crate::handle::Outcome;
use crate::request::{Method, Request};
use crate::transport::{HttpRequest, Transport};

#[derive(Clone)]
pub struct Executor {
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl Executor {
    pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base_url}/{api_version}{path}?{query}`, key in the `Authorization`
    /// header.
    pub fn build(&self, request: &Request) -> Result<HttpRequest, ApiError> {
        let mut raw = self.base_url.clone();
        if !request.api_version().is_empty() {
            raw.push('/');
            raw.push_str(request.api_version().trim_matches('/'));
        }
        if !request.path().starts_with('/') {
            raw.push('/');
        }
        raw.push_str(request.path());

        let url = if request.query().is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, request.query())
        }
        .map_err(|e| ApiError::Transport(format!("invalid request URL {raw:?}: {e}")))?;

        let mut headers = Vec::with_capacity(2);
        if !request.api_key().is_empty() {
            headers.push(("Authorization".to_string(), request.api_key().to_string()));
        }
        if request.method() == Method::Post && request.body().is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }

        Ok(HttpRequest {
            method: request.method(),
            url: url.into(),
            headers,
            body: request.body().map(str::to_string),
        })
    }

    pub async fn execute(&self, request: &Request) -> Outcome {
        let http = self.build(request)?;

        let response = self
            .transport
            .send(&http)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(ApiError::HttpStatus {
                code: response.status,
                body: response.body,
            });
        }

        Ok(serde_json::from_str::<Value>(&response.body)?)
    }

    /// [`Executor::execute`], abandoned as `Cancelled` if the request's token
    /// fires first.
    pub async fn run(&self, request: &Request) -> Outcome {
        tokio::select! {
            biased;
            _ = request.cancellation().cancelled() => Err(ApiError::Cancelled),
            outcome = self.execute(request) => outcome,
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::transport::mock::MockTransport;

    fn executor(transport: &MockTransport) -> Executor {
        Executor::new("http://stats.test/", Arc::new(transport.clone()))
    }

    #[test]
    fn test_build_url_and_headers() {
        let transport = MockTransport::new();
        let request = Request::get("/search/players")
            .with_query("display_name", "Kaydop & co")
            .with_query("page", 0)
            .with_api_key("asdf1234")
            .with_api_version("v1");

        let http = executor(&transport).build(&request).unwrap();
        assert_eq!(http.method, Method::Get);
        assert_eq!(
            http.url,
            "http://stats.test/v1/search/players?display_name=Kaydop+%26+co&page=0"
        );
        assert_eq!(
            http.headers,
            vec![("Authorization".to_string(), "asdf1234".to_string())]
        );
        assert!(http.body.is_none());
    }

    #[test]
    fn test_build_post_body() {
        let transport = MockTransport::new();
        let request = Request::post("/player/batch")
            .with_body("[]")
            .with_api_key("k")
            .with_api_version("v1");

        let http = executor(&transport).build(&request).unwrap();
        assert_eq!(http.url, "http://stats.test/v1/player/batch");
        assert!(http
            .headers
            .contains(&("Content-Type".to_string(), "application/json".to_string())));
        assert_eq!(http.body.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_http_status_failure() {
        let transport = MockTransport::new().with_response("/data/tiers", 500, "boom");
        let outcome = executor(&transport)
            .execute(&Request::get("/data/tiers").with_api_version("v1"))
            .await;

        assert_eq!(
            outcome,
            Err(ApiError::HttpStatus {
                code: 500,
                body: "boom".into()
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let transport =
            MockTransport::new().with_response("/player", 200, r#"{"uniqueId": "#);
        let outcome = executor(&transport)
            .execute(&Request::get("/player").with_api_version("v1"))
            .await;

        assert!(matches!(outcome, Err(ApiError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = MockTransport::new().with_failure("/data/seasons", "connection reset");
        let outcome = executor(&transport)
            .execute(&Request::get("/data/seasons").with_api_version("v1"))
            .await;

        assert_eq!(outcome, Err(ApiError::Transport("connection reset".into())));
    }

    #[tokio::test]
    async fn test_resolved_payload() {
        let transport = MockTransport::new().with_response(
            "/data/platforms",
            200,
            r#"[{"id":1,"name":"Steam"},{"id":2,"name":"Ps4"},{"id":3,"name":"XboxOne"}]"#,
        );
        let outcome = executor(&transport)
            .execute(&Request::get("/data/platforms").with_api_version("v1"))
            .await
            .unwrap();

        assert_eq!(outcome.as_array().map(Vec::len), Some(3));
        assert_eq!(outcome[0], json!({"id": 1, "name": "Steam"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cancelled_in_flight() {
        let transport = MockTransport::new()
            .with_response("/data/seasons", 200, "[]")
            .with_delay(Duration::from_secs(10));
        let executor = executor(&transport);
        let request = Request::get("/data/seasons").with_api_version("v1");

        let token = request.cancellation().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        assert_eq!(executor.run(&request).await, Err(ApiError::Cancelled));
        assert_eq!(transport.recorded().len(), 1);
    }
}
