//! Shared Compute Engine request layer.
//!
//! All Compute Engine REST calls follow the same shape:
//! - Base URL: `https://compute.googleapis.com`
//! - Auth: `Authorization: Bearer {access_token}`
//! - Request/Response: JSON
//!
//! Resource scopes build an [`ApiRequest`] relative to themselves and pass it
//! up; [`GcpClient`] resolves the URL, attaches credentials, retries transient
//! failures and turns error responses into [`GcpError`]s.

use crate::auth::TokenProvider;
use crate::config::RetryConfig;
use crate::error::{GcpError, GcpResult};
use crate::transport::{HttpRequest, Transport};
use rand::Rng;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const SERVICE: &str = "compute";
const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com";
const REQUEST_ID: &str = "requestId";

/// A request relative to some resource scope.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub uri: String,
    pub query: Vec<(String, String)>,
    pub json: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            query: Vec::new(),
            json: None,
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>, json: Value) -> Self {
        Self::new(Method::POST, uri).with_json(json)
    }

    pub fn patch(uri: impl Into<String>, json: Value) -> Self {
        Self::new(Method::PATCH, uri).with_json(json)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Tag a mutating call with a `requestId` so Compute de-duplicates
    /// repeated attempts. The id is fixed here, once per logical call.
    pub fn with_request_id(self) -> Self {
        self.with_query(REQUEST_ID, Uuid::new_v4().to_string())
    }

    /// Reads are always safe to repeat; writes only when tagged with a
    /// `requestId`.
    pub fn is_retry_safe(&self) -> bool {
        self.method == Method::GET || self.query.iter().any(|(k, _)| k == REQUEST_ID)
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    /// Re-root the request under a parent scope's path.
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.uri = format!("{}{}", prefix, self.uri);
        self
    }
}

/// Base Compute Engine API client.
#[derive(Clone)]
pub struct GcpClient {
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    endpoint: String,
    user_agent: String,
    retry: RetryConfig,
}

impl GcpClient {
    pub fn new(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            transport,
            tokens,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: "SortOfRemoteNG/1.0 gce-client/0.1".to_string(),
            retry: RetryConfig::default(),
        }
    }

    /// Point at an emulator or private endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Execute a request whose `uri` is an absolute API path.
    pub async fn request(&self, request: ApiRequest) -> GcpResult<Value> {
        let url = format!("{}{}", self.endpoint, request.uri);
        let max_attempts = if request.is_retry_safe() {
            self.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            let token = self.tokens.token().await?;
            let http_request = HttpRequest {
                method: request.method.clone(),
                url: url.clone(),
                query: request.query.clone(),
                bearer_token: Some(token),
                user_agent: self.user_agent.clone(),
                body: request.json.clone(),
            };

            log::debug!("{} {} (attempt {}/{})", request.method, url, attempt + 1, max_attempts);

            let error = match self.transport.send(http_request).await {
                Ok(response) if response.is_success() => return parse_body(&response.body),
                Ok(response) => GcpError::from_api_response(SERVICE, response.status, &response.body),
                Err(e) => e,
            };

            if error.retryable && attempt + 1 < max_attempts {
                let delay = self.calculate_backoff(attempt);
                log::warn!(
                    "GCP {} retryable error on {} {} (attempt {}/{}): {} - retrying in {}ms",
                    SERVICE,
                    request.method,
                    url,
                    attempt + 1,
                    max_attempts,
                    error.message,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
                continue;
            }

            return Err(error);
        }
    }

    /// Full-jitter exponential backoff.
    fn calculate_backoff(&self, attempt: u32) -> u64 {
        let exponential = self
            .retry
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped = exponential.min(self.retry.max_backoff_ms);
        rand::thread_rng().gen_range(0..=capped)
    }
}

fn parse_body(body: &str) -> GcpResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| GcpError::internal(SERVICE, &format!("JSON parse error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::transport::HttpResponse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        responses: Mutex<Vec<GcpResult<HttpResponse>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(mut responses: Vec<GcpResult<HttpResponse>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, request: HttpRequest) -> GcpResult<HttpResponse> {
            self.seen.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(HttpResponse { status: 200, body: String::new() }))
        }
    }

    fn reply(status: u16, body: &str) -> GcpResult<HttpResponse> {
        Ok(HttpResponse { status, body: body.to_string() })
    }

    fn client(transport: Arc<Scripted>) -> GcpClient {
        GcpClient::new(transport, Arc::new(StaticToken("tok".into())))
            .with_endpoint("http://localhost:8080/")
            .with_retry(RetryConfig {
                max_attempts: 3,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
            })
    }

    #[test]
    fn request_builders() {
        let req = ApiRequest::patch("/autoscalers", json!({"a": 1}))
            .with_query("autoscaler", "as-1")
            .prefixed("/zones/us-central1-a");
        assert_eq!(req.method, Method::PATCH);
        assert_eq!(req.uri, "/zones/us-central1-a/autoscalers");
        assert_eq!(req.query, vec![("autoscaler".to_string(), "as-1".to_string())]);
    }

    #[tokio::test]
    async fn resolves_url_and_attaches_token() {
        let transport = Scripted::new(vec![reply(200, r#"{"name":"x"}"#)]);
        let value = client(transport.clone())
            .request(ApiRequest::get("/compute/v1/projects/p"))
            .await
            .unwrap();
        assert_eq!(value, json!({"name": "x"}));
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "http://localhost:8080/compute/v1/projects/p");
        assert_eq!(seen[0].bearer_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn empty_body_is_null() {
        let transport = Scripted::new(vec![reply(204, "")]);
        let value = client(transport).request(ApiRequest::delete("/x")).await.unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn retries_unavailable_then_succeeds() {
        let transport = Scripted::new(vec![
            reply(503, r#"{"error":{"code":503,"message":"busy","status":"UNAVAILABLE"}}"#),
            reply(200, r#"{"ok":true}"#),
        ]);
        let value = client(transport.clone()).request(ApiRequest::get("/x")).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
        assert_eq!(transport.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn does_not_retry_not_found() {
        let transport = Scripted::new(vec![reply(
            404,
            r#"{"error":{"code":404,"message":"gone","status":"NOT_FOUND"}}"#,
        )]);
        let err = client(transport.clone()).request(ApiRequest::get("/x")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let transport = Scripted::new(vec![
            Err(GcpError::transport("compute", "reset")),
            Err(GcpError::transport("compute", "reset")),
            Err(GcpError::transport("compute", "reset")),
            reply(200, "{}"),
        ]);
        let err = client(transport.clone()).request(ApiRequest::get("/x")).await.unwrap_err();
        assert_eq!(err.status, "UNAVAILABLE");
        assert_eq!(transport.seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn untagged_writes_are_sent_once() {
        let transport = Scripted::new(vec![
            reply(503, r#"{"error":{"code":503,"message":"busy","status":"UNAVAILABLE"}}"#),
            reply(404, r#"{"error":{"code":404,"message":"gone","status":"NOT_FOUND"}}"#),
        ]);
        let err = client(transport.clone()).request(ApiRequest::delete("/x")).await.unwrap_err();
        assert_eq!(err.status, "UNAVAILABLE");
        assert_eq!(transport.seen.lock().unwrap().len(), 1);

        let transport = Scripted::new(vec![
            Err(GcpError::transport("compute", "connection reset")),
            reply(409, r#"{"error":{"code":409,"message":"exists","status":"ALREADY_EXISTS"}}"#),
        ]);
        let err = client(transport.clone())
            .request(ApiRequest::post("/x", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.status, "UNAVAILABLE");
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tagged_writes_retry_with_the_same_request_id() {
        let transport = Scripted::new(vec![
            Err(GcpError::transport("compute", "connection reset")),
            reply(200, r#"{"name":"operation-1"}"#),
        ]);
        let request = ApiRequest::post("/x", json!({})).with_request_id();
        assert!(request.is_retry_safe());
        let value = client(transport.clone()).request(request).await.unwrap();
        assert_eq!(value["name"], "operation-1");

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let ids: Vec<_> = seen
            .iter()
            .map(|r| r.query.iter().find(|(k, _)| k == "requestId").cloned())
            .collect();
        assert!(ids[0].is_some());
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn request_ids_are_unique_per_call() {
        let a = ApiRequest::delete("/x").with_request_id();
        let b = ApiRequest::delete("/x").with_request_id();
        assert_ne!(a.query, b.query);
        assert!(!ApiRequest::delete("/x").is_retry_safe());
        assert!(ApiRequest::get("/x").is_retry_safe());
    }

    #[tokio::test]
    async fn malformed_success_body_is_internal_error() {
        let transport = Scripted::new(vec![reply(200, "not json")]);
        let err = client(transport).request(ApiRequest::get("/x")).await.unwrap_err();
        assert_eq!(err.status, "INTERNAL");
        assert!(!err.retryable);
    }
}
