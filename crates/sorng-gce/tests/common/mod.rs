#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use sorng_gce::{
    Compute, GcpClient, GcpError, GcpResult, HttpRequest, HttpResponse, RetryConfig, StaticToken,
    Transport,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const ENDPOINT: &str = "https://compute.test";
pub const PROJECT: &str = "demo-project";
pub const ZONE: &str = "us-central1-a";

/// Transport that answers from a queue and records every request.
#[derive(Default)]
pub struct FakeTransport {
    replies: Mutex<VecDeque<GcpResult<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, status: u16, body: Value) {
        self.replies.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn fail(&self, error: GcpError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> HttpRequest {
        self.requests().pop().expect("no request was sent")
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> GcpResult<HttpResponse> {
        self.requests.lock().unwrap().push(request);
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(HttpResponse {
                status: 418,
                body: r#"{"error":{"code":418,"message":"no scripted reply","status":"UNKNOWN"}}"#.into(),
            })
        })
    }
}

pub fn compute(transport: Arc<FakeTransport>) -> Compute {
    let client = GcpClient::new(transport, Arc::new(StaticToken("test-token".into())))
        .with_endpoint(ENDPOINT)
        .with_retry(RetryConfig::disabled());
    Compute::new(client, PROJECT)
}

/// Like [`compute`], but with three attempts and no backoff.
pub fn compute_with_retry(transport: Arc<FakeTransport>) -> Compute {
    let client = GcpClient::new(transport, Arc::new(StaticToken("test-token".into())))
        .with_endpoint(ENDPOINT)
        .with_retry(RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        });
    Compute::new(client, PROJECT)
}

pub fn request_id(request: &HttpRequest) -> Option<String> {
    request
        .query
        .iter()
        .find(|(k, _)| k == "requestId")
        .map(|(_, v)| v.clone())
}

pub fn zone_url(rest: &str) -> String {
    format!("{}/compute/v1/projects/{}/zones/{}{}", ENDPOINT, PROJECT, ZONE, rest)
}

pub fn api_error(code: u16, status: &str, message: &str) -> Value {
    serde_json::json!({ "error": { "code": code, "message": message, "status": status } })
}
