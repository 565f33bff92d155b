//! The HTTP seam under [`GcpClient`](crate::client::GcpClient).
//!
//! A [`Transport`] sends exactly one fully-built request and hands back the
//! status and body. Status interpretation, retries and JSON decoding live in
//! the client so every transport behaves the same way.

use crate::error::{GcpError, GcpResult};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;

/// A fully-resolved outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer_token: Option<String>,
    pub user_agent: String,
    pub body: Option<Value>,
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. `Err` means no HTTP response was received.
    async fn send(&self, request: HttpRequest) -> GcpResult<HttpResponse>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(15))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Underlying client, shared with the token exchange.
    pub fn client(&self) -> &Client {
        &self.http
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> GcpResult<HttpResponse> {
        let mut req = self
            .http
            .request(request.method.clone(), &request.url)
            .header("User-Agent", &request.user_agent);

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(ref token) = request.bearer_token {
            req = req.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            req = req.json(body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| GcpError::transport("compute", &format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GcpError::transport("compute", &format!("Body read error: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}
