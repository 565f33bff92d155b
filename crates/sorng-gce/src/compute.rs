//! Compute Engine project scope.
//!
//! API base: `https://compute.googleapis.com/compute/v1/projects/{project}`

use crate::auth::{StaticToken, TokenManager, TokenProvider};
use crate::autoscaler::Autoscaler;
use crate::client::{ApiRequest, GcpClient};
use crate::config::{GcpConnectionConfig, ServiceAccountKey};
use crate::error::{GcpError, GcpResult};
use crate::service_object::RequestScope;
use crate::transport::ReqwestTransport;
use crate::zone::Zone;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const SERVICE: &str = "compute";
const V1: &str = "/compute/v1";

/// Filtering and paging for list calls.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Server-side filter expression (e.g. `name eq web-.*`).
    pub filter: Option<String>,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

impl ListOptions {
    pub(crate) fn apply(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(ref filter) = self.filter {
            request = request.with_query("filter", filter.clone());
        }
        if let Some(max) = self.max_results {
            request = request.with_query("maxResults", max.to_string());
        }
        if let Some(ref token) = self.page_token {
            request = request.with_query("pageToken", token.clone());
        }
        request
    }

    /// Move to the next page. Returns `false` when there is none, or when the
    /// server hands back the token that was just used.
    pub(crate) fn advance(&mut self, next_page_token: Option<String>) -> bool {
        match next_page_token {
            Some(token) if self.page_token.as_deref() != Some(token.as_str()) => {
                self.page_token = Some(token);
                true
            }
            Some(token) => {
                log::warn!("list returned the same page token twice ({}), stopping", token);
                false
            }
            None => false,
        }
    }
}

/// One page of autoscalers plus the raw list response.
#[derive(Debug, Clone)]
pub struct AutoscalerPage {
    pub autoscalers: Vec<Autoscaler>,
    pub next_page_token: Option<String>,
    pub response: Value,
}

impl AutoscalerPage {
    pub(crate) fn new(autoscalers: Vec<Autoscaler>, response: Value) -> Self {
        let next_page_token = response
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Self {
            autoscalers,
            next_page_token,
            response,
        }
    }
}

#[derive(Clone)]
pub struct Compute {
    client: GcpClient,
    project_id: String,
}

impl std::fmt::Debug for Compute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compute")
            .field("project_id", &self.project_id)
            .field("endpoint", &self.client.endpoint())
            .finish()
    }
}

impl Compute {
    pub fn new(client: GcpClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
        }
    }

    /// Build a client from a validated connection config.
    pub fn connect(config: &GcpConnectionConfig) -> GcpResult<Self> {
        config
            .validate()
            .map_err(|e| GcpError::invalid_argument("config", &e))?;

        let transport = ReqwestTransport::new();
        let tokens: Arc<dyn TokenProvider> = match (&config.service_account_key_json, &config.access_token) {
            (Some(json), _) => {
                let key = ServiceAccountKey::from_json(json).map_err(|e| GcpError::auth_error(&e))?;
                Arc::new(TokenManager::new(key, config.scopes.clone(), transport.client().clone()))
            }
            (None, Some(token)) => Arc::new(StaticToken(token.clone())),
            (None, None) => return Err(GcpError::auth_error("no credentials configured")),
        };

        let mut client = GcpClient::new(Arc::new(transport), tokens).with_retry(config.retry.clone());
        if let Some(ref endpoint) = config.endpoint_override {
            client = client.with_endpoint(endpoint.clone());
        }

        log::info!("compute client ready for project {} ({})", config.project_id, client.endpoint());
        Ok(Self::new(client, config.project_id.clone()))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn client(&self) -> &GcpClient {
        &self.client
    }

    /// Handle for a zone. No request is made.
    pub fn zone(&self, name: impl Into<String>) -> Zone {
        Zone::new(self.clone(), name)
    }

    /// Send a request relative to `/compute/v1/projects/<project>`.
    pub async fn request(&self, request: ApiRequest) -> GcpResult<Value> {
        let prefix = format!("{}/projects/{}", V1, self.project_id);
        self.client.request(request.prefixed(&prefix)).await
    }

    /// One page of autoscalers across every zone of the project.
    pub async fn get_autoscalers(&self, options: &ListOptions) -> GcpResult<AutoscalerPage> {
        let request = options.apply(ApiRequest::get("/aggregated/autoscalers"));
        let response = self
            .request(request)
            .await
            .map_err(|e| e.with_method("autoscalers.aggregatedList"))?;

        let mut autoscalers = Vec::new();
        if let Some(scopes) = response.get("items").and_then(Value::as_object) {
            for (scope, listing) in scopes {
                // Regional autoscalers live under "regions/..." and are skipped.
                let Some(zone_name) = scope.strip_prefix("zones/") else {
                    continue;
                };
                let Some(items) = listing.get("autoscalers").and_then(Value::as_array) else {
                    continue;
                };
                let zone = self.zone(zone_name);
                for item in items {
                    if let Some(name) = item.get("name").and_then(Value::as_str) {
                        autoscalers.push(zone.autoscaler(name).with_metadata(item.clone()));
                    }
                }
            }
        }

        Ok(AutoscalerPage::new(autoscalers, response))
    }

    /// Every autoscaler in the project, following `nextPageToken`.
    pub async fn get_all_autoscalers(&self, options: &ListOptions) -> GcpResult<Vec<Autoscaler>> {
        let mut options = options.clone();
        let mut all = Vec::new();
        loop {
            let page = self.get_autoscalers(&options).await?;
            all.extend(page.autoscalers);
            if !options.advance(page.next_page_token) {
                break;
            }
        }
        Ok(all)
    }
}

#[async_trait]
impl RequestScope for Compute {
    async fn request(&self, request: ApiRequest) -> GcpResult<Value> {
        Compute::request(self, request).await
    }
}
