//! Zone scope: parent of zonal autoscalers and operations.

use crate::autoscaler::{Autoscaler, AutoscalerConfig};
use crate::client::ApiRequest;
use crate::compute::{AutoscalerPage, Compute, ListOptions};
use crate::error::GcpResult;
use crate::operation::Operation;
use crate::service_object::RequestScope;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Zone {
    compute: Compute,
    name: String,
}

impl Zone {
    pub fn new(compute: Compute, name: impl Into<String>) -> Self {
        Self {
            compute,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compute(&self) -> &Compute {
        &self.compute
    }

    pub(crate) fn scope(&self) -> Arc<dyn RequestScope> {
        Arc::new(self.clone())
    }

    /// Handle for an autoscaler in this zone. No request is made.
    pub fn autoscaler(&self, name: impl Into<String>) -> Autoscaler {
        Autoscaler::new(self.clone(), name)
    }

    /// Handle for a zonal operation. No request is made.
    pub fn operation(&self, name: impl Into<String>) -> Operation {
        Operation::new(self.scope(), name)
    }

    pub(crate) fn operation_from_response(&self, response: Value) -> Operation {
        Operation::from_response(self.scope(), response)
    }

    /// Send a request relative to `/zones/<zone>`.
    pub async fn request(&self, request: ApiRequest) -> GcpResult<Value> {
        let prefix = format!("/zones/{}", self.name);
        self.compute.request(request.prefixed(&prefix)).await
    }

    /// Insert an autoscaler. Fails without a request when `config` has no
    /// target.
    pub async fn create_autoscaler(
        &self,
        name: &str,
        config: AutoscalerConfig,
    ) -> GcpResult<(Autoscaler, Operation, Value)> {
        let body = config.to_request_body(self.compute.project_id(), &self.name, name)?;
        let response = self
            .request(ApiRequest::post("/autoscalers", body).with_request_id())
            .await
            .map_err(|e| e.with_method("autoscalers.insert"))?;
        log::info!("created autoscaler {} in zone {}", name, self.name);
        let operation = self.operation_from_response(response.clone());
        Ok((self.autoscaler(name), operation, response))
    }

    /// One page of this zone's autoscalers, each carrying its listed metadata.
    pub async fn get_autoscalers(&self, options: &ListOptions) -> GcpResult<AutoscalerPage> {
        let request = options.apply(ApiRequest::get("/autoscalers"));
        let response = self
            .request(request)
            .await
            .map_err(|e| e.with_method("autoscalers.list"))?;

        let autoscalers = response
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let name = item.get("name")?.as_str()?;
                        Some(self.autoscaler(name).with_metadata(item.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(AutoscalerPage::new(autoscalers, response))
    }

    /// Every autoscaler in the zone, following `nextPageToken`.
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
impl RequestScope for Zone {
    async fn request(&self, request: ApiRequest) -> GcpResult<Value> {
        Zone::request(self, request).await
    }
}
