//! Autoscaler resource handles.
//!
//! An [`Autoscaler`] names one autoscaler inside a [`Zone`]. Building one
//! performs no I/O. Generic calls go through the composed [`ServiceObject`];
//! `delete` and `set_metadata` turn the server's operation payload into an
//! [`Operation`] bound to the zone.
//!
//! API reference:
//! <https://cloud.google.com/compute/docs/reference/rest/v1/autoscalers>

use crate::client::ApiRequest;
use crate::error::{GcpError, GcpResult};
use crate::operation::Operation;
use crate::service_object::{CreateMethod, GetOptions, Methods, ServiceObject};
use crate::zone::Zone;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

const SERVICE: &str = "compute";

/// Generic methods an autoscaler takes from its service object. `delete` and
/// `set_metadata` are implemented on the handle itself.
const AUTOSCALER_METHODS: Methods = Methods {
    create: true,
    exists: true,
    get: true,
    get_metadata: true,
    set_metadata: false,
    delete: false,
};

/// Creation settings, in the friendly shape callers write.
///
/// `cpu` and `load_balance` are percentages; they are sent as fractions.
/// Unknown fields pass through to the request body untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerConfig {
    /// Instance group manager name, or its full URL.
    #[serde(default)]
    pub target: Option<String>,
    /// Seconds to wait after a new instance starts before collecting its usage.
    #[serde(default)]
    pub cool_down: Option<u32>,
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub load_balance: Option<f64>,
    #[serde(default)]
    pub max_replicas: Option<u32>,
    #[serde(default)]
    pub min_replicas: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AutoscalerConfig {
    pub fn for_target(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// Build the `autoscalers.insert` body.
    pub fn to_request_body(&self, project: &str, zone: &str, name: &str) -> GcpResult<Value> {
        let target = self
            .target
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                GcpError::invalid_argument(SERVICE, "Cannot create an autoscaler without a target.")
                    .with_method("autoscalers.insert")
            })?;
        let target = if target.starts_with("http") {
            target.to_string()
        } else {
            format!(
                "https://www.googleapis.com/compute/v1/projects/{}/zones/{}/instanceGroupManagers/{}",
                project, zone, target
            )
        };

        let mut body = self.extra.clone();
        let mut policy = match body.remove("autoscalingPolicy") {
            Some(Value::Object(policy)) => policy,
            _ => Map::new(),
        };

        if let Some(cool_down) = self.cool_down {
            policy.insert("coolDownPeriodSec".into(), cool_down.into());
        }
        if let Some(cpu) = self.cpu {
            policy.insert("cpuUtilization".into(), utilization(cpu));
        }
        if let Some(load_balance) = self.load_balance {
            policy.insert("loadBalancingUtilization".into(), utilization(load_balance));
        }
        if let Some(max) = self.max_replicas {
            policy.insert("maxNumReplicas".into(), max.into());
        }
        if let Some(min) = self.min_replicas {
            policy.insert("minNumReplicas".into(), min.into());
        }

        body.insert("name".into(), name.into());
        body.insert("target".into(), target.into());
        if let Some(ref description) = self.description {
            body.insert("description".into(), description.clone().into());
        }
        if !policy.is_empty() {
            body.insert("autoscalingPolicy".into(), Value::Object(policy));
        }
        Ok(Value::Object(body))
    }
}

fn utilization(percent: f64) -> Value {
    serde_json::json!({ "utilizationTarget": percent / 100.0 })
}

#[derive(Debug, Clone)]
pub struct Autoscaler {
    zone: Zone,
    name: String,
    object: ServiceObject,
}

impl Autoscaler {
    pub fn new(zone: Zone, name: impl Into<String>) -> Self {
        let name = name.into();

        let create_zone = zone.clone();
        let create_name = name.clone();
        let create_method: CreateMethod = Arc::new(move |config: Value| {
            let zone = create_zone.clone();
            let name = create_name.clone();
            async move {
                let config: AutoscalerConfig = serde_json::from_value(config).map_err(|e| {
                    GcpError::invalid_argument(SERVICE, &format!("Invalid autoscaler config: {}", e))
                })?;
                let (_, operation, response) = zone.create_autoscaler(&name, config).await?;
                Ok::<_, GcpError>((operation, response))
            }
            .boxed()
        });

        let object = ServiceObject::new(zone.scope(), "/autoscalers", name.clone(), AUTOSCALER_METHODS)
            .with_create_method(create_method);

        Self { zone, name, object }
    }

    pub(crate) fn with_metadata(mut self, metadata: Value) -> Self {
        self.object = self.object.with_metadata(metadata);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    /// Last metadata received for this autoscaler. Not guaranteed fresh.
    pub async fn metadata(&self) -> Option<Value> {
        self.object.metadata().await
    }

    /// Create this autoscaler in its zone.
    pub async fn create(&self, config: AutoscalerConfig) -> GcpResult<(Autoscaler, Operation, Value)> {
        self.zone.create_autoscaler(&self.name, config).await
    }

    pub async fn exists(&self) -> GcpResult<bool> {
        self.object.exists().await
    }

    /// Fetch the autoscaler; see [`GetOptions`] for auto-creation.
    pub async fn get(&self, options: GetOptions) -> GcpResult<Value> {
        self.object.get(options).await
    }

    pub async fn get_metadata(&self) -> GcpResult<Value> {
        self.object.get_metadata().await
    }

    /// Delete the autoscaler. Returns the delete operation and the raw response.
    pub async fn delete(&self) -> GcpResult<(Operation, Value)> {
        let response = self
            .object
            .request(ApiRequest::delete("").with_request_id())
            .await
            .map_err(|e| e.with_method("autoscalers.delete"))?;
        Ok((self.zone.operation_from_response(response.clone()), response))
    }

    /// Patch the autoscaler's configuration.
    ///
    /// `name` and `zone` are always set from the handle, whatever the caller
    /// passed. The endpoint addresses the autoscaler by query parameter, not
    /// by path.
    pub async fn set_metadata(&self, metadata: Option<Value>) -> GcpResult<(Operation, Value)> {
        let mut body = match metadata {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(GcpError::invalid_argument(
                    SERVICE,
                    &format!("autoscaler metadata must be a JSON object, got {}", other),
                )
                .with_method("autoscalers.patch"))
            }
        };
        body.insert("name".into(), self.name.clone().into());
        body.insert("zone".into(), self.zone.name().into());

        let request = ApiRequest::patch("/autoscalers", Value::Object(body))
            .with_query("autoscaler", self.name.clone())
            .with_request_id();
        let response = self
            .zone
            .request(request)
            .await
            .map_err(|e| e.with_method("autoscalers.patch"))?;
        Ok((self.zone.operation_from_response(response.clone()), response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_without_target_is_rejected() {
        let err = AutoscalerConfig::default()
            .to_request_body("p", "us-central1-a", "as-1")
            .unwrap_err();
        assert_eq!(err.code, 400);
        assert!(err.message.contains("without a target"));
    }

    #[test]
    fn bare_target_is_expanded() {
        let body = AutoscalerConfig::for_target("igm-1")
            .to_request_body("p", "us-central1-a", "as-1")
            .unwrap();
        assert_eq!(
            body["target"],
            "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a/instanceGroupManagers/igm-1"
        );
        assert_eq!(body["name"], "as-1");
        assert!(body.get("autoscalingPolicy").is_none());
    }

    #[test]
    fn url_target_is_kept() {
        let url = "https://www.googleapis.com/compute/v1/projects/x/zones/y/instanceGroupManagers/z";
        let body = AutoscalerConfig::for_target(url)
            .to_request_body("p", "us-central1-a", "as-1")
            .unwrap();
        assert_eq!(body["target"], url);
    }

    #[test]
    fn friendly_fields_become_policy() {
        let config: AutoscalerConfig = serde_json::from_value(json!({
            "target": "igm-1",
            "coolDown": 30,
            "cpu": 80,
            "loadBalance": 40,
            "maxReplicas": 5,
            "minReplicas": 1,
            "description": "web tier",
            "labels": {"team": "infra"}
        }))
        .unwrap();
        let body = config.to_request_body("p", "us-central1-a", "as-1").unwrap();
        let policy = &body["autoscalingPolicy"];
        assert_eq!(policy["coolDownPeriodSec"], 30);
        assert_eq!(policy["cpuUtilization"]["utilizationTarget"], 0.8);
        assert_eq!(policy["loadBalancingUtilization"]["utilizationTarget"], 0.4);
        assert_eq!(policy["maxNumReplicas"], 5);
        assert_eq!(policy["minNumReplicas"], 1);
        assert_eq!(body["description"], "web tier");
        assert_eq!(body["labels"]["team"], "infra");
        assert!(body.get("coolDown").is_none());
    }

    #[test]
    fn explicit_policy_is_merged() {
        let config: AutoscalerConfig = serde_json::from_value(json!({
            "target": "igm-1",
            "maxReplicas": 3,
            "autoscalingPolicy": {"mode": "ONLY_SCALE_OUT"}
        }))
        .unwrap();
        let body = config.to_request_body("p", "z-a", "as-1").unwrap();
        assert_eq!(body["autoscalingPolicy"]["mode"], "ONLY_SCALE_OUT");
        assert_eq!(body["autoscalingPolicy"]["maxNumReplicas"], 3);
    }
}
