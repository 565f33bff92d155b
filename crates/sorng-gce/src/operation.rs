//! Zonal long-running operation handles.
//!
//! Every mutating Compute Engine call answers with an operation resource.
//! An [`Operation`] is built fresh from each such response, carrying it as its
//! metadata snapshot; [`Operation::wait`] polls it until the server reports
//! `DONE`.

use crate::error::{GcpError, GcpResult};
use crate::service_object::{GetOptions, Methods, RequestScope, ServiceObject};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "compute";

const OPERATION_METHODS: Methods = Methods {
    create: false,
    exists: true,
    get: true,
    get_metadata: true,
    set_metadata: false,
    delete: true,
};

/// Polling cadence for [`Operation::wait`].
#[derive(Debug, Clone, Copy)]
pub struct PollOptions {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_polls: 150,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    name: String,
    object: ServiceObject,
}

impl Operation {
    pub(crate) fn new(scope: Arc<dyn RequestScope>, name: impl Into<String>) -> Self {
        let name = name.into();
        let object = ServiceObject::new(scope, "/operations", name.clone(), OPERATION_METHODS);
        Self { name, object }
    }

    /// Bind an operation to the response that announced it. A response
    /// without `name` yields an operation with an empty name.
    pub(crate) fn from_response(scope: Arc<dyn RequestScope>, response: Value) -> Self {
        let name = response
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let mut operation = Self::new(scope, name);
        operation.object = operation.object.with_metadata(response);
        operation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last snapshot of the operation resource.
    pub async fn metadata(&self) -> Option<Value> {
        self.object.metadata().await
    }

    pub async fn exists(&self) -> GcpResult<bool> {
        self.object.exists().await
    }

    pub async fn get(&self) -> GcpResult<Value> {
        self.object.get(GetOptions::default()).await
    }

    pub async fn get_metadata(&self) -> GcpResult<Value> {
        self.object.get_metadata().await
    }

    pub async fn delete(&self) -> GcpResult<Value> {
        self.object.delete().await
    }

    /// Poll until the operation is done and return its final metadata.
    pub async fn wait(&self, poll: PollOptions) -> GcpResult<Value> {
        for attempt in 0..poll.max_polls {
            let op = self.get_metadata().await?;
            if is_done(&op) {
                return match operation_error(&op) {
                    Some(err) => Err(err),
                    None => Ok(op),
                };
            }
            log::debug!(
                "operation {} still {} (poll {}/{})",
                self.name,
                op.get("status").and_then(Value::as_str).unwrap_or("PENDING"),
                attempt + 1,
                poll.max_polls
            );
            tokio::time::sleep(poll.interval).await;
        }

        Err(GcpError::new(
            SERVICE,
            408,
            "DEADLINE_EXCEEDED",
            &format!("Operation {} timed out waiting for completion", self.name),
        ))
    }
}

fn is_done(op: &Value) -> bool {
    op.get("done").and_then(Value::as_bool).unwrap_or(false)
        || op.get("status").and_then(Value::as_str) == Some("DONE")
}

/// Compute reports failures as `error.errors[]` plus `httpErrorStatusCode`.
fn operation_error(op: &Value) -> Option<GcpError> {
    let err = op.get("error")?;
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| {
            err.get("errors")
                .and_then(|e| e.get(0))
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })
        .unwrap_or("Operation failed");
    let code = op
        .get("httpErrorStatusCode")
        .or_else(|| err.get("code"))
        .and_then(Value::as_u64)
        .unwrap_or(500) as u16;
    let mut error = GcpError::new(SERVICE, code, "OPERATION_FAILED", message);
    error.response = Some(op.clone());
    Some(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn done_detection() {
        assert!(is_done(&json!({"status": "DONE"})));
        assert!(is_done(&json!({"done": true})));
        assert!(!is_done(&json!({"status": "RUNNING"})));
    }

    #[test]
    fn compute_style_error() {
        let op = json!({
            "status": "DONE",
            "httpErrorStatusCode": 400,
            "error": {"errors": [{"code": "RESOURCE_NOT_FOUND", "message": "target missing"}]}
        });
        let err = operation_error(&op).unwrap();
        assert_eq!(err.code, 400);
        assert_eq!(err.status, "OPERATION_FAILED");
        assert_eq!(err.message, "target missing");
        assert_eq!(err.response, Some(op));
    }

    #[test]
    fn no_error_field() {
        assert!(operation_error(&json!({"status": "DONE"})).is_none());
    }
}
