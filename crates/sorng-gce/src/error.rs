//! Compute Engine error types following Google Cloud API error conventions.
//!
//! Google Cloud APIs return errors as `{ "error": { "code", "message",
//! "status" } }`. A [`GcpError`] keeps those fields together with the raw
//! response body so callers can still inspect what the server sent back.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Top-level error type for all Compute Engine calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpError {
    /// The HTTP status code (e.g., 400, 403, 404, 409, 500).
    pub code: u16,
    /// Human-readable error message.
    pub message: String,
    /// gRPC status string (e.g., "INVALID_ARGUMENT", "NOT_FOUND").
    pub status: String,
    /// The service that returned the error (e.g., "compute", "auth").
    pub service: String,
    /// The API method that failed (e.g., "autoscalers.delete").
    pub method: Option<String>,
    /// Whether this error is retryable (429, 500, 503, transport failures).
    pub retryable: bool,
    /// Raw response body, when the server sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl fmt::Display for GcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GCP {} error [{}]: {} (HTTP {})",
            self.service, self.status, self.message, self.code
        )?;
        if let Some(ref method) = self.method {
            write!(f, " [Method: {}]", method)?;
        }
        Ok(())
    }
}

impl std::error::Error for GcpError {}

fn is_retryable_code(code: u16) -> bool {
    matches!(code, 429 | 500 | 503)
}

impl GcpError {
    /// Create a new error.
    pub fn new(service: &str, code: u16, status: &str, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            status: status.to_string(),
            service: service.to_string(),
            method: None,
            retryable: is_retryable_code(code),
            response: None,
        }
    }

    /// Internal error with service context.
    pub fn internal(service: &str, msg: &str) -> Self {
        Self {
            retryable: false,
            ..Self::new(service, 500, "INTERNAL", msg)
        }
    }

    /// The request never produced an HTTP response (DNS, connect, TLS, timeout).
    pub fn transport(service: &str, msg: &str) -> Self {
        Self {
            retryable: true,
            ..Self::new(service, 503, "UNAVAILABLE", msg)
        }
    }

    /// Authentication error.
    pub fn auth_error(msg: &str) -> Self {
        Self::new("auth", 401, "UNAUTHENTICATED", msg)
    }

    /// Caller-supplied input was rejected before any request was made.
    pub fn invalid_argument(service: &str, msg: &str) -> Self {
        Self::new(service, 400, "INVALID_ARGUMENT", msg)
    }

    /// The handle does not enable the requested generic method.
    pub fn unimplemented(service: &str, method: &str) -> Self {
        Self::new(
            service,
            501,
            "UNIMPLEMENTED",
            &format!("method '{}' is not supported by this resource", method),
        )
        .with_method(method)
    }

    /// Parse an API error from a response body.
    pub fn from_api_response(service: &str, status_code: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct ApiErrorInner {
            code: Option<u16>,
            message: Option<String>,
            status: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiErrorWrapper {
            error: Option<ApiErrorInner>,
        }

        let response = serde_json::from_str::<Value>(body).ok();

        if let Ok(wrapper) = serde_json::from_str::<ApiErrorWrapper>(body) {
            if let Some(err) = wrapper.error {
                let code = err.code.unwrap_or(status_code);
                return Self {
                    code,
                    message: err.message.unwrap_or_else(|| "Unknown error".to_string()),
                    status: err.status.unwrap_or_else(|| "UNKNOWN".to_string()),
                    service: service.to_string(),
                    method: None,
                    retryable: is_retryable_code(code),
                    response,
                };
            }
        }

        Self {
            code: status_code,
            message: if body.is_empty() {
                format!("HTTP {}", status_code)
            } else {
                body.chars().take(500).collect()
            },
            status: "UNKNOWN".to_string(),
            service: service.to_string(),
            method: None,
            retryable: is_retryable_code(status_code),
            response,
        }
    }

    /// Set the method that failed.
    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    /// The resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.code == 404 || self.status == "NOT_FOUND"
    }

    /// The resource already exists.
    pub fn is_conflict(&self) -> bool {
        self.code == 409 || self.status == "ALREADY_EXISTS"
    }
}

/// Convenience type alias for Compute Engine results.
pub type GcpResult<T> = Result<T, GcpError>;
