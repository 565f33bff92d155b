//! Connection configuration, service-account keys, zone naming and retry
//! settings.

use serde::{Deserialize, Serialize};

// ── Regions & Zones ─────────────────────────────────────────────────────

/// Compute Engine regions that host zonal autoscalers.
pub const GCP_REGIONS: &[&str] = &[
    // Americas
    "us-central1",
    "us-east1",
    "us-east4",
    "us-east5",
    "us-south1",
    "us-west1",
    "us-west2",
    "us-west3",
    "us-west4",
    "northamerica-northeast1",
    "northamerica-northeast2",
    "southamerica-east1",
    "southamerica-west1",
    // Europe
    "europe-central2",
    "europe-north1",
    "europe-southwest1",
    "europe-west1",
    "europe-west2",
    "europe-west3",
    "europe-west4",
    "europe-west6",
    "europe-west8",
    "europe-west9",
    "europe-west10",
    "europe-west12",
    // Asia-Pacific
    "asia-east1",
    "asia-east2",
    "asia-northeast1",
    "asia-northeast2",
    "asia-northeast3",
    "asia-south1",
    "asia-south2",
    "asia-southeast1",
    "asia-southeast2",
    // Middle East & Africa
    "me-central1",
    "me-central2",
    "me-west1",
    "africa-south1",
    // Australia
    "australia-southeast1",
    "australia-southeast2",
];

/// Split a zone name (`us-central1-a`) into its region (`us-central1`).
pub fn zone_region(zone: &str) -> Option<&str> {
    let (region, suffix) = zone.rsplit_once('-')?;
    if suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_lowercase()) {
        Some(region)
    } else {
        None
    }
}

/// Check that a zone name belongs to a known region.
pub fn is_valid_zone(zone: &str) -> bool {
    zone_region(zone).is_some_and(|r| GCP_REGIONS.contains(&r))
}

// ── Service Account Key ─────────────────────────────────────────────────

/// Parsed service account key JSON file (downloaded from Google Cloud Console).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub r#type: String,
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    /// Parse a service account key from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("Invalid service account key JSON: {}", e))
    }

    /// Validate the key has required fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.r#type != "service_account" {
            return Err(format!("Expected type 'service_account', got '{}'", self.r#type));
        }
        if self.project_id.is_empty() {
            return Err("project_id is empty".to_string());
        }
        if self.private_key.is_empty() {
            return Err("private_key is empty".to_string());
        }
        if self.client_email.is_empty() {
            return Err("client_email is empty".to_string());
        }
        Ok(())
    }
}

// ── Retry ───────────────────────────────────────────────────────────────

/// Backoff policy of the shared request layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one (default: 3).
    pub max_attempts: u32,
    /// Initial backoff in milliseconds (default: 500).
    pub initial_backoff_ms: u64,
    /// Backoff ceiling in milliseconds (default: 20_000).
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 20_000,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

// ── Connection Config ───────────────────────────────────────────────────

/// Configuration for connecting to a Compute Engine project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConnectionConfig {
    /// GCP project ID.
    pub project_id: String,
    /// Raw JSON of a service account key file.
    #[serde(default)]
    pub service_account_key_json: Option<String>,
    /// Pre-issued OAuth2 access token, used instead of a key file.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Default zone for zonal resources.
    #[serde(default)]
    pub zone: Option<String>,
    /// OAuth2 scopes to request.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Custom API endpoint override (for emulators/testing).
    #[serde(default)]
    pub endpoint_override: Option<String>,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/compute".to_string()]
}

impl GcpConnectionConfig {
    /// Validate the connection config.
    pub fn validate(&self) -> Result<(), String> {
        if self.project_id.is_empty() {
            return Err("project_id is required".to_string());
        }
        match (&self.service_account_key_json, &self.access_token) {
            (Some(json), None) => {
                let key = ServiceAccountKey::from_json(json)?;
                key.validate()?;
                if key.project_id != self.project_id {
                    return Err(format!(
                        "project_id mismatch: config says '{}' but key says '{}'",
                        self.project_id, key.project_id
                    ));
                }
            }
            (None, Some(token)) => {
                if token.is_empty() {
                    return Err("access_token is empty".to_string());
                }
            }
            (Some(_), Some(_)) => {
                return Err(
                    "service_account_key_json and access_token are mutually exclusive".to_string(),
                )
            }
            (None, None) => {
                return Err("either service_account_key_json or access_token is required".to_string())
            }
        }
        if let Some(ref zone) = self.zone {
            if !is_valid_zone(zone) {
                return Err(format!("Invalid GCP zone: {}", zone));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}
