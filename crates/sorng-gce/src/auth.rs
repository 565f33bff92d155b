//! OAuth2 bearer tokens for Compute Engine requests.
//!
//! [`TokenManager`] implements the service-account JWT → access-token
//! exchange documented at
//! <https://developers.google.com/identity/protocols/oauth2/service-account>
//! and caches the result until shortly before expiry. [`StaticToken`] wraps
//! a token issued elsewhere.

use crate::config::ServiceAccountKey;
use crate::error::{GcpError, GcpResult};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Source of bearer tokens for the request layer.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token valid for at least the next request.
    async fn token(&self) -> GcpResult<String>;
}

/// A token obtained out of band (gcloud, metadata server, emulator).
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> GcpResult<String> {
        Ok(self.0.clone())
    }
}

/// JWT claims for Google OAuth2.
#[derive(Debug, Serialize)]
struct JwtClaims {
    iss: String,
    scope: String,
    aud: String,
    exp: i64,
    iat: i64,
}

/// An OAuth2 access token with its expiry.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    /// Unix timestamp seconds.
    pub expires_at: i64,
}

impl AccessToken {
    /// Expired, counting a 60 s safety buffer.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.expires_at - 60
    }
}

/// Service-account token manager with caching.
pub struct TokenManager {
    service_account: ServiceAccountKey,
    scopes: Vec<String>,
    cached_token: Mutex<Option<AccessToken>>,
    http_client: Client,
}

impl TokenManager {
    pub fn new(service_account: ServiceAccountKey, scopes: Vec<String>, http_client: Client) -> Self {
        Self {
            service_account,
            scopes,
            cached_token: Mutex::new(None),
            http_client,
        }
    }

    /// Drop the cached token so the next call exchanges a new one.
    pub async fn invalidate(&self) {
        *self.cached_token.lock().await = None;
    }

    pub fn service_account_email(&self) -> &str {
        &self.service_account.client_email
    }

    fn signed_assertion(&self, now: i64) -> GcpResult<String> {
        let claims = JwtClaims {
            iss: self.service_account.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.service_account.token_uri.clone(),
            exp: now + 3600,
            iat: now,
        };

        let header = Header {
            alg: Algorithm::RS256,
            kid: Some(self.service_account.private_key_id.clone()),
            ..Default::default()
        };

        // Key files sometimes arrive with escaped newlines.
        let pem = self.service_account.private_key.replace("\\n", "\n");

        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| GcpError::auth_error(&format!("Failed to load private key: {}", e)))?;

        encode(&header, &claims, &encoding_key)
            .map_err(|e| GcpError::auth_error(&format!("Failed to encode JWT: {}", e)))
    }

    async fn fetch_new_token(&self) -> GcpResult<AccessToken> {
        let now = Utc::now().timestamp();
        let jwt = self.signed_assertion(now)?;

        let form = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", jwt.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.service_account.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| GcpError::auth_error(&format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GcpError::auth_error(&format!(
                "Token exchange failed (HTTP {}): {}",
                status, body
            )));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: Option<i64>,
        }

        let token_resp: TokenResponse = response
            .json()
            .await
            .map_err(|e| GcpError::auth_error(&format!("Failed to parse token response: {}", e)))?;

        log::debug!(
            "obtained access token for {} (expires in {}s)",
            self.service_account.client_email,
            token_resp.expires_in.unwrap_or(3600)
        );

        Ok(AccessToken {
            token: token_resp.access_token,
            expires_at: now + token_resp.expires_in.unwrap_or(3600),
        })
    }
}

#[async_trait]
impl TokenProvider for TokenManager {
    async fn token(&self) -> GcpResult<String> {
        let mut cached = self.cached_token.lock().await;
        if let Some(ref token) = *cached {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }
        let token = self.fetch_new_token().await?;
        let result = token.token.clone();
        *cached = Some(token);
        Ok(result)
    }
}
