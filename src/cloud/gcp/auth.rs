//! Bearer token management for the GCP control plane.
//!
//! Tokens are minted via the OAuth2 JWT-bearer exchange: a claim set signed
//! with the service account's private key is traded at the token endpoint
//! for a short-lived access token, which is cached until shortly before it
//! expires.

use super::jwt::JwtSigner;
use crate::utils::error::{Result, SaverError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Google's production OAuth2 token endpoint.
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are treated as expired this long before their advertised expiry,
/// so a token handed out here always survives the request it authorizes.
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Cap on the advertised token lifetime. An endpoint returning an absurd
/// `expires_in` must not overflow the expiry instant.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(24 * 3600);

/// Service-account identity, loaded once and immutable afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(rename = "type", default)]
    pub account_type: String,
    #[serde(default)]
    pub client_email: String,
    #[serde(default)]
    pub private_key_id: String,
    pub private_key: String,
    #[serde(rename = "token_uri", default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: String,
}

fn default_token_uri() -> String {
    TOKEN_ENDPOINT.to_string()
}

impl Credentials {
    /// Load credentials from a service-account JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SaverError::config(format!("failed to read service account file: {e}"))
        })?;
        serde_json::from_str(&data)
            .map_err(|e| SaverError::config(format!("failed to parse service account JSON: {e}")))
    }

    /// Credentials carrying only a raw private key. Used by the `token`
    /// credentials type; not usable against the real control plane.
    pub fn from_private_key(private_key_pem: impl Into<String>) -> Self {
        Self {
            account_type: "token".to_string(),
            client_email: String::new(),
            private_key_id: String::new(),
            private_key: private_key_pem.into(),
            token_uri: default_token_uri(),
            project_id: String::new(),
        }
    }
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: String,
}

#[derive(Debug)]
struct TokenState {
    token: Option<String>,
    expires_at: Instant,
}

impl TokenState {
    fn valid_token(&self) -> Option<String> {
        match &self.token {
            Some(token) if Instant::now() < self.expires_at => Some(token.clone()),
            _ => None,
        }
    }
}

/// Mints and caches bearer tokens for the compute control plane.
///
/// The cache is guarded by an async mutex held across the refresh, so under
/// N concurrent callers racing an expired cache exactly one token exchange
/// reaches the network and every caller observes the refreshed token.
#[derive(Debug)]
pub struct TokenManager {
    credentials: Credentials,
    signer: JwtSigner,
    client: reqwest::Client,
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let signer = JwtSigner::new(&credentials.private_key)?;
        Ok(Self {
            credentials,
            signer,
            client: reqwest::Client::new(),
            state: Mutex::new(TokenState {
                token: None,
                expires_at: Instant::now(),
            }),
        })
    }

    /// Return the cached token if still valid, otherwise perform one
    /// JWT-bearer exchange and cache the result.
    pub async fn get_token(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        // Double check under the lock: a racing caller may have refreshed
        // while we waited.
        if let Some(token) = state.valid_token() {
            return Ok(token);
        }

        let response = self.exchange().await?;
        debug!("fetched new access token, expires in {}s", response.expires_in);

        let lifetime = Duration::from_secs(response.expires_in).min(MAX_TOKEN_LIFETIME);
        state.expires_at = Instant::now() + lifetime.saturating_sub(EXPIRY_SKEW);
        state.token = Some(response.access_token.clone());

        Ok(response.access_token)
    }

    async fn exchange(&self) -> Result<TokenResponse> {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iss: &self.credentials.client_email,
            scope: COMPUTE_SCOPE,
            aud: &self.credentials.token_uri,
            iat: now,
            exp: now + 3600,
        };

        let assertion = self.signer.sign(&claims)?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SaverError::auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SaverError::auth(format!(
                "token request failed with status {}",
                status.as_u16()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SaverError::auth(format!("failed to decode token response: {e}")))?;

        if token.access_token.is_empty() {
            return Err(SaverError::auth("received empty access token"));
        }

        Ok(token)
    }
}
