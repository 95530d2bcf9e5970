//! Identity provider adapters
//!
//! The frontend signs users in with Firebase Authentication and sends the
//! resulting ID token as `Authorization: Bearer <token>`. The backend only
//! needs to turn that token into a stable uid and email.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::{AppError, AppResult, ErrorCode};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

/// Identity proven by a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Provider user id (Firebase `localId`)
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Resolve a bearer token. Invalid tokens are `AUTH_UNAUTHORIZED`.
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity>;

    fn name(&self) -> &'static str;
}

// ============================================
// Firebase
// ============================================

/// Verifies ID tokens through the Identity Toolkit `accounts:lookup` endpoint
pub struct FirebaseVerifier {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    display_name: Option<String>,
    #[serde(default)]
    disabled: bool,
}

impl FirebaseVerifier {
    pub fn new(api_key: impl Into<String>) -> AppResult<Self> {
        Self::with_endpoint(api_key, IDENTITY_TOOLKIT_URL)
    }

    pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "idToken": token }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            // INVALID_ID_TOKEN, TOKEN_EXPIRED, USER_NOT_FOUND all come back as 400
            debug!(status = status.as_u16(), "Firebase rejected ID token");
            return Err(AppError::unauthorized("Invalid or expired token"));
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "Firebase lookup failed");
            return Err(AppError::new(
                ErrorCode::AuthProviderUnavailable,
                format!("Identity provider returned {}", status.as_u16()),
            ));
        }

        let body: LookupResponse = response.json().await?;
        let user = body
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))?;

        if user.disabled {
            return Err(AppError::forbidden("Account disabled"));
        }

        Ok(VerifiedIdentity {
            uid: user.local_id,
            email: user.email,
            email_verified: user.email_verified,
            display_name: user.display_name,
        })
    }

    fn name(&self) -> &'static str {
        "firebase"
    }
}

// ============================================
// Local development
// ============================================

/// Accepts `dev:<uid>:<email>` tokens without calling any provider
pub struct DevVerifier;

#[async_trait]
impl IdentityVerifier for DevVerifier {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        let mut parts = token.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("dev"), Some(uid), Some(email)) if !uid.is_empty() && email.contains('@') => {
                Ok(VerifiedIdentity {
                    uid: uid.to_string(),
                    email: Some(email.to_string()),
                    email_verified: true,
                    display_name: None,
                })
            }
            _ => Err(AppError::unauthorized("Malformed development token")),
        }
    }

    fn name(&self) -> &'static str {
        "dev"
    }
}

// ============================================
// Fixed token table
// ============================================

/// Token table known up front. Used by tests and demos.
#[derive(Default)]
pub struct StaticVerifier {
    tokens: HashMap<String, VerifiedIdentity>,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: &str, uid: &str, email: &str) -> Self {
        self.tokens.insert(
            token.to_string(),
            VerifiedIdentity {
                uid: uid.to_string(),
                email: Some(email.to_string()),
                email_verified: true,
                display_name: None,
            },
        );
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> AppResult<VerifiedIdentity> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
