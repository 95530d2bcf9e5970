//! Authentication & Authorization
//!
//! Firebase ID token verification, a verified-token cache, request extractors
//! and role gates.

pub mod cache;
pub mod extractor;
pub mod identity;
pub mod permissions;

pub use cache::TokenCache;
pub use extractor::{AuthUser, Identity};
pub use identity::{DevVerifier, FirebaseVerifier, IdentityVerifier, StaticVerifier, VerifiedIdentity};
pub use permissions::*;

use std::sync::Arc;

use crate::models::{AppConfig, AppResult};

/// Pick the verifier the configuration asks for. Firebase wins when a key is
/// configured.
pub fn verifier_from_config(config: &AppConfig) -> AppResult<Arc<dyn IdentityVerifier>> {
    config.validate_auth()?;

    match &config.firebase_api_key {
        Some(key) => Ok(Arc::new(FirebaseVerifier::new(key.clone())?)),
        None => {
            tracing::warn!("LINKA_DEV_AUTH enabled: accepting dev:<uid>:<email> tokens");
            Ok(Arc::new(DevVerifier))
        }
    }
}
