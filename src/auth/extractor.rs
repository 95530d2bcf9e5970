//! Request extractors for authenticated routes

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tracing::debug;

use super::identity::VerifiedIdentity;
use crate::api::handlers::AppState;
use crate::models::{AppError, AppResult, ErrorCode, User};
use crate::services::users;

/// Bearer token verified with the identity provider. No account required.
#[derive(Debug, Clone)]
pub struct Identity(pub VerifiedIdentity);

/// Registered, active Link-A user behind the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Malformed Authorization header"))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Expected a Bearer token"))?;

    Ok(token)
}

/// Cache first, identity provider on a miss
pub async fn authenticate(state: &AppState, token: &str) -> AppResult<VerifiedIdentity> {
    if let Some(identity) = state.token_cache.get(token) {
        return Ok(identity);
    }

    let identity = state.verifier.verify(token).await?;
    debug!(uid = %identity.uid, verifier = state.verifier.name(), "token verified");
    state.token_cache.set(token, identity.clone());
    Ok(identity)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        authenticate(state, token).await.map(Identity)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Identity(identity) = Identity::from_request_parts(parts, state).await?;

        let user = users::find_by_firebase_uid(&state.db, &identity.uid)
            .await?
            .ok_or_else(|| {
                AppError::new(
                    ErrorCode::AuthNotRegistered,
                    "No Link-A account for this login. Register first.",
                )
            })?;

        if !user.is_active {
            return Err(AppError::forbidden("Account is deactivated"));
        }

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(bearer_token(&headers).is_err());
    }
}
