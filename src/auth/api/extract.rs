//! Authenticated-user extractor

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use super::{cookies::access_token_from_headers, AppState};
use crate::auth::{errors::SessionError, types::UserProfile};

/// The caller, resolved from the `accessToken` cookie or a bearer token.
/// Rejects with 401 when the token is missing, invalid, expired or names a
/// user that no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserProfile);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = SessionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = access_token_from_headers(&parts.headers)
            .ok_or_else(|| SessionError::Auth("unauthorized request".to_string()))?;

        let user = state.sessions.authenticate(&token).await?;
        Ok(Self(user))
    }
}
