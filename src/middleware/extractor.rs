use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;

use super::error::GuardError;
use super::state::GuardState;
use crate::token;
use crate::types::AuthToken;

/// Token of the client making the request, read from the auth cookie or an
/// `Authorization: Bearer` header.
///
/// Use as an Axum extractor in route handlers. Returns `401 Unauthorized`
/// if no usable token is present.
///
/// # Example
///
/// ```rust,ignore
/// async fn proxy(SessionToken(token): SessionToken) -> impl IntoResponse {
///     forward_with(token).await
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionToken(pub AuthToken);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
    GuardState: FromRef<S>,
{
    type Rejection = GuardError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = GuardState::from_ref(state);
        resolve_token(&parts.headers, &state.config.cookie_name).map(Self)
    }
}

/// Cookie first, then bearer header. Empty and expired tokens are rejected.
pub(super) fn resolve_token(headers: &HeaderMap, cookie_name: &str) -> Result<AuthToken, GuardError> {
    let jar = CookieJar::from_headers(headers);
    let token = jar
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| bearer_token(headers))
        .ok_or(GuardError::Unauthenticated)?;

    if token::is_expired(&token) {
        return Err(GuardError::SessionExpired);
    }
    Ok(AuthToken::from(token))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
