use std::fmt;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::token;

/// Opaque bearer token issued by the backend.
///
/// `Debug` is redacted so tokens never end up in logs by accident.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("AuthToken(\"\")")
        } else {
            f.write_str("AuthToken(***)")
        }
    }
}

/// Id of the authenticated user record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

/// In-memory authentication state.
///
/// Only [`SessionManager`](crate::SessionManager) creates or replaces one.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(crate) token: AuthToken,
    pub(crate) user_id: Option<UserId>,
    pub(crate) valid: bool,
    /// Whether the token may be written to durable storage.
    pub(crate) remembered: bool,
}

impl Session {
    pub(crate) fn new(token: AuthToken, user_id: Option<UserId>, remembered: bool) -> Self {
        Self {
            valid: !token.is_empty(),
            token,
            user_id,
            remembered,
        }
    }

    /// Valid flag set, token non-empty, and not past its `exp` claim.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid && !self.token.is_empty() && !token::is_expired(self.token.as_str())
    }

    #[must_use]
    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }
}

/// Paginated envelope returned by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ListResult<R> {
    pub page: u32,
    pub per_page: u32,
    #[serde(default)]
    pub total_items: i64,
    #[serde(default)]
    pub total_pages: i64,
    pub items: Vec<R>,
}

/// User record attached to an auth response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub verified: Option<bool>,
}

/// Response body of password authentication and token refresh.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct AuthResponse {
    pub token: AuthToken,
    pub record: AuthUser,
}
