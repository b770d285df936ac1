use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors raised by the route guard middleware and its extractor.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// No token cookie or bearer header.
    #[error("Not authenticated")]
    Unauthenticated,

    /// Token present but past its `exp` claim.
    #[error("Session expired")]
    SessionExpired,

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated | Self::SessionExpired => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            Self::Config(_) => {
                tracing::error!(error = %self, "Route guard misconfigured");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
