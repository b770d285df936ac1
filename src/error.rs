use std::fmt;

/// Why a gated request was released without a result of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supersession {
    /// A newer request for the same key arrived inside the quiet period.
    Debounced,
    /// The transport cancelled the request in favour of a newer duplicate.
    Transport,
}

impl fmt::Display for Supersession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debounced => f.write_str("superseded by a newer debounced request"),
            Self::Transport => f.write_str("auto-cancelled by the transport"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("token storage error: {0}")]
    Storage(#[from] std::io::Error),
    /// The transport dropped the request on its own initiative.
    #[error("request aborted: {0}")]
    Aborted(String),
    #[error("request {0}")]
    Superseded(Supersession),
    #[error("not authenticated")]
    NotAuthenticated,
    /// Token refresh failed; the session has already been cleared.
    #[error("session expired: {0}")]
    SessionExpired(#[source] Box<Error>),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status carried by a backend rejection, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the backend rejected the current token.
    #[must_use]
    pub fn is_stale_auth(&self) -> bool {
        self.status() == Some(401)
    }

    /// True when the transport cancelled the request because a duplicate replaced it.
    #[must_use]
    pub fn is_auto_cancelled(&self) -> bool {
        match self {
            Self::Aborted(_) => true,
            Self::Api { message, .. } => {
                let message = message.to_ascii_lowercase();
                message.contains("autocancelled") || message.contains("auto-cancelled")
            }
            _ => false,
        }
    }

    /// True for errors UI code should drop silently because a newer result is on its way.
    #[must_use]
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }

    /// Single human-readable message for surfacing at a service boundary.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            Self::Api { status, .. } => format!("The server rejected the request ({status})."),
            Self::Http(_) => "Could not reach the server. Please try again.".into(),
            Self::NotAuthenticated => "You must be logged in to continue.".into(),
            Self::SessionExpired(_) => "Your session has expired. Please log in again.".into(),
            Self::InvalidInput(what) => format!("Invalid input: {what}."),
            Self::Superseded(_) => "A newer request replaced this one.".into(),
            _ => "An unexpected error occurred. Please try again.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> Error {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    #[test]
    fn test_stale_auth_only_for_401() {
        assert!(api(401, "The request requires valid record authorization token.").is_stale_auth());
        assert!(!api(403, "forbidden").is_stale_auth());
        assert!(!Error::NotAuthenticated.is_stale_auth());
    }

    #[test]
    fn test_auto_cancellation_is_detected_by_flag_and_message() {
        assert!(Error::Aborted("duplicate".into()).is_auto_cancelled());
        assert!(api(0, "The request was autocancelled.").is_auto_cancelled());
        assert!(api(0, "Request AUTO-CANCELLED by client").is_auto_cancelled());
        assert!(!api(400, "Failed to load the collection.").is_auto_cancelled());
    }

    #[test]
    fn test_only_supersession_is_ignorable() {
        assert!(Error::Superseded(Supersession::Debounced).is_ignorable());
        assert!(Error::Superseded(Supersession::Transport).is_ignorable());
        assert!(!api(401, "unauthorized").is_ignorable());
    }

    #[test]
    fn test_user_message_prefers_backend_message() {
        assert_eq!(api(400, "Invalid filter.").user_message(), "Invalid filter.");
        assert_eq!(
            api(500, "").user_message(),
            "The server rejected the request (500)."
        );
        let expired = Error::SessionExpired(Box::new(api(401, "nope")));
        assert_eq!(
            expired.user_message(),
            "Your session has expired. Please log in again."
        );
    }
}
