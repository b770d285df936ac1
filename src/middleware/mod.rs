//! Server-side route guard for Axum.
//!
//! Reads the token cookie the client mirrors on every session change and
//! redirects before the page handler runs.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tutor_session::middleware::{GuardConfig, guarded};
//!
//! let config = GuardConfig::from_env()?;
//! let app = guarded(pages_router, config);
//! ```

mod config;
mod error;
mod extractor;
mod layer;
mod state;

pub use config::GuardConfig;
pub use error::GuardError;
pub use extractor::SessionToken;
pub use layer::{guarded, require_session};
pub use state::GuardState;
