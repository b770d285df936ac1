#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod gate;
pub mod guard;
#[cfg(feature = "middleware")]
pub mod middleware;
pub mod records;
pub mod retry;
pub mod session;
pub mod storage;
pub mod token;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use client::Client;
pub use config::ClientConfig;
pub use error::{Error, Supersession};
pub use gate::RequestGate;
pub use guard::{GuardDecision, PUBLIC_ROUTES, RouteGuard, is_public_route};
pub use records::{ListOptions, RecordOptions, RecordService};
pub use retry::with_auth_retry;
pub use session::SessionManager;
pub use storage::{FileStorage, MemoryStorage, TokenStorage};
pub use transport::{ApiRequest, HttpTransport, Query, Transport};
pub use types::{AuthResponse, AuthToken, AuthUser, ListResult, Session, UserId};
