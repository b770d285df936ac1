use std::future::Future;

use crate::error::Error;
use crate::session::SessionManager;
use crate::transport::Transport;

/// Run `op`; on a stale-auth rejection refresh once and run it exactly once more.
///
/// `op` must read the token afresh on every call so the retry carries the
/// refreshed one. The retry's outcome is returned as is, a second 401 included.
///
/// # Errors
///
/// Returns [`Error::SessionExpired`] if the refresh itself fails (the session
/// is cleared by then), otherwise whatever `op` returns.
pub async fn with_auth_retry<T, R, F, Fut>(session: &SessionManager<T>, mut op: F) -> Result<R, Error>
where
    T: Transport,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, Error>>,
{
    match op().await {
        Err(e) if e.is_stale_auth() => {
            tracing::debug!(error = %e, "request rejected with stale auth, refreshing once");
            session
                .refresh()
                .await
                .map_err(|refresh_err| Error::SessionExpired(Box::new(refresh_err)))?;
            op().await
        }
        other => other,
    }
}
