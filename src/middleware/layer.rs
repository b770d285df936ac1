use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};

use super::config::GuardConfig;
use super::extractor::resolve_token;
use super::state::GuardState;
use crate::guard::GuardDecision;

/// Wrap `router` so every request passes the route guard first.
pub fn guarded<S>(router: Router<S>, config: GuardConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(
        GuardState::new(config),
        require_session,
    ))
}

/// Redirects to login (with return URL) or to the landing page; passes everything else through.
pub async fn require_session(
    State(state): State<GuardState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);

    let authenticated = match resolve_token(request.headers(), &state.config.cookie_name) {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(path = %path, reason = %e, "request without usable session token");
            false
        }
    };

    match state
        .config
        .guard
        .decide(&path, query.as_deref(), authenticated)
    {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::RedirectToLogin(location) | GuardDecision::RedirectToLanding(location) => {
            tracing::debug!(path = %path, authenticated, location = %location, "route guard redirect");
            Redirect::to(&location).into_response()
        }
    }
}
