use cookie::{Cookie, SameSite};

use crate::types::AuthToken;

/// Cookie mirroring the current token for server-side route guards.
///
/// Not http-only: it is the client's copy of the token, written on every change.
#[must_use]
pub fn auth_token_cookie(name: &str, token: &AuthToken) -> Cookie<'static> {
    Cookie::build((name.to_string(), token.as_str().to_string()))
        .path("/".to_string())
        .same_site(SameSite::Lax)
        .build()
}

/// Read a token out of a raw `Cookie` header value. Empty values count as absent.
#[must_use]
pub fn token_from_header(header: &str, name: &str) -> Option<AuthToken> {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .map(AuthToken::from)
}
