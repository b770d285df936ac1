use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

/// Reads the `exp` claim of a JWT-shaped token without verifying its signature.
///
/// Returns `None` for opaque tokens or tokens without a numeric `exp`.
/// Signature checks belong to the backend; this is only used to avoid
/// presenting a token that is known to be stale.
#[must_use]
pub fn expires_at(token_str: &str) -> Option<OffsetDateTime> {
    let parts: Vec<&str> = token_str.split('.').collect();
    if parts.len() != 3 || parts[1].is_empty() {
        return None;
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;
    let claims: JsonValue = serde_json::from_slice(&payload).ok()?;
    let exp = claims.get("exp")?.as_i64()?;

    OffsetDateTime::from_unix_timestamp(exp).ok()
}

/// True when the token carries an `exp` claim that is already in the past.
#[must_use]
pub fn is_expired(token_str: &str) -> bool {
    expires_at(token_str).is_some_and(|exp| exp <= OffsetDateTime::now_utc())
}

#[cfg(test)]
pub(crate) fn jwt_with_exp(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"id":"u1","exp":{exp}}}"#));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}
