use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::engine::DecodePaddingMode;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use crate::error::Error;

/// base64url that tolerates encoders which keep the `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    NO_PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims read from an access token's payload segment.
///
/// The signature is NOT verified: the backend stays the authority on
/// validity. Claims are only used to predict expiry on the client.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    inner: JsonValue,
}

impl TokenClaims {
    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.inner
    }

    /// `exp` claim in seconds since the epoch.
    #[must_use]
    pub fn expires_at(&self) -> Option<f64> {
        self.inner.get("exp").and_then(JsonValue::as_f64)
    }

    /// `sub` claim (the backend puts the account email here).
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.inner.get("sub").and_then(JsonValue::as_str)
    }

    /// Expired relative to `now` (seconds since the epoch). A missing
    /// `exp` counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: f64) -> bool {
        self.expires_at().is_none_or(|exp| exp < now)
    }
}

/// Decode the payload of a three-segment `header.payload.signature` token.
///
/// # Errors
///
/// Returns `Error::Token` if the token does not have exactly three segments,
/// or the middle segment is not base64url-encoded JSON.
pub fn decode_claims(token: &str) -> Result<TokenClaims, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid token format".into()));
    }

    let payload = URL_SAFE_LENIENT
        .decode(parts[1])
        .map_err(|_| Error::Token("invalid payload encoding".into()))?;

    let inner: JsonValue = serde_json::from_slice(&payload)
        .map_err(|_| Error::Token("invalid payload".into()))?;
    if !inner.is_object() {
        return Err(Error::Token("invalid payload".into()));
    }

    Ok(TokenClaims { inner })
}

/// Expiry check that fails closed: no token, an undecodable token or a
/// token without `exp` are all treated as expired.
#[must_use]
pub fn is_expired(token: Option<&str>) -> bool {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return true;
    };
    match decode_claims(token) {
        Ok(claims) => claims.is_expired_at(now_seconds()),
        Err(e) => {
            tracing::debug!(error = %e, "Treating undecodable token as expired");
            true
        }
    }
}

fn now_seconds() -> f64 {
    let now = OffsetDateTime::now_utc();
    now.unix_timestamp() as f64 + f64::from(now.nanosecond()) / 1e9
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use serde_json::json;

    /// Unsigned test token carrying the given claims.
    pub(crate) fn make_token(claims: &JsonValue) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.signature")
    }

    pub(crate) fn token_expiring_in(secs: i64) -> String {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + secs;
        make_token(&json!({"sub": "a@b.com", "exp": exp}))
    }

    #[test]
    fn test_no_token_is_expired() {
        assert!(is_expired(None));
        assert!(is_expired(Some("")));
    }

    #[test]
    fn test_wrong_segment_count_is_expired() {
        assert!(is_expired(Some("abc")));
        assert!(is_expired(Some("a.b")));
        assert!(is_expired(Some("a.b.c.d")));
    }

    #[test]
    fn test_garbage_payload_is_expired() {
        assert!(is_expired(Some("header.!!!not-base64!!!.sig")));
        let not_json = URL_SAFE_NO_PAD.encode("not json");
        assert!(is_expired(Some(&format!("h.{not_json}.s"))));
        let not_object = URL_SAFE_NO_PAD.encode("42");
        assert!(is_expired(Some(&format!("h.{not_object}.s"))));
    }

    #[test]
    fn test_past_exp_is_expired() {
        assert!(is_expired(Some(&token_expiring_in(-60))));
    }

    #[test]
    fn test_future_exp_is_valid() {
        assert!(!is_expired(Some(&token_expiring_in(3600))));
    }

    #[test]
    fn test_missing_exp_is_expired() {
        let token = make_token(&json!({"sub": "a@b.com"}));
        assert!(is_expired(Some(&token)));
    }

    #[test]
    fn test_padded_payload_accepted() {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + 3600;
        let payload = STANDARD.encode(json!({"exp": exp, "sub": "a"}).to_string());
        let token = format!("h.{}.s", payload.replace('+', "-").replace('/', "_"));
        assert!(!is_expired(Some(&token)));
    }

    #[test]
    fn test_claims_accessors() {
        let claims = decode_claims(&make_token(&json!({"sub": "a@b.com", "exp": 100}))).unwrap();
        assert_eq!(claims.subject(), Some("a@b.com"));
        assert_eq!(claims.expires_at(), Some(100.0));
        assert!(claims.is_expired_at(101.0));
        assert!(!claims.is_expired_at(99.0));
        assert_eq!(claims.get_claim("sub"), Some(&json!("a@b.com")));
    }
}
