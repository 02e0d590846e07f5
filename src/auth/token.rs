//! Compact HMAC-SHA256 signed session tokens.
//!
//! Format: `base64url(claims-json) . base64url(mac)`. Claims carry the
//! user id, an expiry instant and the token kind, so an access token
//! can never be replayed against the refresh endpoint (and vice versa)
//! even if the two secrets were ever set to the same value.
//! Verification is constant-time via `Mac::verify_slice`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    exp: i64,
    kind: TokenKind,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token kind")]
    WrongKind,
}

fn mac(secret: &str, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    mac
}

/// Sign a token for `user_id` expiring `ttl_secs` from now.
pub fn sign_token(user_id: i64, kind: TokenKind, ttl_secs: i64, secret: &str) -> String {
    let claims = Claims {
        sub: user_id,
        exp: Utc::now().timestamp() + ttl_secs,
        kind,
    };
    let payload =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).expect("claims serialize"));
    let tag = mac(secret, payload.as_bytes()).finalize().into_bytes();
    format!("{payload}.{}", URL_SAFE_NO_PAD.encode(tag))
}

/// Verify signature, expiry and kind; returns the user id.
pub fn verify_token(token: &str, kind: TokenKind, secret: &str) -> Result<i64, TokenError> {
    let (payload, sig) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let sig = URL_SAFE_NO_PAD
        .decode(sig)
        .map_err(|_| TokenError::Malformed)?;

    mac(secret, payload.as_bytes())
        .verify_slice(&sig)
        .map_err(|_| TokenError::BadSignature)?;

    let claims: Claims = URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(TokenError::Malformed)?;

    if claims.kind != kind {
        return Err(TokenError::WrongKind);
    }
    if claims.exp <= Utc::now().timestamp() {
        return Err(TokenError::Expired);
    }
    Ok(claims.sub)
}

/// Random anti-forgery value for the double-submit cookie.
pub fn generate_csrf_token() -> String {
    let bytes: [u8; 24] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn sign_verify_round_trip() {
        let token = sign_token(7, TokenKind::Access, 60, SECRET);
        assert_eq!(verify_token(&token, TokenKind::Access, SECRET), Ok(7));
    }

    #[test]
    fn wrong_secret_fails() {
        let token = sign_token(7, TokenKind::Access, 60, SECRET);
        assert_eq!(
            verify_token(&token, TokenKind::Access, "other-secret"),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn wrong_kind_fails() {
        let token = sign_token(7, TokenKind::Refresh, 60, SECRET);
        assert_eq!(
            verify_token(&token, TokenKind::Access, SECRET),
            Err(TokenError::WrongKind)
        );
    }

    #[test]
    fn expired_token_fails() {
        let token = sign_token(7, TokenKind::Access, -1, SECRET);
        assert_eq!(
            verify_token(&token, TokenKind::Access, SECRET),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tampered_payload_fails() {
        let token = sign_token(7, TokenKind::Access, 60, SECRET);
        let (_, sig) = token.split_once('.').unwrap();
        let forged_payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(br#"{"sub":999,"exp":9999999999,"kind":"access"}"#);
        let forged = format!("{forged_payload}.{sig}");
        assert_eq!(
            verify_token(&forged, TokenKind::Access, SECRET),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            verify_token("not-a-token", TokenKind::Access, SECRET),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn csrf_tokens_are_unique() {
        assert_ne!(generate_csrf_token(), generate_csrf_token());
    }
}
