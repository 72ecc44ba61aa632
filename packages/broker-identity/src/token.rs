// ABOUTME: Short-lived HMAC-signed session tokens carrying sub=user.id and exp
// ABOUTME: format: base64url(payload_json) "." base64url(hmac_sha256(payload_json))

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{IdentityError, Result};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_TTL: Duration = Duration::hours(24);

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

pub fn issue(user_id: &str, signing_key: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + TOKEN_TTL).timestamp(),
    };
    let payload = serde_json::to_vec(&claims).expect("claims always serialize");
    let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
    let signature = sign(payload_b64.as_bytes(), signing_key);
    format!("{payload_b64}.{signature}")
}

/// Returns the user id carried by a valid, unexpired token.
pub fn resolve(token: &str, signing_key: &str) -> Result<String> {
    let (payload_b64, signature) = token.split_once('.').ok_or(IdentityError::InvalidToken)?;

    let expected = sign(payload_b64.as_bytes(), signing_key);
    if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        return Err(IdentityError::InvalidToken);
    }

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| IdentityError::InvalidToken)?;
    let claims: Claims =
        serde_json::from_slice(&payload).map_err(|_| IdentityError::InvalidToken)?;

    let expires_at =
        DateTime::from_timestamp(claims.exp, 0).ok_or(IdentityError::InvalidToken)?;
    if expires_at < Utc::now() {
        return Err(IdentityError::InvalidToken);
    }

    Ok(claims.sub)
}

fn sign(payload: &[u8], signing_key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(signing_key.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload);
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "test-signing-key";

    #[test]
    fn issued_token_resolves_to_same_user() {
        let token = issue("usr_abc", KEY);
        assert_eq!(resolve(&token, KEY).unwrap(), "usr_abc");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issue("usr_abc", KEY);
        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode(b"{\"sub\":\"usr_evil\",\"exp\":9999999999}"), sig);
        assert!(resolve(&forged, KEY).is_err());
    }

    #[test]
    fn wrong_signing_key_is_rejected() {
        let token = issue("usr_abc", KEY);
        assert!(resolve(&token, "a-different-key").is_err());
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(resolve("not-a-token", KEY).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: "usr_abc".to_string(),
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
        };
        let payload = serde_json::to_vec(&claims).unwrap();
        let payload_b64 = URL_SAFE_NO_PAD.encode(&payload);
        let signature = sign(payload_b64.as_bytes(), KEY);
        let token = format!("{payload_b64}.{signature}");
        assert!(resolve(&token, KEY).is_err());
    }
}
