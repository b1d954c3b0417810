use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Claims carried by the access token cookie. Decoded without signature
/// verification: the value is a scheduling hint, the server re-validates
/// every request. Never use these fields for an authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("token contains characters outside the cookie-safe set")]
    DisallowedCharacters,
    #[error("token does not split into three segments")]
    MalformedStructure,
    #[error("token payload is not base64url")]
    BadPayloadEncoding,
    #[error("token payload is not a claims object")]
    BadClaims,
}

/// The charset gate applied to cookie values before they are trusted
/// anywhere (tokens, csrf). Mirrors what a well-behaved backend sets.
pub fn is_cookie_safe(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Decode the claims segment of a bearer token. Malformed input is a normal
/// outcome, not an exceptional one.
pub fn decode_claims(raw: &str) -> Result<Claims, DecodeError> {
    if !is_cookie_safe(raw) {
        return Err(DecodeError::DisallowedCharacters);
    }

    let segments: Vec<&str> = raw.split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::MalformedStructure);
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|_| DecodeError::BadPayloadEncoding)?;

    serde_json::from_slice(&payload).map_err(|_| DecodeError::BadClaims)
}

/// Time left before the token expires, clamped at zero. A token that fails
/// to decode counts as already expired.
pub fn time_until_expiry(raw: &str, now: DateTime<Utc>) -> Duration {
    let Ok(claims) = decode_claims(raw) else {
        return Duration::zero();
    };
    Duration::seconds((claims.exp - now.timestamp()).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

    fn mint(claims: &Claims) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(b"test-signing-key"),
        )
        .unwrap()
    }

    #[test]
    fn round_trips_minted_claims() {
        let claims = Claims {
            id: "user-1".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_000_900,
        };
        let token = mint(&claims);
        assert_eq!(decode_claims(&token).unwrap(), claims);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        let token = mint(&Claims {
            id: "user-1".to_string(),
            iat: 0,
            exp: 0,
        });
        let truncated = token.rsplit_once('.').unwrap().0;
        assert_eq!(
            decode_claims(truncated),
            Err(DecodeError::MalformedStructure)
        );
        assert_eq!(
            decode_claims(&format!("{token}.extra")),
            Err(DecodeError::MalformedStructure)
        );
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert_eq!(
            decode_claims("seg one.two.three"),
            Err(DecodeError::DisallowedCharacters)
        );
        assert_eq!(decode_claims(""), Err(DecodeError::DisallowedCharacters));
    }

    #[test]
    fn rejects_tampered_payload() {
        let token = mint(&Claims {
            id: "user-1".to_string(),
            iat: 0,
            exp: 0,
        });
        let mut segments: Vec<&str> = token.split('.').collect();
        segments[1] = "bm90LWpzb24"; // "not-json"
        let tampered = segments.join(".");
        assert_eq!(decode_claims(&tampered), Err(DecodeError::BadClaims));
    }

    #[test]
    fn expiry_is_clamped_and_zero_for_invalid() {
        let now = Utc::now();
        let live = mint(&Claims {
            id: "user-1".to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + 600,
        });
        assert_eq!(time_until_expiry(&live, now), Duration::seconds(600));

        let stale = mint(&Claims {
            id: "user-1".to_string(),
            iat: now.timestamp() - 900,
            exp: now.timestamp() - 300,
        });
        assert_eq!(time_until_expiry(&stale, now), Duration::zero());

        assert_eq!(time_until_expiry("garbage", now), Duration::zero());
    }
}
