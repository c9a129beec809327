//! Decoding of compact `header.payload.signature` tokens.
//!
//! Signatures are not checked here. The issuer is trusted at the network
//! boundary and the server rejects forged tokens with a 401.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Token is empty or contains an empty segment")]
    Malformed,

    #[error("Token has {0} segments, expected 3")]
    SegmentCount(usize),

    #[error("Token payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Token payload is not a valid claim set: {0}")]
    Claims(#[from] serde_json::Error),
}

/// The claim set carried in a token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject. The identity service puts the account email here.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Claims {
    /// Lower-cased subject.
    pub fn email(&self) -> String {
        self.sub.to_lowercase()
    }

    /// A token is expired once `now` has reached its `exp` second.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Decode the claim set of `token` without verifying its signature.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = token.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(DecodeError::SegmentCount(segments.len()));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(DecodeError::Malformed);
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = match URL_SAFE_NO_PAD.decode(payload) {
        Ok(bytes) => bytes,
        // Some issuers emit the standard alphabet
        Err(_) => STANDARD_NO_PAD.decode(payload)?,
    };

    Ok(serde_json::from_slice(&bytes)?)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_decode_reads_subject_expiry_and_role() {
        let token = token_with_payload(&json!({
            "sub": "A@X.com", "exp": 2_000_000_000_i64, "role": "ADMIN", "iat": 1_000
        }));
        let claims = decode(&token).unwrap();
        assert_eq!(claims.sub, "A@X.com");
        assert_eq!(claims.email(), "a@x.com");
        assert_eq!(claims.exp, 2_000_000_000);
        assert_eq!(claims.role.as_deref(), Some("ADMIN"));
        assert_eq!(claims.iat, Some(1_000));
    }

    #[test]
    fn test_decode_accepts_standard_alphabet_with_padding() {
        let body = base64::engine::general_purpose::STANDARD
            .encode(json!({"sub": "a@x.com", "exp": 5}).to_string());
        let claims = decode(&format!("h.{body}.s")).unwrap();
        assert_eq!(claims.exp, 5);
    }

    #[test]
    fn test_decode_rejects_wrong_segment_count() {
        assert!(matches!(decode("abc"), Err(DecodeError::SegmentCount(1))));
        assert!(matches!(decode("a.b.c.d"), Err(DecodeError::SegmentCount(4))));
        assert!(matches!(decode("a..c"), Err(DecodeError::Malformed)));
    }

    #[test]
    fn test_decode_rejects_garbage_payload() {
        assert!(matches!(decode("h.@@@.s"), Err(DecodeError::Base64(_))));

        let not_json = URL_SAFE_NO_PAD.encode("hello");
        assert!(matches!(decode(&format!("h.{not_json}.s")), Err(DecodeError::Claims(_))));
    }

    #[test]
    fn test_decode_requires_sub_and_exp() {
        let no_sub = token_with_payload(&json!({ "exp": 5 }));
        assert!(matches!(decode(&no_sub), Err(DecodeError::Claims(_))));

        let no_exp = token_with_payload(&json!({ "sub": "a@x.com" }));
        assert!(matches!(decode(&no_exp), Err(DecodeError::Claims(_))));
    }

    #[test]
    fn test_expiry_boundary_counts_as_expired() {
        let claims = decode(&token_for("a@x.com", 1_000)).unwrap();
        let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
        assert!(!claims.is_expired_at(at(999)));
        assert!(claims.is_expired_at(at(1_000)));
        assert!(claims.is_expired_at(at(1_001)));
    }
}
