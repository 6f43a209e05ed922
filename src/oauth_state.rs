//! Signed OAuth state tokens.
//!
//! The state parameter carried through the provider round-trip is a
//! self-contained signed token rather than a server-side session lookup:
//! `base64url(payload_json) + "." + base64url(hmac_sha256(payload_json))`.
//! The payload records who initiated the flow, for which platform, and
//! when, so the callback can verify authenticity and freshness without
//! any shared storage.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a state token, in milliseconds, unless
/// overridden through configuration.
pub const DEFAULT_MAX_AGE_MS: i64 = 10 * 60 * 1000;

/// Claims carried inside a state token.
///
/// Field names match the wire format consumed by the dashboard tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub platform: String,
    /// Issuance time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Ways a state token can fail verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("state token is malformed: {0}")]
    Malformed(String),
    #[error("state token signature does not verify")]
    BadSignature,
    #[error("state token was issued for platform '{actual}', not '{expected}'")]
    PlatformMismatch { expected: String, actual: String },
    #[error("state token expired: age {age_ms}ms exceeds {max_age_ms}ms")]
    Expired { age_ms: i64, max_age_ms: i64 },
}

/// Issues and verifies HMAC-signed state tokens.
///
/// The signing secret is wiped from memory when the signer is dropped,
/// like the token encryption key.
#[derive(Clone)]
pub struct StateSigner {
    secret: Zeroizing<Vec<u8>>,
    max_age_ms: i64,
}

impl StateSigner {
    pub fn new(secret: impl Into<Vec<u8>>, max_age_ms: i64) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            max_age_ms,
        }
    }

    /// Issue a signed state token for a connect flow starting now.
    pub fn issue(&self, user_id: &str, platform: &str) -> String {
        self.issue_at(user_id, platform, Utc::now().timestamp_millis())
    }

    fn issue_at(&self, user_id: &str, platform: &str, timestamp: i64) -> String {
        let payload = StatePayload {
            user_id: user_id.to_string(),
            platform: platform.to_string(),
            timestamp,
        };
        // StatePayload has no unserializable fields.
        let payload_json = serde_json::to_vec(&payload).expect("state payload serializes");
        let mac = self.mac(&payload_json);

        format!(
            "{}.{}",
            base64_url::encode(&payload_json),
            base64_url::encode(&mac)
        )
    }

    /// Verify a state token: signature first, then payload shape, then
    /// platform binding, then freshness.
    pub fn verify(&self, token: &str, expected_platform: &str) -> Result<StatePayload, StateError> {
        self.verify_at(token, expected_platform, Utc::now().timestamp_millis())
    }

    fn verify_at(
        &self,
        token: &str,
        expected_platform: &str,
        now_ms: i64,
    ) -> Result<StatePayload, StateError> {
        let (payload_b64, mac_b64) = token
            .split_once('.')
            .ok_or_else(|| StateError::Malformed("missing signature separator".to_string()))?;

        let payload_json = base64_url::decode(payload_b64)
            .map_err(|e| StateError::Malformed(format!("payload is not base64url: {}", e)))?;
        let mac = base64_url::decode(mac_b64)
            .map_err(|e| StateError::Malformed(format!("signature is not base64url: {}", e)))?;

        let mut verifier =
            HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        verifier.update(&payload_json);
        verifier
            .verify_slice(&mac)
            .map_err(|_| StateError::BadSignature)?;

        let payload: StatePayload = serde_json::from_slice(&payload_json)
            .map_err(|e| StateError::Malformed(format!("payload is not valid JSON: {}", e)))?;

        if payload.platform != expected_platform {
            return Err(StateError::PlatformMismatch {
                expected: expected_platform.to_string(),
                actual: payload.platform,
            });
        }

        let age_ms = now_ms - payload.timestamp;
        if age_ms > self.max_age_ms {
            return Err(StateError::Expired {
                age_ms,
                max_age_ms: self.max_age_ms,
            });
        }

        Ok(payload)
    }

    fn mac(&self, payload_json: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key length");
        mac.update(payload_json);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> StateSigner {
        StateSigner::new(b"test-signing-secret".to_vec(), DEFAULT_MAX_AGE_MS)
    }

    #[test]
    fn cloned_signer_verifies_original_tokens() {
        let signer = signer();
        let token = signer.issue_at("user42", "instagram", 1_000_000);

        let clone = signer.clone();
        drop(signer);
        assert!(clone.verify_at(&token, "instagram", 1_000_500).is_ok());
    }

    #[test]
    fn roundtrip_preserves_claims() {
        let signer = signer();
        let token = signer.issue_at("user42", "instagram", 1_000_000);

        let payload = signer.verify_at(&token, "instagram", 1_000_500).unwrap();
        assert_eq!(payload.user_id, "user42");
        assert_eq!(payload.platform, "instagram");
        assert_eq!(payload.timestamp, 1_000_000);
    }

    #[test]
    fn age_exactly_at_limit_is_accepted() {
        let signer = signer();
        let token = signer.issue_at("user42", "gmail", 0);

        assert!(signer.verify_at(&token, "gmail", DEFAULT_MAX_AGE_MS).is_ok());
    }

    #[test]
    fn age_one_ms_past_limit_is_rejected() {
        let signer = signer();
        let token = signer.issue_at("user42", "gmail", 0);

        let err = signer
            .verify_at(&token, "gmail", DEFAULT_MAX_AGE_MS + 1)
            .unwrap_err();
        assert_eq!(
            err,
            StateError::Expired {
                age_ms: DEFAULT_MAX_AGE_MS + 1,
                max_age_ms: DEFAULT_MAX_AGE_MS,
            }
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let signer = signer();
        let token = signer.issue_at("user42", "whatsapp", 1_000_000);
        let (_, mac_b64) = token.split_once('.').unwrap();

        let forged_payload = serde_json::json!({
            "userId": "attacker",
            "platform": "whatsapp",
            "timestamp": 1_000_000,
        });
        let forged = format!(
            "{}.{}",
            base64_url::encode(&serde_json::to_vec(&forged_payload).unwrap()),
            mac_b64
        );

        assert_eq!(
            signer.verify_at(&forged, "whatsapp", 1_000_500),
            Err(StateError::BadSignature)
        );
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let signer = signer();
        let other = StateSigner::new(b"different-secret".to_vec(), DEFAULT_MAX_AGE_MS);
        let token = other.issue_at("user42", "instagram", 1_000_000);

        assert_eq!(
            signer.verify_at(&token, "instagram", 1_000_500),
            Err(StateError::BadSignature)
        );
    }

    #[test]
    fn platform_binding_is_enforced() {
        let signer = signer();
        let token = signer.issue_at("user42", "instagram", 1_000_000);

        let err = signer.verify_at(&token, "gmail", 1_000_500).unwrap_err();
        assert_eq!(
            err,
            StateError::PlatformMismatch {
                expected: "gmail".to_string(),
                actual: "instagram".to_string(),
            }
        );
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let signer = signer();

        assert!(matches!(
            signer.verify_at("no-separator", "gmail", 0),
            Err(StateError::Malformed(_))
        ));
        assert!(matches!(
            signer.verify_at("!!!.???", "gmail", 0),
            Err(StateError::Malformed(_))
        ));
        // Valid base64 halves but signature over garbage bytes.
        let garbage = format!("{}.{}", base64_url::encode(b"not json"), base64_url::encode(b"sig"));
        assert!(matches!(
            signer.verify_at(&garbage, "gmail", 0),
            Err(StateError::BadSignature)
        ));
    }

    #[test]
    fn signature_checked_before_payload_parse() {
        let signer = signer();
        let not_json = b"plainly not a json object";
        let mac = {
            let mut mac = HmacSha256::new_from_slice(b"test-signing-secret").unwrap();
            mac.update(not_json);
            mac.finalize().into_bytes().to_vec()
        };
        let token = format!(
            "{}.{}",
            base64_url::encode(not_json),
            base64_url::encode(&mac)
        );

        // Signature verifies, so the failure surfaces as a payload problem.
        assert!(matches!(
            signer.verify_at(&token, "gmail", 0),
            Err(StateError::Malformed(_))
        ));
    }
}
