//! Slack request signing.
//!
//! Every request carries `X-Slack-Request-Timestamp` and
//! `X-Slack-Signature: v0=<hex hmac-sha256("v0:{ts}:{body}")>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Requests older than this are treated as replays.
pub const MAX_REQUEST_AGE_SECS: i64 = 60 * 5;

pub struct SignatureVerifier {
    signing_secret: String,
}

impl SignatureVerifier {
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
        }
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("Invalid signing secret: {}", e)))?;
        mac.update(b"v0:");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }

    /// `v0=` signature for a payload. Used by tests and local tooling.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("v0={}", hex::encode(digest)))
    }

    /// Check a request against `now` (unix seconds).
    pub fn verify(&self, timestamp: &str, signature: &str, body: &[u8], now: i64) -> Result<()> {
        let sent: i64 = timestamp
            .parse()
            .map_err(|_| AppError::Unauthorized("Malformed request timestamp".into()))?;
        if (now - sent).abs() > MAX_REQUEST_AGE_SECS {
            return Err(AppError::Unauthorized("Stale request timestamp".into()));
        }

        let provided = signature
            .strip_prefix("v0=")
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or_else(|| AppError::Unauthorized("Malformed request signature".into()))?;

        self.mac(timestamp, body)?
            .verify_slice(&provided)
            .map_err(|_| AppError::Unauthorized("Invalid request signature".into()))
    }
}
