//! Stripe webhook signatures (no SDK dependency)
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`.
//! The signed payload is `"<t>.<raw body>"`, HMAC-SHA256 with the endpoint
//! secret. Any matching `v1` entry accepts the event.

pub mod event;

pub use event::{CheckoutSession, EventKind, EventParseError, PaymentIntent, WebhookEvent};

use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,

    #[error("no matching v1 signature")]
    Mismatch,

    #[error("signature timestamp is {age_secs}s away from now")]
    Expired { age_secs: i64 },

    #[error("invalid signing secret")]
    InvalidSecret,
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Expired { .. } => AppError::new(ErrorCode::SignatureExpired),
            _ => AppError::new(ErrorCode::SignatureInvalid),
        }
    }
}

/// Verifies `Stripe-Signature` headers against one endpoint secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance: Duration,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        self.verify_at(payload, header, chrono::Utc::now().timestamp())
    }

    /// Verify against an explicit clock reading (unix seconds)
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let part = part.trim();
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(v) = part.strip_prefix("v1=") {
                signatures.push(v);
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(SignatureError::MalformedHeader);
        }
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::MalformedHeader)?;

        let mac = self.mac(timestamp, payload)?;
        // verify_slice is constant-time
        let matched = signatures.iter().any(|sig| {
            hex::decode(sig)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(SignatureError::Mismatch);
        }

        let age_secs = now - ts;
        if age_secs.unsigned_abs() > self.tolerance.as_secs() {
            return Err(SignatureError::Expired { age_secs });
        }
        Ok(())
    }

    /// Build a valid header for `payload` at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let ts = timestamp.to_string();
        let mac = self.mac(&ts, payload)?;
        Ok(format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes())))
    }

    fn mac(&self, timestamp: &str, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}
