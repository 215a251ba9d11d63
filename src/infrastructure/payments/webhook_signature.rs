//! Stripe webhook signatures. https://stripe.com/docs/webhooks/signatures
//!
//! The `stripe-signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`. Each `v1`
//! is an HMAC-SHA256 of `"{t}.{raw body}"` keyed with the endpoint secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::application::interfaces::stripe_gateway::SignatureError;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn signed_payload_mac(secret: &str, timestamp: &str, payload: &[u8]) -> anyhow::Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Hex signature Stripe would send for `payload` at `timestamp`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> anyhow::Result<String> {
    let mac = signed_payload_mac(secret, &timestamp.to_string(), payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks `header` against the exact request bytes.
///
/// Any `v1` entry may match. Timestamps further than `tolerance` seconds from `now`
/// are rejected; a `tolerance` of zero or less disables that check.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let issued_at: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let mac = signed_payload_mac(secret, timestamp, payload).map_err(|_| SignatureError::Mismatch)?;
    let matched = signatures
        .iter()
        .filter_map(|signature| hex::decode(signature).ok())
        .any(|provided| mac.clone().verify_slice(&provided).is_ok());
    if !matched {
        return Err(SignatureError::Mismatch);
    }

    if tolerance > 0 && (now - issued_at).abs() > tolerance {
        return Err(SignatureError::TimestampOutsideTolerance);
    }

    Ok(())
}
