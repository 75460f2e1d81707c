//! HMAC-SHA256 request signatures
//!
//! The signed message is `timestamp + ":" + raw_body`; the signature is the
//! lower-case hex digest.

use crate::error::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex signature for a request
pub fn sign(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| Error::Internal("Invalid signing secret".to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a supplied signature against the expected one
#[must_use]
pub fn verify(secret: &[u8], timestamp: &str, body: &[u8], signature: &str) -> bool {
    match sign(secret, timestamp, body) {
        Ok(expected) => constant_time_eq(signature.as_bytes(), expected.as_bytes()),
        Err(_) => false,
    }
}

/// Compare without early exit on the first differing byte
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
