//! HMAC-SHA256 signatures for webhook payloads.
//!
//! The signature covers `{timestamp}.{body}` so a captured request cannot be
//! replayed under a fresh timestamp.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of generated signing secrets.
pub const SECRET_PREFIX: &str = "whsec_";

/// Compute the hex-encoded HMAC-SHA256 signature of a payload.
pub fn sign_payload(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature in constant time.
pub fn verify_signature(expected_hex: &str, secret: &str, timestamp: &str, body: &[u8]) -> bool {
    let computed = sign_payload(secret, timestamp, body);
    expected_hex.as_bytes().ct_eq(computed.as_bytes()).into()
}

/// Generate a random signing secret for a new subscription.
#[must_use]
pub fn generate_secret() -> String {
    generate_token(SECRET_PREFIX, 24)
}

/// `prefix` followed by `len` random bytes from the OS, hex encoded.
#[must_use]
pub fn generate_token(prefix: &str, len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    format!("{prefix}{}", hex::encode(bytes))
}
