use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::api_keys::constant_time_equal;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase-hex HMAC-SHA256 of a raw webhook body. The billing partner
/// computes the same value over the bytes it sends and puts it in the
/// `X-Billing-Signature` header.
pub fn sign_body(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a presented signature against the shared secret. Comparison is
/// constant-time; any malformed input verifies false rather than erroring.
pub fn verify_signature(secret: &str, body: &[u8], presented: &str) -> bool {
    match sign_body(secret, body) {
        Some(expected) => constant_time_equal(&expected, &presented.trim().to_ascii_lowercase()),
        None => false,
    }
}
