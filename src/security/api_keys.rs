use crate::error::ApiError;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix on every issued key. Makes leaked keys greppable and lets support
/// staff recognize them on sight.
pub const KEY_PREFIX: &str = "vck_live_";

const KEY_SUFFIX_LEN: usize = 32;
const KEY_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Hashes an API key with HMAC-SHA256 under the configured secret.
///
/// Only this digest is ever persisted; lookups hash the presented key and
/// match on the hex digest.
pub fn hash_api_key(raw_key: &str, secret: &str) -> Result<String, ApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("Failed to create HMAC: {}", e)))?;

    mac.update(raw_key.as_bytes());

    let digest = mac.finalize().into_bytes();
    Ok(hex::encode(digest))
}

/// Generates a new API key: the public prefix plus 32 random alphanumeric
/// characters from a cryptographically secure generator.
pub fn generate_api_key() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..KEY_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..KEY_CHARSET.len());
            KEY_CHARSET[idx] as char
        })
        .collect();
    format!("{}{}", KEY_PREFIX, suffix)
}

/// Compares two strings in constant time to prevent timing attacks.
pub fn constant_time_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_shape() {
        let key = generate_api_key();
        assert!(key.starts_with(KEY_PREFIX));
        assert_eq!(key.len(), KEY_PREFIX.len() + KEY_SUFFIX_LEN);
        assert!(
            key[KEY_PREFIX.len()..]
                .chars()
                .all(|c| c.is_ascii_alphanumeric()),
            "key suffix should be alphanumeric"
        );
    }

    #[test]
    fn test_generated_keys_are_unique() {
        let key1 = generate_api_key();
        let key2 = generate_api_key();
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_hash_is_stable_and_secret_bound() {
        let a = hash_api_key("vck_live_abc", "secret-1").unwrap();
        let b = hash_api_key("vck_live_abc", "secret-1").unwrap();
        let c = hash_api_key("vck_live_abc", "secret-2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64, "HMAC-SHA256 digest should hex-encode to 64 chars");
    }

    #[test]
    fn test_constant_time_equal_same_strings() {
        assert!(constant_time_equal("test_string", "test_string"));
    }

    #[test]
    fn test_constant_time_equal_different_strings() {
        assert!(!constant_time_equal("test_string_1", "test_string_2"));
    }

    #[test]
    fn test_constant_time_equal_different_lengths() {
        assert!(!constant_time_equal("short", "much_longer_string"));
    }
}
