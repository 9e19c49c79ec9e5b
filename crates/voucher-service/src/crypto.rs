//! Signing and key comparison helpers.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 of `message` and return it hex-encoded (64 characters).
///
/// # Errors
///
/// Returns an error only if the HMAC implementation rejects the key length,
/// which HMAC-SHA256 never does.
pub fn hmac_sha256_hex(secret: &str, message: &str) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison for API keys and signatures.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_matches_known_vector() {
        // RFC 4231 test case 2.
        let sig = hmac_sha256_hex("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_depends_on_message() {
        let a = hmac_sha256_hex("secret", "deposit").unwrap();
        let b = hmac_sha256_hex("secret", "stock").unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn constant_time_eq_compares_whole_strings() {
        assert!(constant_time_eq("admin-key", "admin-key"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("admin-key", "admin-kez"));
        assert!(!constant_time_eq("admin", "admin-key"));
    }
}
