//! Passphrase hashing for account authentication.
//!
//! The stored hash is an Argon2 PHC string, so its parameters travel with it
//! and verification keeps working after the configured cost changes.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::KdfParams;
use crate::SALT_SIZE;

/// Hash a passphrase into a PHC string.
pub fn hash_passphrase(passphrase: &SecretString, params: &KdfParams) -> CryptoResult<String> {
    let mut raw_salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut raw_salt);
    let salt = SaltString::encode_b64(&raw_salt)
        .map_err(|e| CryptoError::Kdf(format!("salt encoding failed: {e}")))?;

    let hash = params
        .argon2()?
        .hash_password(passphrase.expose_secret().as_bytes(), &salt)
        .map_err(|e| CryptoError::Kdf(format!("passphrase hashing failed: {e}")))?;

    Ok(hash.to_string())
}

/// Check a passphrase against a stored PHC string.
///
/// Returns `Ok(false)` on mismatch; an unparseable hash is `MalformedKeyData`.
pub fn verify_passphrase(passphrase: &SecretString, stored: &str) -> CryptoResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| CryptoError::MalformedKeyData(format!("stored passphrase hash: {e}")))?;

    match Argon2::default().verify_password(passphrase.expose_secret().as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::Kdf(format!("passphrase verification failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::test_params;

    #[test]
    fn test_hash_then_verify() {
        let pass = SecretString::from("correct horse");
        let stored = hash_passphrase(&pass, &test_params()).unwrap();

        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_passphrase(&pass, &stored).unwrap());
        assert!(!verify_passphrase(&SecretString::from("wrong horse"), &stored).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let pass = SecretString::from("same");
        let a = hash_passphrase(&pass, &test_params()).unwrap();
        let b = hash_passphrase(&pass, &test_params()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_malformed() {
        let result = verify_passphrase(&SecretString::from("x"), "not-a-phc-string");
        assert!(matches!(result, Err(CryptoError::MalformedKeyData(_))));
    }
}
