//! Passphrase cipher: XChaCha20-Poly1305 over whole payloads
//!
//! Key-based blob (link copies):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```
//!
//! Passphrase-sealed blob (private keys, owner files):
//! ```text
//! [16 bytes: Argon2id salt][24 bytes: random nonce][N bytes: ciphertext][16 bytes: tag]
//! ```
//!
//! Every failure to open a blob, whatever the cause, is reported as
//! `DecryptionFailed`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use pstore_core::LinkKeyBytes;
use rand::RngCore;
use secrecy::SecretString;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_key, generate_salt, KdfParams};
use crate::{KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// A one-off 256-bit key scoped to a single share link. Zeroized on drop.
#[derive(Clone)]
pub struct LinkKey {
    bytes: [u8; KEY_SIZE],
}

impl LinkKey {
    /// Generate a random link key, independent of any passphrase.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub fn to_stored(&self) -> LinkKeyBytes {
        LinkKeyBytes::new(self.bytes.to_vec())
    }

    pub fn from_stored(stored: &LinkKeyBytes) -> CryptoResult<Self> {
        let raw = stored.as_bytes();
        if raw.len() != KEY_SIZE {
            return Err(CryptoError::MalformedKeyData(format!(
                "link key has wrong size: {} bytes (expected {KEY_SIZE})",
                raw.len()
            )));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(raw);
        Ok(Self { bytes })
    }
}

impl Drop for LinkKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for LinkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Encrypt with a fresh random nonce.
///
/// Returns: `[24-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt the output of [`encrypt`].
pub fn decrypt(key: &[u8; KEY_SIZE], blob: &[u8]) -> CryptoResult<Vec<u8>> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.into());

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Seal a payload under a passphrase, deriving the key with a fresh salt.
pub fn seal_with_passphrase(
    passphrase: &SecretString,
    params: &KdfParams,
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let salt = generate_salt();
    let key = derive_key(passphrase, &salt, params)?;
    let body = encrypt(key.as_bytes(), plaintext)?;

    let mut result = Vec::with_capacity(SALT_SIZE + body.len());
    result.extend_from_slice(&salt);
    result.extend_from_slice(&body);
    Ok(result)
}

/// Open a blob produced by [`seal_with_passphrase`].
pub fn open_with_passphrase(
    passphrase: &SecretString,
    params: &KdfParams,
    blob: &[u8],
) -> CryptoResult<Vec<u8>> {
    if blob.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (salt_bytes, body) = blob.split_at(SALT_SIZE);
    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(salt_bytes);

    let key = derive_key(passphrase, &salt, params)?;
    decrypt(key.as_bytes(), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::test_params;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = LinkKey::generate();
        let plaintext = b"hello, encrypted world!";

        let encrypted = encrypt(key.as_bytes(), plaintext).unwrap();
        let decrypted = decrypt(key.as_bytes(), &encrypted).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = LinkKey::generate();

        let encrypted = encrypt(key.as_bytes(), b"").unwrap();
        let decrypted = decrypt(key.as_bytes(), &encrypted).unwrap();

        assert_eq!(decrypted, b"");
    }

    #[test]
    fn test_nonce_is_fresh_per_call() {
        let key = LinkKey::generate();
        let a = encrypt(key.as_bytes(), b"same").unwrap();
        let b = encrypt(key.as_bytes(), b"same").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_encrypted_size() {
        let key = LinkKey::generate();
        let encrypted = encrypt(key.as_bytes(), &vec![0u8; 1000]).unwrap();

        // nonce (24) + plaintext (1000) + tag (16) = 1040
        assert_eq!(encrypted.len(), NONCE_SIZE + 1000 + TAG_SIZE);
    }

    #[test]
    fn test_truncated_blob_is_decryption_failure() {
        let key = LinkKey::generate();
        for len in [0, 1, NONCE_SIZE - 1, NONCE_SIZE, NONCE_SIZE + TAG_SIZE - 1] {
            let result = decrypt(key.as_bytes(), &vec![0u8; len]);
            assert!(
                matches!(result, Err(CryptoError::DecryptionFailed)),
                "length {len} must fail as DecryptionFailed"
            );
        }
    }

    #[test]
    fn test_passphrase_seal_roundtrip() {
        let params = test_params();
        let pass = SecretString::from("p1");

        let sealed = seal_with_passphrase(&pass, &params, b"private key pem").unwrap();
        assert_eq!(sealed.len(), SALT_SIZE + NONCE_SIZE + 15 + TAG_SIZE);

        let opened = open_with_passphrase(&pass, &params, &sealed).unwrap();
        assert_eq!(opened, b"private key pem");
    }

    #[test]
    fn test_passphrase_seal_wrong_passphrase() {
        let params = test_params();
        let sealed =
            seal_with_passphrase(&SecretString::from("p1"), &params, b"secret").unwrap();

        let result = open_with_passphrase(&SecretString::from("p2"), &params, &sealed);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_passphrase_seal_uses_fresh_salt() {
        let params = test_params();
        let pass = SecretString::from("p1");
        let a = seal_with_passphrase(&pass, &params, b"x").unwrap();
        let b = seal_with_passphrase(&pass, &params, b"x").unwrap();
        assert_ne!(a[..SALT_SIZE], b[..SALT_SIZE]);
    }

    #[test]
    fn test_link_key_stored_roundtrip() {
        let key = LinkKey::generate();
        let restored = LinkKey::from_stored(&key.to_stored()).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());

        let short = LinkKeyBytes::new(vec![1u8; 5]);
        assert!(matches!(
            LinkKey::from_stored(&short),
            Err(CryptoError::MalformedKeyData(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let key = LinkKey::generate();
            let blob = encrypt(key.as_bytes(), &payload).unwrap();
            prop_assert_eq!(decrypt(key.as_bytes(), &blob).unwrap(), payload);
        }

        #[test]
        fn prop_wrong_key_rejected(payload in proptest::collection::vec(any::<u8>(), 0..1024)) {
            let k1 = LinkKey::generate();
            let k2 = LinkKey::generate();
            let blob = encrypt(k1.as_bytes(), &payload).unwrap();
            prop_assert!(matches!(decrypt(k2.as_bytes(), &blob), Err(CryptoError::DecryptionFailed)));
        }

        #[test]
        fn prop_any_bit_flip_rejected(
            payload in proptest::collection::vec(any::<u8>(), 1..512),
            pos in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = LinkKey::generate();
            let mut blob = encrypt(key.as_bytes(), &payload).unwrap();
            let i = pos.index(blob.len());
            blob[i] ^= 1 << bit;
            prop_assert!(decrypt(key.as_bytes(), &blob).is_err());
        }
    }
}
