//! pstore-crypto: the cryptographic core of peerstore
//!
//! Key hierarchy:
//! ```text
//! Passphrase
//!   ├── Passphrase hash (Argon2id PHC string, checked before any key material is touched)
//!   └── Sealing key (Argon2id, fresh 16-byte salt per blob)
//!         ├── RSA-4096 private key   [salt][nonce][XChaCha20-Poly1305(PKCS#1 PEM)]
//!         └── Stored file contents   [salt][nonce][XChaCha20-Poly1305(plaintext)]
//! Link key (256-bit random, one per share link)
//!   └── Shared copy                  [nonce][XChaCha20-Poly1305(plaintext)]
//! ```
//!
//! Files are signed over their plaintext with SHA-256 + RSASSA-PKCS1-v1_5
//! before sealing; retrieval verifies after opening.

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod mime;
pub mod passphrase;
pub mod sign;
pub mod token;

pub use cipher::{decrypt, encrypt, open_with_passphrase, seal_with_passphrase, LinkKey};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, KdfParams, PassphraseKey};
pub use keys::{
    generate_key_pair, load_private_key, load_public_key, public_key_pem, seal_key_pair,
    KeyPairRef, KeyParams,
};
pub use mime::sniff_mime;
pub use passphrase::{hash_passphrase, verify_passphrase};
pub use sign::{sign_file, sign_reader, verify_file, verify_reader};
pub use token::generate_share_token;

/// Size of a symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the Argon2id salt stored in front of passphrase-sealed blobs
pub const SALT_SIZE: usize = 16;

/// Smallest RSA modulus accepted for account key pairs
pub const MIN_RSA_BITS: usize = 4096;
