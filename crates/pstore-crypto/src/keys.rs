//! Key pair lifecycle: RSA generation, sealed private key at rest, public key export
//!
//! The private key is serialized to PKCS#1 PEM only inside a zeroizing buffer and
//! sealed under the passphrase before anything touches the disk. The file under
//! `keys/` is `[salt][nonce][XChaCha20-Poly1305(PEM)]`; no plaintext form is ever
//! written, so there is nothing to clean up on an error path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use pstore_core::config::CryptoConfig;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;
use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::{open_with_passphrase, seal_with_passphrase};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::KdfParams;
use crate::MIN_RSA_BITS;

/// PEM tag of the exported public key. The body is PKIX DER.
pub const PUBLIC_KEY_TAG: &str = "RSA PUBLIC KEY";

/// Extension of sealed private key files.
const SEALED_KEY_EXT: &str = "pem.enc";

#[derive(Debug, Clone)]
pub struct KeyParams {
    pub bits: usize,
}

impl Default for KeyParams {
    fn default() -> Self {
        Self { bits: MIN_RSA_BITS }
    }
}

impl KeyParams {
    pub fn from_config(cfg: &CryptoConfig) -> Self {
        Self { bits: cfg.rsa_bits }
    }
}

/// What account activation keeps: where the sealed private key lives and the
/// exported public key.
#[derive(Debug, Clone)]
pub struct KeyPairRef {
    pub private_key_path: PathBuf,
    pub public_key_pem: String,
}

/// Generate a fresh RSA key pair and seal the private half into `keys_dir`.
pub fn generate_key_pair(
    passphrase: &SecretString,
    kdf: &KdfParams,
    params: &KeyParams,
    keys_dir: &Path,
) -> CryptoResult<KeyPairRef> {
    if params.bits < MIN_RSA_BITS {
        return Err(CryptoError::KeyGeneration(format!(
            "RSA modulus of {} bits is below the {MIN_RSA_BITS}-bit minimum",
            params.bits
        )));
    }

    debug!(bits = params.bits, "generating RSA key pair");
    let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), params.bits)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

    seal_key_pair(&private_key, passphrase, kdf, keys_dir)
}

/// Seal an existing private key under `passphrase` and export its public key.
pub fn seal_key_pair(
    private_key: &RsaPrivateKey,
    passphrase: &SecretString,
    kdf: &KdfParams,
    keys_dir: &Path,
) -> CryptoResult<KeyPairRef> {
    let pem: Zeroizing<String> = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyGeneration(format!("PKCS#1 encoding failed: {e}")))?;
    let public_key_pem = public_key_pem(&private_key.to_public_key())?;

    let sealed = seal_with_passphrase(passphrase, kdf, pem.as_bytes())
        .map_err(|e| CryptoError::KeyPersistence(format!("sealing private key: {e}")))?;

    fs::create_dir_all(keys_dir).map_err(|e| {
        CryptoError::KeyPersistence(format!("creating {}: {e}", keys_dir.display()))
    })?;
    let name = uuid::Uuid::new_v4();
    let path = keys_dir.join(format!("{name}.{SEALED_KEY_EXT}"));
    write_sealed(&path, &sealed)?;

    debug!(path = %path.display(), "sealed private key written");
    Ok(KeyPairRef {
        private_key_path: path,
        public_key_pem,
    })
}

/// Write via temp file + rename so a crash never leaves a half-written key.
fn write_sealed(path: &Path, bytes: &[u8]) -> CryptoResult<()> {
    let tmp = path.with_extension("tmp");
    let result = (|| -> std::io::Result<()> {
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut file = opts.open(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CryptoError::KeyPersistence(format!("writing {}: {e}", path.display()))
    })
}

/// Open the sealed private key at `path`.
///
/// A passphrase the AEAD rejects is `InvalidPassphrase`; bytes that open but do
/// not parse as PKCS#1 PEM are `MalformedKeyData`.
pub fn load_private_key(
    passphrase: &SecretString,
    kdf: &KdfParams,
    path: &Path,
) -> CryptoResult<RsaPrivateKey> {
    let sealed = fs::read(path).map_err(|e| CryptoError::io(path, e))?;

    let pem = Zeroizing::new(open_with_passphrase(passphrase, kdf, &sealed).map_err(
        |e| match e {
            CryptoError::DecryptionFailed => CryptoError::InvalidPassphrase,
            other => other,
        },
    )?);

    let pem = std::str::from_utf8(&pem)
        .map_err(|_| CryptoError::MalformedKeyData("private key is not UTF-8 PEM".into()))?;
    RsaPrivateKey::from_pkcs1_pem(pem)
        .map_err(|e| CryptoError::MalformedKeyData(format!("private key: {e}")))
}

/// Export a public key as an "RSA PUBLIC KEY" PEM block holding PKIX DER.
pub fn public_key_pem(public_key: &RsaPublicKey) -> CryptoResult<String> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyGeneration(format!("PKIX encoding failed: {e}")))?;
    Ok(pem::encode(&pem::Pem::new(PUBLIC_KEY_TAG, der.as_bytes())))
}

pub fn load_public_key(pem_text: &str) -> CryptoResult<RsaPublicKey> {
    let block = pem::parse(pem_text)
        .map_err(|e| CryptoError::MalformedKeyData(format!("public key PEM: {e}")))?;
    if block.tag() != PUBLIC_KEY_TAG {
        return Err(CryptoError::MalformedKeyData(format!(
            "unexpected PEM tag {:?}",
            block.tag()
        )));
    }
    RsaPublicKey::from_public_key_der(block.contents())
        .map_err(|e| CryptoError::MalformedKeyData(format!("public key DER: {e}")))
}

/// One RSA-4096 key shared by every test in this crate.
#[cfg(test)]
pub(crate) fn test_key() -> &'static RsaPrivateKey {
    use std::sync::OnceLock;
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), MIN_RSA_BITS).unwrap())
}
