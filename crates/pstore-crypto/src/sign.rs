//! Signatures: SHA-256 digest of the full stream, signed with RSASSA-PKCS1-v1_5.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

fn digest_reader<R: Read>(reader: &mut R) -> io::Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    io::copy(reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}

/// Hash everything `reader` yields and sign the digest.
pub fn sign_reader<R: Read>(reader: &mut R, private_key: &RsaPrivateKey) -> CryptoResult<Vec<u8>> {
    let digest =
        digest_reader(reader).map_err(|e| CryptoError::Signing(format!("reading input: {e}")))?;
    private_key
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))
}

/// Recompute the digest of `reader` and check `signature` against it.
///
/// Every failure, including a read error, is `SignatureMismatch`.
pub fn verify_reader<R: Read>(
    reader: &mut R,
    signature: &[u8],
    public_key: &RsaPublicKey,
) -> CryptoResult<()> {
    let digest = digest_reader(reader).map_err(|_| CryptoError::SignatureMismatch)?;
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .map_err(|_| CryptoError::SignatureMismatch)
}

pub fn sign_file(path: &Path, private_key: &RsaPrivateKey) -> CryptoResult<Vec<u8>> {
    let mut file = File::open(path)
        .map_err(|e| CryptoError::Signing(format!("opening {}: {e}", path.display())))?;
    sign_reader(&mut file, private_key)
}

pub fn verify_file(path: &Path, signature: &[u8], public_key: &RsaPublicKey) -> CryptoResult<()> {
    let mut file = File::open(path).map_err(|_| CryptoError::SignatureMismatch)?;
    verify_reader(&mut file, signature, public_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::test_key;
    use proptest::prelude::*;

    #[test]
    fn test_sign_verify() {
        let key = test_key();
        let data = b"the exact bytes that were uploaded";
        let sig = sign_reader(&mut &data[..], key).unwrap();
        assert_eq!(sig.len(), 512);

        verify_reader(&mut &data[..], &sig, &key.to_public_key()).unwrap();
    }

    #[test]
    fn test_signature_is_deterministic() {
        let key = test_key();
        let a = sign_reader(&mut &b"same"[..], key).unwrap();
        let b = sign_reader(&mut &b"same"[..], key).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_public_key_rejected() {
        let data = b"payload";
        let sig = sign_reader(&mut &data[..], test_key()).unwrap();

        let other = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let result = verify_reader(&mut &data[..], &sig, &other.to_public_key());
        assert!(matches!(result, Err(CryptoError::SignatureMismatch)));
    }

    #[test]
    fn test_sign_and_verify_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("doc.txt");
        std::fs::write(&path, vec![42u8; 10 * 1024]).unwrap();

        let sig = sign_file(&path, test_key()).unwrap();
        verify_file(&path, &sig, &test_key().to_public_key()).unwrap();

        std::fs::write(&path, vec![43u8; 10 * 1024]).unwrap();
        assert!(matches!(
            verify_file(&path, &sig, &test_key().to_public_key()),
            Err(CryptoError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let absent = tmp.path().join("absent");
        assert!(matches!(
            sign_file(&absent, test_key()),
            Err(CryptoError::Signing(_))
        ));
        assert!(matches!(
            verify_file(&absent, &[0u8; 512], &test_key().to_public_key()),
            Err(CryptoError::SignatureMismatch)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_signature_bit_flip_rejected(idx in 0usize..512, bit in 0u8..8) {
            let data = b"signed content";
            let mut sig = sign_reader(&mut &data[..], test_key()).unwrap();
            sig[idx] ^= 1 << bit;
            prop_assert!(matches!(
                verify_reader(&mut &data[..], &sig, &test_key().to_public_key()),
                Err(CryptoError::SignatureMismatch)
            ));
        }

        #[test]
        fn prop_content_bit_flip_rejected(
            data in proptest::collection::vec(any::<u8>(), 1..2048),
            pos in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let sig = sign_reader(&mut &data[..], test_key()).unwrap();
            let mut tampered = data.clone();
            let i = pos.index(tampered.len());
            tampered[i] ^= 1 << bit;
            prop_assert!(matches!(
                verify_reader(&mut &tampered[..], &sig, &test_key().to_public_key()),
                Err(CryptoError::SignatureMismatch)
            ));
        }
    }
}
