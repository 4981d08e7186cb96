use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroize;

/// Current time as Unix seconds.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Account identifier, assigned by the host's account registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub u64);

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque, globally unique file identifier. Never derived from the filename.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque, high-entropy share token handed to recipients.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareToken(String);

impl ShareToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ShareToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ShareToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ShareToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// Tokens are bearer credentials; only a short prefix is ever printed by Debug.
impl std::fmt::Debug for ShareToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "ShareToken({prefix}…)")
    }
}

/// Per-account key material and allowance, as kept by the account store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub owner: OwnerId,
    /// PHC-format passphrase hash
    pub passphrase_hash: String,
    /// "RSA PUBLIC KEY" PEM block, readable by any authenticated party
    pub public_key_pem: String,
    /// Path of the passphrase-sealed private key blob
    pub private_key_path: PathBuf,
    /// Storage allowance in bytes
    pub storage_quota: u64,
    pub created_at: u64,
}

/// How a stored file is protected at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Protection {
    /// Signed over the plaintext, then sealed under the owner's passphrase.
    Sealed {
        #[serde(with = "b64")]
        signature: Vec<u8>,
    },
    /// Stored as plaintext, unsigned (session uploads).
    Plain,
}

impl Protection {
    pub fn is_sealed(&self) -> bool {
        matches!(self, Protection::Sealed { .. })
    }

    pub fn signature(&self) -> Option<&[u8]> {
        match self {
            Protection::Sealed { signature } => Some(signature),
            Protection::Plain => None,
        }
    }
}

/// Catalog record for an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_id: FileId,
    pub owner: OwnerId,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub storage_path: PathBuf,
    pub protection: Protection,
    pub created_at: u64,
    pub last_accessed: u64,
    pub download_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareStatus {
    Shared,
    Revoked,
}

/// Raw bytes of a link-scoped symmetric key. Zeroized on drop.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkKeyBytes(#[serde(with = "b64")] Vec<u8>);

impl LinkKeyBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for LinkKeyBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for LinkKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LinkKeyBytes([REDACTED])")
    }
}

/// A share link: a link-scoped re-encrypted copy of a stored file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLink {
    pub link_id: String,
    pub token: ShareToken,
    pub file_id: FileId,
    pub owner: OwnerId,
    pub original_name: String,
    pub mime_type: String,
    /// Location of the link-key ciphertext; never the owner's blob
    pub blob_path: PathBuf,
    pub link_key: LinkKeyBytes,
    /// Owner's signature over the plaintext, carried from sealed sources
    #[serde(default, with = "b64_opt")]
    pub signature: Option<Vec<u8>>,
    pub expires_at: u64,
    pub status: ShareStatus,
    /// Downloads allowed per recipient
    pub quota: u32,
    pub note: Option<String>,
    pub created_at: u64,
}

impl ShareLink {
    /// Expiry is derived, not stored: a link is expired once `now >= expires_at`.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.status == ShareStatus::Revoked
    }
}

/// One recipient's entitlement against a share link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub link_id: String,
    pub recipient: OwnerId,
    pub download_count: u32,
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

mod b64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_link(expires_at: u64) -> ShareLink {
        ShareLink {
            link_id: "l1".into(),
            token: ShareToken::from("tok-abcdef-123"),
            file_id: FileId::from("f1"),
            owner: OwnerId(7),
            original_name: "report.pdf".into(),
            mime_type: "application/pdf".into(),
            blob_path: PathBuf::from("/srv/shares/l1"),
            link_key: LinkKeyBytes::new(vec![9u8; 32]),
            signature: Some(vec![1, 2, 3]),
            expires_at,
            status: ShareStatus::Shared,
            quota: 2,
            note: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_expiry_is_inclusive_of_deadline() {
        let link = sample_link(1_000);
        assert!(!link.is_expired(999));
        assert!(link.is_expired(1_000));
        assert!(link.is_expired(1_001));
    }

    #[test]
    fn test_file_ids_are_unique() {
        assert_ne!(FileId::generate(), FileId::generate());
    }

    #[test]
    fn test_secrets_redacted_in_debug() {
        let link = sample_link(10);
        let dbg = format!("{link:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("tok-abcdef-123"));
    }

    #[test]
    fn test_share_link_json_roundtrip() {
        let link = sample_link(42);
        let json = serde_json::to_string(&link).unwrap();
        let back: ShareLink = serde_json::from_str(&json).unwrap();
        assert_eq!(back.link_key.as_bytes(), &[9u8; 32]);
        assert_eq!(back.signature.as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(back.token, link.token);
    }

    #[test]
    fn test_protection_tagged_serialization() {
        let plain = serde_json::to_string(&Protection::Plain).unwrap();
        assert_eq!(plain, r#"{"kind":"plain"}"#);

        let sealed = Protection::Sealed {
            signature: vec![0xde, 0xad],
        };
        let back: Protection =
            serde_json::from_str(&serde_json::to_string(&sealed).unwrap()).unwrap();
        assert_eq!(back.signature(), Some(&[0xde, 0xad][..]));
        assert!(back.is_sealed());
    }
}
