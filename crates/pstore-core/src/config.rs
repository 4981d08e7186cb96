use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from pstore.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PstoreConfig {
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
    pub quota: QuotaConfig,
    pub sharing: SharingConfig,
    pub log: LogConfig,
}

/// On-disk areas. Each `*_dir` defaults to a subdirectory of `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for every storage area
    pub root: PathBuf,
    /// Sealed private keys (default: {root}/keys)
    pub keys_dir: Option<PathBuf>,
    /// In-progress uploads (default: {root}/scratch)
    pub scratch_dir: Option<PathBuf>,
    /// Owner-sealed file blobs (default: {root}/files)
    pub files_dir: Option<PathBuf>,
    /// Link-scoped re-encrypted copies (default: {root}/shares)
    pub shares_dir: Option<PathBuf>,
    /// Plaintext materialised for transfer (default: {root}/transfer)
    pub transfer_dir: Option<PathBuf>,
    /// Metadata ledger JSON file (default: {root}/ledger.json)
    pub ledger_path: Option<PathBuf>,
}

/// Key derivation and key pair parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// RSA modulus size in bits (minimum and default: 4096)
    pub rsa_bits: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Storage allowance for newly activated accounts, in MiB
    pub default_storage_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SharingConfig {
    /// Per-recipient download quota when the caller gives none
    pub default_download_quota: u32,
    /// Upper bound on link lifetime in seconds (0 = unbounded)
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.local/share/pstore"),
            keys_dir: None,
            scratch_dir: None,
            files_dir: None,
            shares_dir: None,
            transfer_dir: None,
            ledger_path: None,
        }
    }
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.root.join("ledger.json"))
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            rsa_bits: 4096,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_storage_mb: 1024,
        }
    }
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            default_download_quota: 1,
            max_lifetime_secs: 30 * 24 * 3600,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[storage]
root = "/srv/pstore"
shares_dir = "/mnt/shares"
ledger_path = "/srv/pstore/meta/ledger.json"

[crypto]
argon2_mem_cost_kib = 131072
argon2_time_cost = 4
argon2_parallelism = 8
rsa_bits = 8192

[quota]
default_storage_mb = 2048

[sharing]
default_download_quota = 3
max_lifetime_secs = 86400

[log]
level = "debug"
format = "json"
"#;
        let config: PstoreConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/srv/pstore"));
        assert_eq!(config.storage.shares_dir, Some(PathBuf::from("/mnt/shares")));
        assert_eq!(
            config.storage.ledger_path(),
            PathBuf::from("/srv/pstore/meta/ledger.json")
        );
        assert_eq!(config.crypto.argon2_mem_cost_kib, 131072);
        assert_eq!(config.crypto.rsa_bits, 8192);
        assert_eq!(config.quota.default_storage_mb, 2048);
        assert_eq!(config.sharing.default_download_quota, 3);
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: PstoreConfig = toml::from_str("").unwrap();

        assert_eq!(config.crypto.argon2_mem_cost_kib, 65536);
        assert_eq!(config.crypto.rsa_bits, 4096);
        assert_eq!(config.quota.default_storage_mb, 1024);
        assert_eq!(config.sharing.default_download_quota, 1);
        assert_eq!(config.log.level, "info");
        assert!(config.storage.files_dir.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[storage]
root = "/data"
"#;
        let config: PstoreConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.storage.root, PathBuf::from("/data"));
        // Defaults
        assert_eq!(config.storage.ledger_path(), PathBuf::from("/data/ledger.json"));
        assert_eq!(config.crypto.argon2_time_cost, 3);
        assert_eq!(config.sharing.max_lifetime_secs, 30 * 24 * 3600);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = PstoreConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: PstoreConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.storage.root, parsed.storage.root);
        assert_eq!(config.crypto.rsa_bits, parsed.crypto.rsa_bits);
    }
}
