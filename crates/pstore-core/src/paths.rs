//! On-disk layout: five disjoint storage areas.
//!
//! ```text
//! keys/      sealed private keys            {uuid}.pem.enc
//! scratch/   in-progress uploads            {uuid}/{original name}
//! files/     owner-sealed blobs             {file_id}
//! shares/    link-key re-encrypted copies   {link_id}
//! transfer/  plaintext awaiting transfer    {random}/{original name}
//! ```
//!
//! No area may contain another, so clearing one category can never remove
//! data belonging to a different one.

use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::error::{VaultError, VaultResult};
use crate::types::FileId;

#[derive(Debug, Clone)]
pub struct VaultPaths {
    pub keys: PathBuf,
    pub scratch: PathBuf,
    pub files: PathBuf,
    pub shares: PathBuf,
    pub transfer: PathBuf,
}

impl VaultPaths {
    /// All areas as fixed subdirectories of `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            keys: root.join("keys"),
            scratch: root.join("scratch"),
            files: root.join("files"),
            shares: root.join("shares"),
            transfer: root.join("transfer"),
        }
    }

    pub fn from_config(cfg: &StorageConfig) -> Self {
        let root = expand_tilde(&cfg.root);
        let pick = |over: &Option<PathBuf>, default: PathBuf| {
            over.as_ref().map(|p| expand_tilde(p)).unwrap_or(default)
        };
        let base = Self::under(&root);
        Self {
            keys: pick(&cfg.keys_dir, base.keys),
            scratch: pick(&cfg.scratch_dir, base.scratch),
            files: pick(&cfg.files_dir, base.files),
            shares: pick(&cfg.shares_dir, base.shares),
            transfer: pick(&cfg.transfer_dir, base.transfer),
        }
    }

    fn areas(&self) -> [(&'static str, &Path); 5] {
        [
            ("keys", &self.keys),
            ("scratch", &self.scratch),
            ("files", &self.files),
            ("shares", &self.shares),
            ("transfer", &self.transfer),
        ]
    }

    /// Reject layouts where one area equals or nests inside another.
    pub fn validate(&self) -> VaultResult<()> {
        let areas = self.areas();
        for (i, (name_a, a)) in areas.iter().enumerate() {
            for (name_b, b) in areas.iter().skip(i + 1) {
                if a.starts_with(b) || b.starts_with(a) {
                    return Err(VaultError::Config(format!(
                        "storage areas overlap: {name_a} ({}) and {name_b} ({})",
                        a.display(),
                        b.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate and create every area.
    pub fn ensure(&self) -> VaultResult<()> {
        self.validate()?;
        for (name, dir) in self.areas() {
            std::fs::create_dir_all(dir).map_err(|e| VaultError::storage_io(dir, e))?;
            tracing::debug!(area = name, path = %dir.display(), "storage area ready");
        }
        Ok(())
    }

    pub fn file_blob(&self, file_id: &FileId) -> PathBuf {
        self.files.join(file_id.as_str())
    }

    pub fn share_blob(&self, link_id: &str) -> PathBuf {
        self.shares.join(link_id)
    }
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(rest) = s.strip_prefix("~/") {
            let home = std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp"));
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
