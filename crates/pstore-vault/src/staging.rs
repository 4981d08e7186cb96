//! Scoped plaintext areas: upload scratch space and per-request transfer copies.
//!
//! Both live in an unguessable per-request subdirectory and are removed when the
//! guard is dropped, on every exit path.

use std::fs;
use std::path::{Path, PathBuf};

use pstore_core::{FileId, VaultError, VaultResult};
use tracing::{debug, warn};

/// A directory removed with everything in it when dropped.
#[derive(Debug)]
pub struct ScopedDir {
    path: PathBuf,
    released: bool,
}

impl ScopedDir {
    /// Create `<parent>/<random>/`.
    pub fn create(parent: &Path) -> VaultResult<Self> {
        fs::create_dir_all(parent).map_err(|e| VaultError::storage_io(parent, e))?;
        let path = parent.join(uuid::Uuid::new_v4().simple().to_string());
        fs::create_dir(&path).map_err(|e| VaultError::storage_io(&path, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o700))
                .map_err(|e| VaultError::storage_io(&path, e))?;
        }
        Ok(ScopedDir {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now and surface any failure.
    pub fn remove(mut self) -> VaultResult<()> {
        self.released = true;
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::storage_io(&self.path, e)),
        }
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "scoped dir removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "failed to remove scoped dir: {e}"),
        }
    }
}

/// Keep only the final component of a user-supplied name.
pub fn sanitize_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "download".to_string())
}

/// Decrypted plaintext awaiting transfer, materialized under its original name.
///
/// The caller streams [`Transfer::path`] out and then calls [`Transfer::finish`];
/// dropping the transfer without finishing removes it as well.
#[derive(Debug)]
pub struct Transfer {
    dir: ScopedDir,
    path: PathBuf,
    file_id: FileId,
    original_name: String,
    mime_type: String,
}

impl Transfer {
    pub(crate) fn materialize(
        transfer_root: &Path,
        file_id: FileId,
        original_name: &str,
        mime_type: &str,
        plaintext: &[u8],
    ) -> VaultResult<Self> {
        let dir = ScopedDir::create(transfer_root)?;
        let path = dir.path().join(sanitize_name(original_name));
        fs::write(&path, plaintext).map_err(|e| VaultError::storage_io(&path, e))?;
        Ok(Transfer {
            dir,
            path,
            file_id,
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Delete the plaintext copy once the transfer is over.
    pub fn finish(self) -> VaultResult<()> {
        self.dir.remove()
    }
}
