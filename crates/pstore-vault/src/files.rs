//! Owner-side file management: listing, usage, deletion.

use std::sync::Arc;

use pstore_core::{FileId, OwnerId, StoredFile, VaultError, VaultResult};
use tracing::{error, info};

use crate::context::{remove_blob, VaultContext};

pub struct FileService {
    ctx: Arc<VaultContext>,
}

impl FileService {
    pub fn new(ctx: Arc<VaultContext>) -> Self {
        FileService { ctx }
    }

    pub fn list(&self, owner: OwnerId) -> VaultResult<Vec<StoredFile>> {
        Ok(self.ctx.stores.catalog.files_of(owner)?)
    }

    /// Bytes charged against `owner`'s allowance.
    pub fn usage(&self, owner: OwnerId) -> VaultResult<u64> {
        Ok(self.ctx.stores.usage.usage(owner)?)
    }

    /// Delete the record and its blob together.
    ///
    /// The blob goes first: if it cannot be removed the record stays and the
    /// delete can be retried. If the record cannot be removed after the blob is
    /// gone, the record is left without a blob until the delete is retried;
    /// retrieval reports `FileNotFound` meanwhile. Share links made from the
    /// file keep their own copies and are unaffected.
    pub fn delete(&self, file_id: &FileId, owner: OwnerId) -> VaultResult<()> {
        let catalog = &self.ctx.stores.catalog;
        let file = catalog
            .file(file_id)?
            .filter(|f| f.owner == owner)
            .ok_or(VaultError::PermissionDenied)?;

        remove_blob(&file.storage_path)?;
        if let Err(e) = catalog.remove_file(file_id) {
            error!(
                %owner,
                %file_id,
                "blob deleted but record kept, retry the delete: {e:#}"
            );
            return Err(e.into());
        }

        info!(%owner, %file_id, size = file.size, "file deleted");
        Ok(())
    }
}
