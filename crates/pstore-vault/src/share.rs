//! Share links: link-key re-encryption, expiry, per-recipient quotas, revocation.
//!
//! ```text
//!            revoke
//!   Shared ─────────► Revoked (terminal)
//!
//!   expired = now >= expires_at, evaluated on every access
//! ```
//!
//! A link's blob under `shares/` is sealed with its own random key, so revoking
//! or expiring a link never touches the owner's sealed copy. The owner's
//! signature is checked over the plaintext when the link is created and again
//! when a recipient opens it.

use std::sync::Arc;

use pstore_core::{
    now_unix, FileId, OwnerId, Protection, QuotaKind, ShareGrant, ShareLink, ShareStatus,
    ShareToken, VaultError, VaultResult,
};
use pstore_crypto::{
    decrypt, encrypt, generate_share_token, load_public_key, open_with_passphrase, verify_file,
    verify_reader, CryptoError, LinkKey,
};
use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use crate::context::{read_blob, remove_blob, write_blob, VaultContext};
use crate::staging::Transfer;
use crate::store::{GrantUse, Notification};

#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub file_id: FileId,
    pub owner: OwnerId,
    pub recipients: Vec<OwnerId>,
    /// Unix seconds; must be strictly in the future
    pub expires_at: u64,
    /// Downloads allowed per recipient; `None` applies the configured default
    pub quota: Option<u32>,
    pub note: Option<String>,
}

pub struct ShareEngine {
    ctx: Arc<VaultContext>,
}

impl ShareEngine {
    pub fn new(ctx: Arc<VaultContext>) -> Self {
        ShareEngine { ctx }
    }

    pub fn create_link(
        &self,
        req: ShareRequest,
        passphrase: &SecretString,
    ) -> VaultResult<ShareLink> {
        self.create_link_at(req, passphrase, now_unix())
    }

    pub fn create_link_at(
        &self,
        req: ShareRequest,
        passphrase: &SecretString,
        now: u64,
    ) -> VaultResult<ShareLink> {
        let ctx = &self.ctx;
        let file = ctx
            .stores
            .catalog
            .file(&req.file_id)?
            .filter(|f| f.owner == req.owner)
            .ok_or(VaultError::PermissionDenied)?;

        if req.expires_at <= now {
            return Err(VaultError::InvalidExpiry);
        }
        let max = ctx.sharing.max_lifetime_secs;
        if max > 0 && req.expires_at - now > max {
            return Err(VaultError::InvalidExpiry);
        }
        let quota = req.quota.unwrap_or(ctx.sharing.default_download_quota);
        if quota == 0 {
            return Err(VaultError::InvalidQuota(quota));
        }

        let account = ctx.account(req.owner)?;
        ctx.check_passphrase(&account, passphrase)?;

        let blob = read_blob(&file.storage_path, file.file_id.as_str())?;
        let (plaintext, signature) = match &file.protection {
            Protection::Sealed { signature } => {
                let plaintext =
                    open_with_passphrase(passphrase, &ctx.kdf, &blob).map_err(|e| match e {
                        CryptoError::DecryptionFailed => VaultError::InvalidPassphrase,
                        other => other.into(),
                    })?;
                let public_key = load_public_key(&account.public_key_pem)?;
                if verify_reader(&mut plaintext.as_slice(), signature, &public_key).is_err() {
                    error!(
                        security_event = true,
                        owner = %req.owner,
                        file_id = %file.file_id,
                        "signature mismatch while sharing: refusing to re-encrypt"
                    );
                    return Err(VaultError::SignatureMismatch);
                }
                (plaintext, Some(signature.clone()))
            }
            Protection::Plain => (blob, None),
        };

        let link_key = LinkKey::generate();
        let sealed = encrypt(link_key.as_bytes(), &plaintext)?;
        let link_id = uuid::Uuid::new_v4().to_string();
        let blob_path = ctx.paths.share_blob(&link_id);
        write_blob(&blob_path, &sealed)?;

        let mut recipients: Vec<OwnerId> = Vec::with_capacity(req.recipients.len());
        for r in req.recipients {
            if !recipients.contains(&r) {
                recipients.push(r);
            }
        }
        let grants = recipients
            .iter()
            .map(|&recipient| ShareGrant {
                link_id: link_id.clone(),
                recipient,
                download_count: 0,
            })
            .collect();

        let link = ShareLink {
            link_id,
            token: generate_share_token(),
            file_id: file.file_id.clone(),
            owner: req.owner,
            original_name: file.original_name.clone(),
            mime_type: file.mime_type.clone(),
            blob_path: blob_path.clone(),
            link_key: link_key.to_stored(),
            signature,
            expires_at: req.expires_at,
            status: ShareStatus::Shared,
            quota,
            note: req.note,
            created_at: now,
        };

        if let Err(e) = ctx.stores.shares.insert_link(link.clone(), grants) {
            if let Err(cleanup) = remove_blob(&blob_path) {
                warn!(link_id = %link.link_id, "failed to remove orphaned share blob: {cleanup}");
            }
            return Err(e.into());
        }

        info!(
            owner = %req.owner,
            file_id = %link.file_id,
            link_id = %link.link_id,
            recipients = recipients.len(),
            quota,
            expires_at = link.expires_at,
            "share link created"
        );
        ctx.notify(Notification::LinkShared {
            owner: req.owner,
            file_id: link.file_id.clone(),
            recipients,
        });
        Ok(link)
    }

    pub fn access_link(&self, token: &ShareToken, recipient: OwnerId) -> VaultResult<Transfer> {
        self.access_link_at(token, recipient, now_unix())
    }

    /// Open a link for `recipient`.
    ///
    /// Checks run revoked, expired, grant, quota; the grant counter is only
    /// incremented (atomically, re-checking the quota) once the plaintext has
    /// been materialized and verified.
    pub fn access_link_at(
        &self,
        token: &ShareToken,
        recipient: OwnerId,
        now: u64,
    ) -> VaultResult<Transfer> {
        let ctx = &self.ctx;
        let link = ctx
            .stores
            .shares
            .link(token)?
            .ok_or(VaultError::PermissionDenied)?;

        if link.is_revoked() {
            return Err(VaultError::LinkRevoked);
        }
        if link.is_expired(now) {
            return Err(VaultError::LinkExpired);
        }
        let grant = ctx
            .stores
            .shares
            .grant(&link.link_id, recipient)?
            .ok_or(VaultError::PermissionDenied)?;
        if grant.download_count >= link.quota {
            return Err(VaultError::QuotaExceeded(QuotaKind::Downloads {
                quota: link.quota,
            }));
        }

        let blob = read_blob(&link.blob_path, &link.link_id)?;
        let key = LinkKey::from_stored(&link.link_key)?;
        let plaintext = decrypt(key.as_bytes(), &blob)?;

        let transfer = Transfer::materialize(
            &ctx.paths.transfer,
            link.file_id.clone(),
            &link.original_name,
            &link.mime_type,
            &plaintext,
        )?;

        if let Some(signature) = &link.signature {
            let owner = ctx.account(link.owner)?;
            let public_key = load_public_key(&owner.public_key_pem)?;
            if verify_file(transfer.path(), signature, &public_key).is_err() {
                error!(
                    security_event = true,
                    link_id = %link.link_id,
                    file_id = %link.file_id,
                    "signature mismatch on shared copy: unauthorized file alteration detected"
                );
                return Err(VaultError::SignatureMismatch);
            }
        }

        match ctx.stores.shares.consume_grant(token, recipient)? {
            GrantUse::Consumed { download_count } => {
                info!(
                    link_id = %link.link_id,
                    %recipient,
                    downloads = download_count,
                    quota = link.quota,
                    "share link accessed"
                );
                Ok(transfer)
            }
            GrantUse::Exhausted => Err(VaultError::QuotaExceeded(QuotaKind::Downloads {
                quota: link.quota,
            })),
            GrantUse::Revoked => Err(VaultError::LinkRevoked),
            GrantUse::NoGrant => Err(VaultError::PermissionDenied),
        }
    }

    /// Revoke a link and delete its blob. Only the owner may revoke, and only once.
    ///
    /// The revocation stands once recorded. A blob that cannot be deleted is
    /// left for [`ShareEngine::purge_expired`], which reclaims blobs of revoked
    /// links; access is refused either way.
    pub fn revoke_link(&self, token: &ShareToken, owner: OwnerId) -> VaultResult<()> {
        let ctx = &self.ctx;
        let link = ctx
            .stores
            .shares
            .link(token)?
            .filter(|l| l.owner == owner)
            .ok_or(VaultError::PermissionDenied)?;

        if link.is_revoked() || !ctx.stores.shares.revoke(token)? {
            return Err(VaultError::AlreadyRevoked);
        }
        if let Err(e) = remove_blob(&link.blob_path) {
            warn!(
                link_id = %link.link_id,
                "share blob not deleted on revoke, left for sweep: {e}"
            );
        }

        info!(%owner, link_id = %link.link_id, file_id = %link.file_id, "share link revoked");
        Ok(())
    }

    /// Links created by `owner`, oldest first.
    pub fn links_of(&self, owner: OwnerId) -> VaultResult<Vec<ShareLink>> {
        let mut links: Vec<ShareLink> = self
            .ctx
            .stores
            .shares
            .links()?
            .into_iter()
            .filter(|l| l.owner == owner)
            .collect();
        links.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.link_id.cmp(&b.link_id))
        });
        Ok(links)
    }

    pub fn purge_expired(&self) -> VaultResult<usize> {
        self.purge_expired_at(now_unix())
    }

    /// Delete blobs of links that are expired or revoked. Returns how many
    /// blobs were removed. Access checks stay lazy; this only reclaims disk.
    pub fn purge_expired_at(&self, now: u64) -> VaultResult<usize> {
        let mut removed = 0;
        for link in self.ctx.stores.shares.links()? {
            if !(link.is_expired(now) || link.is_revoked()) || !link.blob_path.exists() {
                continue;
            }
            match remove_blob(&link.blob_path) {
                Ok(()) => {
                    debug!(link_id = %link.link_id, "share blob reclaimed");
                    removed += 1;
                }
                Err(e) => warn!(link_id = %link.link_id, "failed to reclaim share blob: {e}"),
            }
        }
        if removed > 0 {
            info!(removed, "expired share blobs reclaimed");
        }
        Ok(removed)
    }
}
