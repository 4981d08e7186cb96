//! pstore-vault: the peerstore engine
//!
//! Components, leaf first:
//!   - `account`: passphrase hash + sealed key pair per owner
//!   - `upload`: scratch → sign → seal → blob → catalog record
//!   - `retrieve`: open → materialize → verify → count
//!   - `share`: link-key copies with expiry, per-recipient quotas, revocation
//!   - `files`: listing, usage, deletion
//!
//! All metadata goes through the traits in [`store`]; [`ledger::JsonLedger`]
//! implements every one of them on a single JSON file.

pub mod account;
pub mod context;
pub mod files;
pub mod ledger;
pub mod notify;
pub mod retrieve;
pub mod share;
pub mod staging;
pub mod store;
pub mod upload;
pub mod vault;

pub use account::AccountService;
pub use context::{Stores, VaultContext};
pub use files::FileService;
pub use ledger::JsonLedger;
pub use notify::TracingNotifier;
pub use retrieve::RetrievalPipeline;
pub use share::{ShareEngine, ShareRequest};
pub use staging::Transfer;
pub use store::{
    AccountStore, FileCatalog, GrantUse, Notification, NotificationSink, ShareLedger,
    UsageAccountant,
};
pub use upload::{UploadMode, UploadPipeline, UploadRequest};
pub use vault::Vault;
