use anyhow::Result;
use tracing::info;

use crate::store::{Notification, NotificationSink};

/// Emits notifications as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, event: &Notification) -> Result<()> {
        match event {
            Notification::FileUploaded {
                owner,
                file_id,
                original_name,
                size,
            } => info!(
                target: "pstore::notify",
                %owner, %file_id, name = %original_name, size,
                "file uploaded"
            ),
            Notification::LinkShared {
                owner,
                file_id,
                recipients,
            } => info!(
                target: "pstore::notify",
                %owner, %file_id, recipients = recipients.len(),
                "file shared"
            ),
        }
        Ok(())
    }
}
