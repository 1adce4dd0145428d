use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use quill_db::Database;
use quill_types::models::{Note, Notification, UnreadFlags};

use crate::error::VisibilityError;
use crate::filter::VisibilityFilter;

/// Keeps the per-user unread flags.
///
/// A flag is only raised for events the owner is allowed to see. Events that
/// fail the visibility check leave the flags untouched.
#[derive(Clone)]
pub struct UnreadStateAggregator {
    db: Arc<Database>,
    filter: VisibilityFilter,
}

impl UnreadStateAggregator {
    pub fn new(db: Arc<Database>, filter: VisibilityFilter) -> Self {
        Self { db, filter }
    }

    /// Record that `note` mentions `recipient`. Returns true if the
    /// unread-mention flag was raised.
    pub fn record_mention(&self, recipient: Uuid, note: &Note) -> Result<bool, VisibilityError> {
        if !note.mentions_user(recipient) || note.author_id == recipient {
            return Ok(false);
        }
        if !self.filter.is_visible(recipient, note)? {
            debug!("mention {} suppressed for {}", note.id, recipient);
            return Ok(false);
        }

        self.db.set_unread_mentions(recipient, true)?;
        Ok(true)
    }

    /// Record a new notification for its recipient. Returns true if the
    /// unread-notification flag was raised.
    pub fn record_notification(&self, notification: &Notification) -> Result<bool, VisibilityError> {
        if notification.is_read {
            return Ok(false);
        }
        if !self.filter.is_notification_visible(notification.recipient_id, notification)? {
            debug!(
                "notification {} suppressed for {}",
                notification.id, notification.recipient_id
            );
            return Ok(false);
        }

        self.db.set_unread_notifications(notification.recipient_id, true)?;
        Ok(true)
    }

    pub fn mark_all_mentions_read(&self, user_id: Uuid) -> anyhow::Result<()> {
        self.db.set_unread_mentions(user_id, false)
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> anyhow::Result<()> {
        self.db.mark_all_notifications_read(user_id)
    }

    pub fn flags(&self, user_id: Uuid) -> anyhow::Result<Option<UnreadFlags>> {
        self.db.get_unread_flags(user_id)
    }
}
