use crate::models::{NotificationRow, UnreadRow, format_timestamp};
use crate::{Database, OptionalExt};
use anyhow::Result;
use quill_types::models::{Notification, UnreadFlags};
use uuid::Uuid;

impl Database {
    // -- Notifications --

    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, recipient_id, kind, actor_id, note_id, reaction, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    notification.id.to_string(),
                    notification.recipient_id.to_string(),
                    notification.kind.as_str(),
                    notification.actor_id.to_string(),
                    notification.note_id.map(|id| id.to_string()),
                    notification.reaction,
                    notification.is_read,
                    format_timestamp(&notification.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Newest-first page of the user's notifications, minus those caused by
    /// users they mute.
    pub fn get_notifications(
        &self,
        recipient_id: Uuid,
        limit: u32,
        until_id: Option<Uuid>,
    ) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, recipient_id, kind, actor_id, note_id, reaction, is_read, created_at
                 FROM notifications
                 WHERE recipient_id = ?1
                   AND actor_id NOT IN (SELECT mutee_id FROM mutings WHERE muter_id = ?1)
                   AND (?2 IS NULL OR rowid < (SELECT rowid FROM notifications WHERE id = ?2))
                 ORDER BY rowid DESC
                 LIMIT ?3",
            )?;

            let rows = stmt
                .query_map(
                    rusqlite::params![recipient_id.to_string(), until_id.map(|id| id.to_string()), limit],
                    |row| {
                        Ok(NotificationRow {
                            id: row.get(0)?,
                            recipient_id: row.get(1)?,
                            kind: row.get(2)?,
                            actor_id: row.get(3)?,
                            note_id: row.get(4)?,
                            reaction: row.get(5)?,
                            is_read: row.get(6)?,
                            created_at: row.get(7)?,
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Notification::try_from).collect()
        })
    }

    // -- Unread flags --

    pub fn get_unread_flags(&self, user_id: Uuid) -> Result<Option<UnreadFlags>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT has_unread_mentions, has_unread_notifications FROM users WHERE id = ?1",
                    [user_id.to_string()],
                    |row| {
                        Ok(UnreadRow {
                            has_unread_mentions: row.get(0)?,
                            has_unread_notifications: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row.map(UnreadFlags::from))
        })
    }

    pub fn set_unread_mentions(&self, user_id: Uuid, unread: bool) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET has_unread_mentions = ?2 WHERE id = ?1",
                (user_id.to_string(), unread),
            )?;
            Ok(())
        })
    }

    pub fn set_unread_notifications(&self, user_id: Uuid, unread: bool) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET has_unread_notifications = ?2 WHERE id = ?1",
                (user_id.to_string(), unread),
            )?;
            Ok(())
        })
    }

    /// Mark every stored notification read and clear the flag in one transaction.
    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE notifications SET is_read = 1 WHERE recipient_id = ?1 AND is_read = 0",
                [user_id.to_string()],
            )?;
            tx.execute(
                "UPDATE users SET has_unread_notifications = 0 WHERE id = ?1",
                [user_id.to_string()],
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}
