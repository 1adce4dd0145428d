//! Database row types. These map directly to SQLite rows and are kept
//! distinct from quill-types models so the DB layer stays independent.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use quill_types::models::{MuteEdge, Note, Notification, NotificationKind, UnreadFlags, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct NoteRow {
    pub id: String,
    pub author_id: String,
    pub text: Option<String>,
    pub renote_id: Option<String>,
    pub created_at: String,
    pub mentions: Vec<String>,
}

pub struct NotificationRow {
    pub id: String,
    pub recipient_id: String,
    pub kind: String,
    pub actor_id: String,
    pub note_id: Option<String>,
    pub reaction: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

pub struct MutingRow {
    pub muter_id: String,
    pub mutee_id: String,
    pub created_at: String,
}

pub struct UnreadRow {
    pub has_unread_mentions: bool,
    pub has_unread_notifications: bool,
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("Corrupt id '{}'", raw))
}

/// Rows written by this crate carry RFC 3339; rows defaulted by SQLite carry
/// "YYYY-MM-DD HH:MM:SS" without a timezone, which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .with_context(|| format!("Corrupt timestamp '{}'", raw))
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_id(&row.id)?,
            username: row.username,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<NoteRow> for Note {
    type Error = anyhow::Error;

    fn try_from(row: NoteRow) -> Result<Self> {
        Ok(Note {
            id: parse_id(&row.id)?,
            author_id: parse_id(&row.author_id)?,
            text: row.text,
            mentions: row.mentions.iter().map(|m| parse_id(m)).collect::<Result<_>>()?,
            renote_id: row.renote_id.as_deref().map(parse_id).transpose()?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<NotificationRow> for Notification {
    type Error = anyhow::Error;

    fn try_from(row: NotificationRow) -> Result<Self> {
        let kind = NotificationKind::parse(&row.kind)
            .with_context(|| format!("Unknown notification kind '{}' on '{}'", row.kind, row.id))?;
        Ok(Notification {
            id: parse_id(&row.id)?,
            recipient_id: parse_id(&row.recipient_id)?,
            kind,
            actor_id: parse_id(&row.actor_id)?,
            note_id: row.note_id.as_deref().map(parse_id).transpose()?,
            reaction: row.reaction,
            created_at: parse_timestamp(&row.created_at)?,
            is_read: row.is_read,
        })
    }
}

impl TryFrom<MutingRow> for MuteEdge {
    type Error = anyhow::Error;

    fn try_from(row: MutingRow) -> Result<Self> {
        Ok(MuteEdge {
            muter_id: parse_id(&row.muter_id)?,
            mutee_id: parse_id(&row.mutee_id)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl From<UnreadRow> for UnreadFlags {
    fn from(row: UnreadRow) -> Self {
        UnreadFlags {
            has_unread_mentions: row.has_unread_mentions,
            has_unread_notifications: row.has_unread_notifications,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_shapes() {
        let now = Utc::now();
        let parsed = parse_timestamp(&format_timestamp(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());

        let sqlite = parse_timestamp("2024-05-01 12:30:00").unwrap();
        assert_eq!(sqlite.to_rfc3339(), "2024-05-01T12:30:00+00:00");
    }

    #[test]
    fn corrupt_ids_are_errors() {
        assert!(parse_id("not-a-uuid").is_err());
    }
}
