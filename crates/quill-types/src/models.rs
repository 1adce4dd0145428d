use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A post. A note with `renote_id` set is a renote and logically contains
/// the referenced note; it is still attributed to its own author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub author_id: Uuid,
    pub text: Option<String>,
    pub mentions: Vec<Uuid>,
    pub renote_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn mentions_user(&self, user_id: Uuid) -> bool {
        self.mentions.contains(&user_id)
    }

    pub fn is_renote(&self) -> bool {
        self.renote_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Mention,
    Reaction,
    Renote,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::Reaction => "reaction",
            Self::Renote => "renote",
            Self::Follow => "follow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mention" => Some(Self::Mention),
            "reaction" => Some(Self::Reaction),
            "renote" => Some(Self::Renote),
            "follow" => Some(Self::Follow),
            _ => None,
        }
    }
}

/// `actor_id` is the user whose action produced the notification (the
/// reactor, the mentioner, the renoter), not necessarily the note's author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub actor_id: Uuid,
    pub note_id: Option<Uuid>,
    pub reaction: Option<String>,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

/// Directional mute edge. Only the muter's view is affected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteEdge {
    pub muter_id: Uuid,
    pub mutee_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadFlags {
    pub has_unread_mentions: bool,
    pub has_unread_notifications: bool,
}
