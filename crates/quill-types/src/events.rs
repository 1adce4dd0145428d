use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Note, Notification};

/// Named live channels a connection can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamChannel {
    /// Events addressed to the connected user.
    Main,
    /// Every new note on the server.
    LocalTimeline,
}

/// Events sent over the streaming WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum StreamEvent {
    /// Server confirms successful identification
    Ready { user_id: Uuid, username: String },

    /// A channel subscription is live
    Connected { channel: StreamChannel },

    /// A new note was posted (localTimeline)
    Note(Note),

    /// A note mentioning the user was posted
    Mention(Note),

    /// A notification was created for the user
    Notification(Notification),

    /// The user's unread-mention flag was raised
    UnreadMention { note_id: Uuid },

    /// The user's unread-notification flag was raised
    UnreadNotification { notification_id: Uuid },

    /// All mentions were acknowledged
    ReadAllUnreadMentions,

    /// All notifications were acknowledged
    ReadAllNotifications,
}

impl StreamEvent {
    /// Wire discriminator, used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Connected { .. } => "connected",
            Self::Note(_) => "note",
            Self::Mention(_) => "mention",
            Self::Notification(_) => "notification",
            Self::UnreadMention { .. } => "unreadMention",
            Self::UnreadNotification { .. } => "unreadNotification",
            Self::ReadAllUnreadMentions => "readAllUnreadMentions",
            Self::ReadAllNotifications => "readAllNotifications",
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum StreamCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Start receiving events for a channel
    Connect { channel: StreamChannel },

    /// Stop receiving events for a channel
    Disconnect { channel: StreamChannel },
}
