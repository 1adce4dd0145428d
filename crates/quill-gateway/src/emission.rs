use uuid::Uuid;

use quill_types::events::{StreamChannel, StreamEvent};
use quill_types::models::{Note, Notification};

/// Who an emission is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The `main` channel of every connection owned by this user.
    User(Uuid),
    /// Every connection subscribed to this channel.
    Channel(StreamChannel),
}

/// The content the gate judges before an event is pushed.
#[derive(Debug, Clone)]
pub enum Subject {
    /// Acknowledgements and other events that carry no third-party content.
    Control,
    Note(Note),
    Notification(Notification),
}

/// An event on its way to subscribers, paired with what it must be judged
/// on. Construct through the helpers so the payload and subject agree.
#[derive(Debug, Clone)]
pub struct Emission {
    pub route: Route,
    pub event: StreamEvent,
    pub subject: Subject,
}

impl Emission {
    pub fn note(note: Note) -> Self {
        Self {
            route: Route::Channel(StreamChannel::LocalTimeline),
            event: StreamEvent::Note(note.clone()),
            subject: Subject::Note(note),
        }
    }

    pub fn mention(recipient: Uuid, note: Note) -> Self {
        Self {
            route: Route::User(recipient),
            event: StreamEvent::Mention(note.clone()),
            subject: Subject::Note(note),
        }
    }

    pub fn unread_mention(recipient: Uuid, note: Note) -> Self {
        Self {
            route: Route::User(recipient),
            event: StreamEvent::UnreadMention { note_id: note.id },
            subject: Subject::Note(note),
        }
    }

    pub fn notification(notification: Notification) -> Self {
        Self {
            route: Route::User(notification.recipient_id),
            event: StreamEvent::Notification(notification.clone()),
            subject: Subject::Notification(notification),
        }
    }

    pub fn unread_notification(notification: Notification) -> Self {
        Self {
            route: Route::User(notification.recipient_id),
            event: StreamEvent::UnreadNotification {
                notification_id: notification.id,
            },
            subject: Subject::Notification(notification),
        }
    }

    pub fn read_all_unread_mentions(user_id: Uuid) -> Self {
        Self::control(user_id, StreamEvent::ReadAllUnreadMentions)
    }

    pub fn read_all_notifications(user_id: Uuid) -> Self {
        Self::control(user_id, StreamEvent::ReadAllNotifications)
    }

    fn control(user_id: Uuid, event: StreamEvent) -> Self {
        Self {
            route: Route::User(user_id),
            event,
            subject: Subject::Control,
        }
    }
}
