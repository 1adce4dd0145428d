use tracing::{trace, warn};
use uuid::Uuid;

use quill_visibility::VisibilityFilter;

use crate::emission::Subject;

/// Per-subscriber admission check for live events.
///
/// Runs once per (event, subscriber) at emission time against the mute state
/// committed at that moment. Any failure drops the event.
#[derive(Clone)]
pub struct StreamEventGate {
    filter: VisibilityFilter,
}

impl StreamEventGate {
    pub fn new(filter: VisibilityFilter) -> Self {
        Self { filter }
    }

    /// Blocking: may hit the database to resolve renote chains.
    pub fn admit(&self, observer: Uuid, subject: &Subject) -> bool {
        let verdict = match subject {
            Subject::Control => return true,
            Subject::Note(note) => self.filter.is_visible(observer, note),
            Subject::Notification(notification) => {
                self.filter.is_notification_visible(observer, notification)
            }
        };

        match verdict {
            Ok(true) => true,
            Ok(false) => {
                trace!("gate dropped event for {}", observer);
                false
            }
            Err(e) => {
                warn!("gate check failed for {}, dropping event: {}", observer, e);
                false
            }
        }
    }
}
