//! Fan-out of new content to notifications, unread flags and live streams.
//!
//! Every function here is blocking and runs inside `spawn_blocking`. Unread
//! flags and stream pushes consult the same visibility filter, so an event
//! hidden from a user neither raises their flags nor reaches their stream.

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use quill_gateway::emission::Emission;
use quill_types::models::{Note, Notification, NotificationKind};

use crate::state::AppStateInner;

/// Deliver a freshly stored note. A failure for one recipient is logged and
/// does not stop delivery to the others.
pub fn deliver_note(state: &AppStateInner, note: &Note, renote_target: Option<&Note>) {
    state.dispatcher.publish(Emission::note(note.clone()));

    for &recipient in &note.mentions {
        if recipient == note.author_id {
            continue;
        }

        state.dispatcher.publish(Emission::mention(recipient, note.clone()));
        match state.unread.record_mention(recipient, note) {
            Ok(true) => {
                state
                    .dispatcher
                    .publish(Emission::unread_mention(recipient, note.clone()));
            }
            Ok(false) => {}
            Err(e) => warn!("unread mention for {} not recorded: {}", recipient, e),
        }

        if let Err(e) = notify(state, recipient, NotificationKind::Mention, note.author_id, Some(note.id), None) {
            warn!("mention notification for {} failed: {:#}", recipient, e);
        }
    }

    if let Some(target) = renote_target {
        if target.author_id != note.author_id {
            if let Err(e) =
                notify(state, target.author_id, NotificationKind::Renote, note.author_id, Some(note.id), None)
            {
                warn!("renote notification for {} failed: {:#}", target.author_id, e);
            }
        }
    }
}

/// Deliver a new reaction to the reacted note's author.
pub fn deliver_reaction(state: &AppStateInner, reactor: Uuid, note: &Note, reaction: &str) -> anyhow::Result<()> {
    if note.author_id == reactor {
        return Ok(());
    }
    notify(
        state,
        note.author_id,
        NotificationKind::Reaction,
        reactor,
        Some(note.id),
        Some(reaction.to_string()),
    )
}

pub fn deliver_follow(state: &AppStateInner, follower: Uuid, followee: Uuid) -> anyhow::Result<()> {
    notify(state, followee, NotificationKind::Follow, follower, None, None)
}

/// Store a notification, then raise the unread flag and push it if the
/// recipient may see it.
fn notify(
    state: &AppStateInner,
    recipient: Uuid,
    kind: NotificationKind,
    actor: Uuid,
    note_id: Option<Uuid>,
    reaction: Option<String>,
) -> anyhow::Result<()> {
    let notification = Notification {
        id: Uuid::new_v4(),
        recipient_id: recipient,
        kind,
        actor_id: actor,
        note_id,
        reaction,
        created_at: Utc::now(),
        is_read: false,
    };
    state.db.insert_notification(&notification)?;

    state.dispatcher.publish(Emission::notification(notification.clone()));
    match state.unread.record_notification(&notification) {
        Ok(true) => {
            state
                .dispatcher
                .publish(Emission::unread_notification(notification));
        }
        Ok(false) => {}
        Err(e) => warn!("unread notification for {} not recorded: {}", recipient, e),
    }

    Ok(())
}
