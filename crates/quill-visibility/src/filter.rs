use std::sync::Arc;

use tracing::trace;
use uuid::Uuid;

use quill_db::Database;
use quill_db::queries::NoteLink;
use quill_types::models::{Note, Notification};

use crate::cache::{MuteSet, MuteSetCache};
use crate::error::VisibilityError;
use crate::store::MuteRelationStore;

/// Renote chains longer than this are treated as unresolvable.
pub const MAX_RENOTE_DEPTH: usize = 8;

/// Number of observers whose mute sets are kept in memory.
const MUTE_CACHE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenReason {
    MutedAuthor,
    MutedRenoteAuthor,
    UnresolvedRenote,
    RenoteChainTooDeep,
    MutedActor,
    /// The note a notification refers to is itself hidden.
    HiddenSubjectNote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Visible,
    Hidden(HiddenReason),
}

impl Verdict {
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Visible)
    }
}

/// Decide whether `note` is visible to the owner of `mutes`.
///
/// Rules, in order: a muted author hides the note; any muted author along the
/// renote chain hides it; a renote target that cannot be resolved, or a chain
/// deeper than [`MAX_RENOTE_DEPTH`], hides it. `resolve` only reads.
pub fn judge_note<F>(mutes: &MuteSet, note: &Note, mut resolve: F) -> anyhow::Result<Verdict>
where
    F: FnMut(Uuid) -> anyhow::Result<Option<NoteLink>>,
{
    if mutes.contains(note.author_id) {
        return Ok(Verdict::Hidden(HiddenReason::MutedAuthor));
    }
    walk_renotes(mutes, note.renote_id, &mut resolve)
}

/// Hidden when the user whose action produced the notification is muted, or
/// when the note it refers to is hidden under [`judge_note`]. A referenced
/// note that cannot be resolved hides the notification.
pub fn judge_notification<F>(mutes: &MuteSet, notification: &Notification, mut resolve: F) -> anyhow::Result<Verdict>
where
    F: FnMut(Uuid) -> anyhow::Result<Option<NoteLink>>,
{
    if mutes.contains(notification.actor_id) {
        return Ok(Verdict::Hidden(HiddenReason::MutedActor));
    }
    let Some(note_id) = notification.note_id else {
        return Ok(Verdict::Visible);
    };

    let Some(link) = resolve(note_id)? else {
        return Ok(Verdict::Hidden(HiddenReason::HiddenSubjectNote));
    };
    if mutes.contains(link.author_id) {
        return Ok(Verdict::Hidden(HiddenReason::HiddenSubjectNote));
    }
    Ok(match walk_renotes(mutes, link.renote_id, &mut resolve)? {
        Verdict::Visible => Verdict::Visible,
        Verdict::Hidden(_) => Verdict::Hidden(HiddenReason::HiddenSubjectNote),
    })
}

fn walk_renotes<F>(mutes: &MuteSet, start: Option<Uuid>, resolve: &mut F) -> anyhow::Result<Verdict>
where
    F: FnMut(Uuid) -> anyhow::Result<Option<NoteLink>>,
{
    let mut next = start;
    let mut depth = 0;
    while let Some(target) = next {
        depth += 1;
        if depth > MAX_RENOTE_DEPTH {
            return Ok(Verdict::Hidden(HiddenReason::RenoteChainTooDeep));
        }
        let Some(link) = resolve(target)? else {
            return Ok(Verdict::Hidden(HiddenReason::UnresolvedRenote));
        };
        if mutes.contains(link.author_id) {
            return Ok(Verdict::Hidden(HiddenReason::MutedRenoteAuthor));
        }
        next = link.renote_id;
    }

    Ok(Verdict::Visible)
}

/// The single visibility decision shared by query paths, unread flags and the
/// stream gate. Cheap to clone; all clones share one mute-set cache.
#[derive(Clone)]
pub struct VisibilityFilter {
    db: Arc<Database>,
    store: Arc<MuteRelationStore>,
    cache: Arc<MuteSetCache>,
}

impl VisibilityFilter {
    /// Build a filter and subscribe its cache to the store's invalidations.
    pub fn new(db: Arc<Database>, store: Arc<MuteRelationStore>) -> Self {
        let cache = Arc::new(MuteSetCache::new(MUTE_CACHE_CAPACITY));
        store.add_listener(cache.clone());
        Self { db, store, cache }
    }

    /// Current mute set of `observer`.
    pub fn mute_set(&self, observer: Uuid) -> Result<MuteSet, VisibilityError> {
        let store = &self.store;
        let set = self.cache.get_or_load(observer, || {
            store.mutee_set_of(observer).map_err(anyhow::Error::from)
        })?;
        Ok(set)
    }

    pub fn is_visible(&self, observer: Uuid, note: &Note) -> Result<bool, VisibilityError> {
        let mutes = self.mute_set(observer)?;
        Ok(self.judge_note(observer, &mutes, note)?.is_visible())
    }

    pub fn is_notification_visible(
        &self,
        observer: Uuid,
        notification: &Notification,
    ) -> Result<bool, VisibilityError> {
        let mutes = self.mute_set(observer)?;
        Ok(self.judge_notification(observer, &mutes, notification)?.is_visible())
    }

    /// Judge against an already-fetched mute set; used for bulk filtering.
    pub fn judge_note(&self, observer: Uuid, mutes: &MuteSet, note: &Note) -> Result<Verdict, VisibilityError> {
        let verdict = judge_note(mutes, note, |id| self.db.get_note_link(id))?;
        if let Verdict::Hidden(reason) = verdict {
            trace!("note {} hidden from {}: {:?}", note.id, observer, reason);
        }
        Ok(verdict)
    }

    pub fn judge_notification(
        &self,
        observer: Uuid,
        mutes: &MuteSet,
        notification: &Notification,
    ) -> Result<Verdict, VisibilityError> {
        let verdict = judge_notification(mutes, notification, |id| self.db.get_note_link(id))?;
        if let Verdict::Hidden(reason) = verdict {
            trace!("notification {} hidden from {}: {:?}", notification.id, observer, reason);
        }
        Ok(verdict)
    }
}
