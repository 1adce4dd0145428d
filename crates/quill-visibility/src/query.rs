use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use quill_db::Database;
use quill_types::models::{Note, Notification};

use crate::error::VisibilityError;
use crate::filter::VisibilityFilter;

/// Upper bound on underlying page fetches per request, so a long run of
/// hidden items cannot make a list request unbounded.
pub const MAX_FILL_ROUNDS: usize = 5;

/// Applies the visibility rule to list queries.
///
/// Results keep the order of the underlying query; hidden items are removed
/// and nothing else is reordered or deduplicated. An empty result is valid.
#[derive(Clone)]
pub struct ContentQueryFilter {
    db: Arc<Database>,
    filter: VisibilityFilter,
}

impl ContentQueryFilter {
    pub fn new(db: Arc<Database>, filter: VisibilityFilter) -> Self {
        Self { db, filter }
    }

    pub fn filter_notes(&self, observer: Uuid, notes: Vec<Note>) -> Result<Vec<Note>, VisibilityError> {
        let mutes = self.filter.mute_set(observer)?;
        let mut visible = Vec::with_capacity(notes.len());
        for note in notes {
            if self.filter.judge_note(observer, &mutes, &note)?.is_visible() {
                visible.push(note);
            }
        }
        Ok(visible)
    }

    pub fn filter_notifications(
        &self,
        observer: Uuid,
        notifications: Vec<Notification>,
    ) -> Result<Vec<Notification>, VisibilityError> {
        let mutes = self.filter.mute_set(observer)?;
        let mut visible = Vec::with_capacity(notifications.len());
        for notification in notifications {
            if self.filter.judge_notification(observer, &mutes, &notification)?.is_visible() {
                visible.push(notification);
            }
        }
        Ok(visible)
    }

    /// Every note on the server, newest first.
    pub fn local_timeline(
        &self,
        observer: Uuid,
        limit: u32,
        until_id: Option<Uuid>,
    ) -> Result<Vec<Note>, VisibilityError> {
        self.collect_notes(observer, limit, until_id, |cursor, batch| {
            self.db.local_timeline(observer, batch, cursor)
        })
    }

    /// The observer's own notes and those of users they follow.
    pub fn home_timeline(
        &self,
        observer: Uuid,
        limit: u32,
        until_id: Option<Uuid>,
    ) -> Result<Vec<Note>, VisibilityError> {
        self.collect_notes(observer, limit, until_id, |cursor, batch| {
            self.db.home_timeline(observer, batch, cursor)
        })
    }

    /// Notes addressed to the observer. Being mentioned does not override a
    /// mute of the author.
    pub fn mentions(
        &self,
        observer: Uuid,
        limit: u32,
        until_id: Option<Uuid>,
    ) -> Result<Vec<Note>, VisibilityError> {
        self.collect_notes(observer, limit, until_id, |cursor, batch| {
            self.db.mentions_of(observer, batch, cursor)
        })
    }

    pub fn notifications(
        &self,
        observer: Uuid,
        limit: u32,
        until_id: Option<Uuid>,
    ) -> Result<Vec<Notification>, VisibilityError> {
        let mutes = self.filter.mute_set(observer)?;
        fill_page(
            limit,
            until_id,
            |cursor, batch| self.db.get_notifications(observer, batch, cursor),
            |n: &Notification| Ok(self.filter.judge_notification(observer, &mutes, n)?.is_visible()),
            |n: &Notification| n.id,
        )
    }

    /// Page through `fetch` until `limit` visible notes are found or the
    /// source runs dry.
    pub fn collect_notes<F>(
        &self,
        observer: Uuid,
        limit: u32,
        until_id: Option<Uuid>,
        fetch: F,
    ) -> Result<Vec<Note>, VisibilityError>
    where
        F: FnMut(Option<Uuid>, u32) -> anyhow::Result<Vec<Note>>,
    {
        let mutes = self.filter.mute_set(observer)?;
        fill_page(
            limit,
            until_id,
            fetch,
            |note: &Note| Ok(self.filter.judge_note(observer, &mutes, note)?.is_visible()),
            |note: &Note| note.id,
        )
    }
}

fn fill_page<T, F, K>(
    limit: u32,
    until_id: Option<Uuid>,
    mut fetch: F,
    mut keep: K,
    id_of: fn(&T) -> Uuid,
) -> Result<Vec<T>, VisibilityError>
where
    F: FnMut(Option<Uuid>, u32) -> anyhow::Result<Vec<T>>,
    K: FnMut(&T) -> Result<bool, VisibilityError>,
{
    let want = limit as usize;
    let mut out = Vec::with_capacity(want);
    if want == 0 {
        return Ok(out);
    }

    let mut cursor = until_id;
    for round in 0..MAX_FILL_ROUNDS {
        let batch = fetch(cursor, limit)?;
        let exhausted = batch.len() < want;
        cursor = batch.last().map(id_of);

        for item in batch {
            if keep(&item)? {
                out.push(item);
                if out.len() == want {
                    return Ok(out);
                }
            }
        }

        if exhausted || cursor.is_none() {
            break;
        }
        debug!("page short after filtering (round {}), fetching more", round + 1);
    }

    Ok(out)
}
