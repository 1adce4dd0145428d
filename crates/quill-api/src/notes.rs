use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use quill_types::api::{Claims, CreateNoteRequest, NoteResponse, PageQuery};
use quill_types::models::Note;

use crate::delivery;
use crate::mentions::extract_mentions;
use crate::state::{AppState, AppStateInner, blocking, internal, page_limit, unavailable};

const MAX_NOTE_LENGTH: usize = 3000;

pub async fn create_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateNoteRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let text = req.text.filter(|t| !t.trim().is_empty());
    if text.is_none() && req.renote_id.is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if text.as_ref().is_some_and(|t| t.chars().count() > MAX_NOTE_LENGTH) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let author_id = claims.sub;
    let renote_id = req.renote_id;

    let response = blocking(&state, move |state| {
        let renote_target = match renote_id {
            Some(id) => Some(state.db.get_note(id).map_err(internal)?.ok_or(StatusCode::BAD_REQUEST)?),
            None => None,
        };

        let handles = text.as_deref().map(extract_mentions).unwrap_or_default();
        let resolved = state.db.get_user_ids_by_usernames(&handles).map_err(internal)?;
        // Unknown handles stay plain text
        let mentions: Vec<Uuid> = handles.iter().filter_map(|h| resolved.get(h).copied()).collect();

        let note = Note {
            id: Uuid::new_v4(),
            author_id,
            text,
            mentions,
            renote_id,
            created_at: Utc::now(),
        };
        state.db.insert_note(&note).map_err(internal)?;
        debug!("{} created note {}", author_id, note.id);

        delivery::deliver_note(state, &note, renote_target.as_ref());

        let mut responses = to_responses(state, vec![note])?;
        responses.pop().ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn local_timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = page_limit(&page);
    let notes = blocking(&state, move |state| {
        let notes = state
            .queries
            .local_timeline(claims.sub, limit, page.until_id)
            .map_err(unavailable)?;
        to_responses(state, notes)
    })
    .await?;

    Ok(Json(notes))
}

pub async fn home_timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = page_limit(&page);
    let notes = blocking(&state, move |state| {
        let notes = state
            .queries
            .home_timeline(claims.sub, limit, page.until_id)
            .map_err(unavailable)?;
        to_responses(state, notes)
    })
    .await?;

    Ok(Json(notes))
}

/// Notes mentioning the caller, minus anything from users they mute.
pub async fn mentions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = page_limit(&page);
    let notes = blocking(&state, move |state| {
        let notes = state
            .queries
            .mentions(claims.sub, limit, page.until_id)
            .map_err(unavailable)?;
        to_responses(state, notes)
    })
    .await?;

    Ok(Json(notes))
}

fn to_responses(state: &AppStateInner, notes: Vec<Note>) -> Result<Vec<NoteResponse>, StatusCode> {
    let mut author_ids: Vec<Uuid> = notes.iter().map(|n| n.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();
    let names = state.db.get_usernames(&author_ids).map_err(internal)?;

    Ok(notes
        .into_iter()
        .map(|note| NoteResponse {
            author_username: names.get(&note.author_id).cloned().unwrap_or_default(),
            id: note.id,
            author_id: note.author_id,
            text: note.text,
            mentions: note.mentions,
            renote_id: note.renote_id,
            created_at: note.created_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use quill_db::Database;

    use super::*;

    fn claims_for(state: &AppState, name: &str) -> Claims {
        let id = Uuid::new_v4();
        state.db.create_user(id, name, "hash").unwrap();
        Claims { sub: id, username: name.into(), exp: usize::MAX }
    }

    #[tokio::test]
    async fn timeline_read_fails_with_service_unavailable() {
        let state = AppStateInner::new(Database::open_in_memory().unwrap(), "secret".into());
        let alice = claims_for(&state, "alice");

        let db = state.db.clone();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            db.with_conn::<_, ()>(|_| panic!("poisoning test database"))
        }));

        let resp = local_timeline(State(state.clone()), Extension(alice.clone()), Query(PageQuery::default())).await;
        assert_eq!(resp.err(), Some(StatusCode::SERVICE_UNAVAILABLE));

        let resp = mentions(State(state), Extension(alice), Query(PageQuery::default())).await;
        assert_eq!(resp.err(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }
}
