use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use quill_types::api::{Claims, CreateReactionRequest};

use crate::delivery;
use crate::state::{AppState, blocking, internal};

const MAX_REACTION_LENGTH: usize = 64;

pub async fn create_reaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReactionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let reaction = req.reaction.trim().to_string();
    if reaction.is_empty() || reaction.chars().count() > MAX_REACTION_LENGTH {
        return Err(StatusCode::BAD_REQUEST);
    }

    let reactor = claims.sub;
    let note_id = req.note_id;

    blocking(&state, move |state| {
        let note = state
            .db
            .get_note(note_id)
            .map_err(internal)?
            .ok_or(StatusCode::NOT_FOUND)?;

        let inserted = state
            .db
            .insert_reaction(Uuid::new_v4(), note_id, reactor, &reaction, Utc::now())
            .map_err(internal)?;
        if !inserted {
            return Err(StatusCode::CONFLICT);
        }

        if let Err(e) = delivery::deliver_reaction(state, reactor, &note, &reaction) {
            warn!("reaction notification for note {} failed: {:#}", note_id, e);
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
