use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::warn;

use quill_types::api::{Claims, MutingResponse, TargetUserRequest};
use quill_visibility::MuteError;

use crate::state::{AppState, blocking, internal};

fn mute_status(e: MuteError) -> StatusCode {
    match e {
        MuteError::SelfMute => StatusCode::BAD_REQUEST,
        MuteError::UserNotFound(_) => StatusCode::NOT_FOUND,
        MuteError::Store(e) => {
            warn!("mute store failure: {:#}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

pub async fn create_mute(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TargetUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let muter_id = claims.sub;
    let mutee_id = req.user_id;

    blocking(&state, move |state| {
        state.mutes.create(muter_id, mutee_id).map_err(mute_status)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_mute(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TargetUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let muter_id = claims.sub;
    let mutee_id = req.user_id;

    blocking(&state, move |state| {
        state.mutes.delete(muter_id, mutee_id).map_err(mute_status)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_mutes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let muter_id = claims.sub;

    let mutings = blocking(&state, move |state| {
        let edges = state.mutes.list(muter_id).map_err(mute_status)?;
        let ids: Vec<_> = edges.iter().map(|e| e.mutee_id).collect();
        let names = state.db.get_usernames(&ids).map_err(internal)?;

        Ok(edges
            .into_iter()
            .filter_map(|edge| {
                let mutee_username = names.get(&edge.mutee_id)?.clone();
                Some(MutingResponse {
                    mutee_id: edge.mutee_id,
                    mutee_username,
                    created_at: edge.created_at,
                })
            })
            .collect::<Vec<_>>())
    })
    .await?;

    Ok(Json(mutings))
}
