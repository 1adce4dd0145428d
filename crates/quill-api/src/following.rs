use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};

use quill_types::api::{Claims, TargetUserRequest};

use crate::delivery;
use crate::state::{AppState, blocking, internal};

pub async fn create_following(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TargetUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let follower_id = claims.sub;
    let followee_id = req.user_id;
    if follower_id == followee_id {
        return Err(StatusCode::BAD_REQUEST);
    }

    blocking(&state, move |state| {
        if !state.db.user_exists(followee_id).map_err(internal)? {
            return Err(StatusCode::NOT_FOUND);
        }
        if !state.db.insert_following(follower_id, followee_id).map_err(internal)? {
            return Ok(());
        }

        info!("{} followed {}", follower_id, followee_id);
        if let Err(e) = delivery::deliver_follow(state, follower_id, followee_id) {
            warn!("follow notification for {} failed: {:#}", followee_id, e);
        }
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_following(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TargetUserRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let follower_id = claims.sub;
    let followee_id = req.user_id;

    blocking(&state, move |state| {
        state
            .db
            .delete_following(follower_id, followee_id)
            .map_err(internal)
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
