use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use quill_gateway::emission::Emission;
use quill_types::api::{Claims, MeResponse, PageQuery};

use crate::state::{AppState, blocking, internal, page_limit, unavailable};

/// The caller's profile together with their unread flags.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.sub;

    let me = blocking(&state, move |state| {
        let user = state
            .db
            .get_user_by_id(user_id)
            .map_err(internal)?
            .ok_or(StatusCode::NOT_FOUND)?;
        let flags = state
            .unread
            .flags(user_id)
            .map_err(internal)?
            .unwrap_or_default();

        Ok(MeResponse {
            id: user_id,
            username: user.username,
            has_unread_mentions: flags.has_unread_mentions,
            has_unread_notifications: flags.has_unread_notifications,
        })
    })
    .await?;

    Ok(Json(me))
}

pub async fn read_all_unread_notes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.sub;

    blocking(&state, move |state| {
        state.unread.mark_all_mentions_read(user_id).map_err(internal)?;
        state
            .dispatcher
            .publish(Emission::read_all_unread_mentions(user_id));
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = page_limit(&page);

    let notifications = blocking(&state, move |state| {
        state
            .queries
            .notifications(claims.sub, limit, page.until_id)
            .map_err(unavailable)
    })
    .await?;

    Ok(Json(notifications))
}

pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.sub;

    blocking(&state, move |state| {
        state
            .unread
            .mark_all_notifications_read(user_id)
            .map_err(internal)?;
        state
            .dispatcher
            .publish(Emission::read_all_notifications(user_id));
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}
