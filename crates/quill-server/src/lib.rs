pub mod config;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use quill_api::middleware::require_auth;
use quill_api::state::AppState;
use quill_api::{account, auth, following, mutes, notes, reactions};
use quill_gateway::connection;

/// Build the full HTTP + streaming router.
pub fn app(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/mute/create", post(mutes::create_mute))
        .route("/mute/delete", post(mutes::delete_mute))
        .route("/mute/list", get(mutes::list_mutes))
        .route("/following/create", post(following::create_following))
        .route("/following/delete", post(following::delete_following))
        .route("/notes/create", post(notes::create_note))
        .route("/notes/mentions", get(notes::mentions))
        .route("/notes/local-timeline", get(notes::local_timeline))
        .route("/notes/timeline", get(notes::home_timeline))
        .route("/notes/reactions/create", post(reactions::create_reaction))
        .route("/i", get(account::me))
        .route("/i/read-all-unread-notes", post(account::read_all_unread_notes))
        .route("/i/notifications", get(account::notifications))
        .route("/notifications/mark-all-as-read", post(account::mark_all_notifications_read))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let ws_route = Router::new().route("/streaming", get(ws_upgrade));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}
