use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{error, warn};

use quill_db::Database;
use quill_gateway::dispatcher::Dispatcher;
use quill_gateway::gate::StreamEventGate;
use quill_types::api::PageQuery;
use quill_visibility::{
    ContentQueryFilter, MuteRelationStore, UnreadStateAggregator, VisibilityError, VisibilityFilter,
};

const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 100;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub mutes: Arc<MuteRelationStore>,
    pub queries: ContentQueryFilter,
    pub unread: UnreadStateAggregator,
    pub dispatcher: Dispatcher,
}

impl AppStateInner {
    /// Wire every component around one shared visibility filter.
    pub fn new(db: Database, jwt_secret: String) -> AppState {
        let db = Arc::new(db);
        let mutes = Arc::new(MuteRelationStore::new(db.clone()));
        let visibility = VisibilityFilter::new(db.clone(), mutes.clone());

        Arc::new(Self {
            queries: ContentQueryFilter::new(db.clone(), visibility.clone()),
            unread: UnreadStateAggregator::new(db.clone(), visibility.clone()),
            dispatcher: Dispatcher::new(StreamEventGate::new(visibility)),
            mutes,
            db,
            jwt_secret,
        })
    }
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&AppStateInner) -> Result<T, StatusCode> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
}

pub(crate) fn internal(e: anyhow::Error) -> StatusCode {
    error!("database error: {:#}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Visibility could not be decided; the client should retry.
pub(crate) fn unavailable(e: VisibilityError) -> StatusCode {
    warn!("visibility check failed: {}", e);
    StatusCode::SERVICE_UNAVAILABLE
}

pub(crate) fn page_limit(query: &PageQuery) -> u32 {
    query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}
