use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use serde_json::{Value, json};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{entropy, files, messages};

/// Assemble every route. Tracing and CORS layers are added by the binary.
pub fn router(state: AppState) -> Router {
    // Hardware peer cannot log in; ingestion is open
    let public_routes = Router::new()
        .route("/health", get(health))
        .route(
            "/entropy",
            post(entropy::ingest_entropy).layer(DefaultBodyLimit::max(entropy::MAX_INGEST_BODY)),
        )
        .with_state(state.clone());

    let upload_limit = DefaultBodyLimit::max(state.max_file_bytes);

    let protected_routes = Router::new()
        .route("/entropy/fresh", get(entropy::issue_entropy))
        .route("/entropy/stats", get(entropy::entropy_stats))
        .route("/entropy/log/{hex_digest}", get(entropy::entropy_log_entry))
        .route("/messages", post(messages::store_message))
        .route("/messages/{message_id}", get(messages::get_message))
        .route("/files", post(files::create_file))
        .route("/files/{file_id}", get(files::get_file))
        .route(
            "/files/{file_id}/data",
            put(files::upload_file_data)
                .layer(upload_limit)
                .get(files::download_file_data),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
