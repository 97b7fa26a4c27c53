use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use kindle_crypto::EncryptedEnvelope;
use kindle_crypto::keys::entropy_from_hex;
use kindle_db::models::MessageRow;
use kindle_types::api::{Claims, CreatedResponse, MessageRecord, StoreMessageRequest};

use crate::error::ApiError;
use crate::state::{AppState, millis_to_utc};

/// POST /messages: store a sealed message verbatim.
///
/// The envelope fields are only checked for shape; the server cannot and
/// does not decrypt.
pub async fn store_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StoreMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let envelope = EncryptedEnvelope {
        ciphertext: req.ciphertext,
        iv: req.iv,
        salt: req.salt,
    };
    envelope.validate()?;
    entropy_from_hex(&req.entropy_hex)?;

    let message_id = Uuid::new_v4();
    let row = MessageRow {
        id: message_id.to_string(),
        room_id: req.room_id.to_string(),
        author_id: claims.sub.to_string(),
        ciphertext: envelope.ciphertext,
        iv: envelope.iv,
        salt: envelope.salt,
        entropy_hex: req.entropy_hex,
        source: req.source.to_string(),
        created_at: Utc::now().timestamp_millis(),
    };

    tokio::task::spawn_blocking(move || state.db.insert_message(&row))
        .await
        .map_err(ApiError::join)?
        .map_err(ApiError::db)?;

    info!("Stored message {} from {}", message_id, claims.username);
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: message_id })))
}

/// GET /messages/{message_id}
pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = message_id.to_string();
    let row = tokio::task::spawn_blocking(move || state.db.get_message(&id))
        .await
        .map_err(ApiError::join)?
        .map_err(ApiError::db)?
        .ok_or(ApiError::NotFound("message"))?;

    Ok(Json(message_record(row)?))
}

fn message_record(row: MessageRow) -> Result<MessageRecord, ApiError> {
    let corrupt = |field: &str, value: &str| {
        warn!("Corrupt {} '{}' on message '{}'", field, value, row.id);
        ApiError::Internal(format!("corrupt message row {}", row.id))
    };

    Ok(MessageRecord {
        id: row.id.parse().map_err(|_| corrupt("id", &row.id))?,
        room_id: row.room_id.parse().map_err(|_| corrupt("room_id", &row.room_id))?,
        author_id: row.author_id.parse().map_err(|_| corrupt("author_id", &row.author_id))?,
        source: row.source.parse().map_err(|_| corrupt("source", &row.source))?,
        created_at: millis_to_utc(row.created_at),
        ciphertext: row.ciphertext.clone(),
        iv: row.iv.clone(),
        salt: row.salt.clone(),
        entropy_hex: row.entropy_hex.clone(),
    })
}
