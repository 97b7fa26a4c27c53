use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use kindle_crypto::EncryptedEnvelope;
use kindle_crypto::envelope::TAG_LEN;
use kindle_crypto::keys::entropy_from_hex;
use kindle_db::models::FileRow;
use kindle_types::api::{Claims, CreateFileRequest, CreatedResponse, FileRecord};

use crate::error::ApiError;
use crate::state::{AppState, millis_to_utc};

/// POST /files: register the clear metadata of an encrypted file.
/// The ciphertext is uploaded afterwards with `PUT /files/{id}/data`.
pub async fn create_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Only iv and salt exist at this point; check their encoding.
    let probe = EncryptedEnvelope {
        ciphertext: String::new(),
        iv: req.iv,
        salt: req.salt,
    };
    probe.iv_bytes()?;
    probe.salt_bytes()?;
    entropy_from_hex(&req.entropy_hex)?;

    if req.size.saturating_add(TAG_LEN as u64) > state.max_file_bytes as u64 {
        return Err(ApiError::BadRequest(format!(
            "file of {} bytes exceeds the {} byte limit",
            req.size, state.max_file_bytes
        )));
    }
    if req.mime_type.is_empty() || req.mime_type.len() > 255 {
        return Err(ApiError::BadRequest("invalid mime_type".into()));
    }

    let file_id = Uuid::new_v4();
    let row = FileRow {
        id: file_id.to_string(),
        uploader_id: claims.sub.to_string(),
        iv: probe.iv,
        salt: probe.salt,
        entropy_hex: req.entropy_hex,
        source: req.source.to_string(),
        mime_type: req.mime_type,
        size: req.size as i64,
        uploaded: false,
        created_at: Utc::now().timestamp_millis(),
    };

    tokio::task::spawn_blocking(move || state.db.insert_file(&row))
        .await
        .map_err(ApiError::join)?
        .map_err(ApiError::db)?;

    info!("File {} registered by {}", file_id, claims.username);
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: file_id })))
}

/// PUT /files/{file_id}/data: raw ciphertext (tag included), uploader only,
/// once.
pub async fn upload_file_data(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let row = load_file(&state, file_id).await?;

    if row.uploader_id != claims.sub.to_string() {
        return Err(ApiError::Forbidden);
    }
    if row.uploaded {
        return Err(ApiError::Conflict(format!("file {} already uploaded", file_id)));
    }

    let expected = row.size as usize + TAG_LEN;
    if body.len() != expected {
        return Err(ApiError::BadRequest(format!(
            "expected {} ciphertext bytes, got {}",
            expected,
            body.len()
        )));
    }

    // The flag is taken before any bytes hit the disk; a racing PUT loses here.
    let db_state = state.clone();
    let id = file_id.to_string();
    let claimed = tokio::task::spawn_blocking(move || db_state.db.claim_file_upload(&id))
        .await
        .map_err(ApiError::join)?
        .map_err(ApiError::db)?;
    if !claimed {
        return Err(ApiError::Conflict(format!("file {} already uploaded", file_id)));
    }

    if let Err(e) = state.objects.put(&file_id, &body).await {
        let db_state = state.clone();
        let id = file_id.to_string();
        let released = tokio::task::spawn_blocking(move || db_state.db.release_file_upload(&id))
            .await
            .map_err(ApiError::join)?;
        if let Err(release) = released {
            error!("Failed to release upload claim on {}: {}", file_id, release);
        }
        return Err(ApiError::Internal(format!("object store write: {}", e)));
    }

    info!("File {} uploaded ({} bytes)", file_id, body.len());
    Ok(StatusCode::NO_CONTENT)
}

/// GET /files/{file_id}
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load_file(&state, file_id).await?;
    Ok(Json(file_record(row)?))
}

/// GET /files/{file_id}/data: the stored ciphertext.
pub async fn download_file_data(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load_file(&state, file_id).await?;
    if !row.uploaded {
        return Err(ApiError::NotFound("file data"));
    }

    let bytes = state
        .objects
        .get(&file_id)
        .await
        .map_err(|e| ApiError::Internal(format!("object store read: {}", e)))?
        .ok_or(ApiError::NotFound("file data"))?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}

async fn load_file(state: &AppState, file_id: Uuid) -> Result<FileRow, ApiError> {
    let db_state = state.clone();
    let id = file_id.to_string();
    tokio::task::spawn_blocking(move || db_state.db.get_file(&id))
        .await
        .map_err(ApiError::join)?
        .map_err(ApiError::db)?
        .ok_or(ApiError::NotFound("file"))
}

fn file_record(row: FileRow) -> Result<FileRecord, ApiError> {
    let corrupt = |field: &str| ApiError::Internal(format!("corrupt {} on file row {}", field, row.id));

    Ok(FileRecord {
        id: row.id.parse().map_err(|_| corrupt("id"))?,
        uploader_id: row.uploader_id.parse().map_err(|_| corrupt("uploader_id"))?,
        source: row.source.parse().map_err(|_| corrupt("source"))?,
        size: row.size as u64,
        uploaded: row.uploaded,
        created_at: millis_to_utc(row.created_at),
        iv: row.iv.clone(),
        salt: row.salt.clone(),
        entropy_hex: row.entropy_hex.clone(),
        mime_type: row.mime_type.clone(),
    })
}
