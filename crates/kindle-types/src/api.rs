use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::EntropySource;

// -- JWT Claims --

/// Bearer token claims. Tokens are minted by the identity service; this
/// workspace only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// -- Entropy --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub bytes: usize,
}

/// A single issued entropy value, hardware or software sourced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedEntropy {
    pub source: EntropySource,
    pub entropy_hex: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntropyStats {
    pub total: u64,
    pub unconsumed: u64,
    pub fresh: u64,
    pub window_secs: u64,
}

// -- Messages --

/// A message envelope as posted by a client. The base64 fields are stored
/// verbatim; the server never sees plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreMessageRequest {
    pub room_id: Uuid,
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
    pub entropy_hex: String,
    pub source: EntropySource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub room_id: Uuid,
    pub author_id: Uuid,
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
    pub entropy_hex: String,
    pub source: EntropySource,
    pub created_at: DateTime<Utc>,
}

// -- Files --

/// Unencrypted file metadata. The ciphertext itself is uploaded separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFileRequest {
    pub iv: String,
    pub salt: String,
    pub entropy_hex: String,
    pub source: EntropySource,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub iv: String,
    pub salt: String,
    pub entropy_hex: String,
    pub source: EntropySource,
    pub mime_type: String,
    pub size: u64,
    pub uploaded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}
