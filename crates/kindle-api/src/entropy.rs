//! Entropy ingestion and issuance.
//!
//! Hardware samples arrive on the unauthenticated ingest route and are
//! appended to the entropy log. Each sample can be issued exactly once, and
//! only while it is younger than the freshness window; when nothing
//! qualifies, the issuer answers with software entropy from the OS CSPRNG
//! and leaves the log untouched.

use std::time::Duration;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use kindle_crypto::keys::{ENTROPY_LEN, entropy_to_hex, generate_software_entropy, is_degenerate};
use kindle_db::{Database, InsertOutcome};
use kindle_types::api::{EntropyStats, IngestResponse, IssuedEntropy};
use kindle_types::models::{EntropySample, EntropySource};

use crate::error::ApiError;

/// Ingest bodies are 32 bytes; anything far beyond that is refused before
/// it is buffered.
pub const MAX_INGEST_BODY: usize = 4 * 1024;
use crate::state::{AppState, millis_to_utc};

/// Validate and store one hardware submission.
pub fn ingest(db: &Database, payload: &[u8], now: DateTime<Utc>) -> Result<IngestResponse, ApiError> {
    if payload.len() != ENTROPY_LEN {
        return Err(ApiError::InvalidEntropySize {
            expected: ENTROPY_LEN,
            actual: payload.len(),
        });
    }
    if is_degenerate(payload) {
        return Err(ApiError::DegenerateEntropy);
    }

    let digest = entropy_to_hex(payload);
    let unavailable = |e: anyhow::Error| ApiError::EntropyUnavailable(e.to_string());

    if db.entropy_exists(&digest).map_err(unavailable)? {
        return Err(ApiError::ReplayedEntropy);
    }

    // A concurrent submission of the same value can still race past the
    // check above; the UNIQUE constraint catches it.
    match db.insert_entropy(&digest, now.timestamp_millis()).map_err(unavailable)? {
        InsertOutcome::Inserted(created_at) => {
            info!("Accepted hardware entropy {}… at {}", &digest[..8], created_at);
            Ok(IngestResponse {
                success: true,
                bytes: payload.len(),
            })
        }
        InsertOutcome::Duplicate => Err(ApiError::ReplayedEntropy),
    }
}

/// Hand out the newest fresh hardware sample, consuming it, or synthesize
/// software entropy if none is eligible.
pub fn issue(db: &Database, window: Duration, now: DateTime<Utc>) -> Result<IssuedEntropy, ApiError> {
    let now_ms = now.timestamp_millis();
    let not_before = now_ms.saturating_sub(window.as_millis() as i64);

    let claimed = db
        .claim_fresh_entropy(now_ms, not_before)
        .map_err(|e| ApiError::EntropyUnavailable(e.to_string()))?;

    match claimed {
        Some(row) => {
            info!("Issued hardware entropy {}…", &row.hex_digest[..8.min(row.hex_digest.len())]);
            Ok(IssuedEntropy {
                source: EntropySource::Hardware,
                entropy_hex: row.hex_digest,
                timestamp: millis_to_utc(row.created_at),
            })
        }
        None => {
            debug!("No fresh hardware entropy, issuing software entropy");
            Ok(software_entropy(now))
        }
    }
}

pub fn software_entropy(now: DateTime<Utc>) -> IssuedEntropy {
    IssuedEntropy {
        source: EntropySource::Software,
        entropy_hex: entropy_to_hex(&generate_software_entropy()),
        timestamp: now,
    }
}

pub fn stats(db: &Database, window: Duration, now: DateTime<Utc>) -> Result<EntropyStats, ApiError> {
    let not_before = now.timestamp_millis().saturating_sub(window.as_millis() as i64);
    let counts = db
        .entropy_counts(not_before)
        .map_err(|e| ApiError::EntropyUnavailable(e.to_string()))?;

    Ok(EntropyStats {
        total: counts.total,
        unconsumed: counts.unconsumed,
        fresh: counts.fresh,
        window_secs: window.as_secs(),
    })
}

/// Audit view of one log entry.
pub fn lookup(db: &Database, hex_digest: &str) -> Result<EntropySample, ApiError> {
    let row = db
        .get_entropy(&hex_digest.to_ascii_lowercase())
        .map_err(|e| ApiError::EntropyUnavailable(e.to_string()))?
        .ok_or(ApiError::NotFound("entropy sample"))?;

    Ok(EntropySample {
        source: row
            .source
            .parse()
            .map_err(|e: String| ApiError::Internal(format!("entropy row {}: {}", row.id, e)))?,
        consumed: row.consumed,
        created_at: millis_to_utc(row.created_at),
        consumed_at: row.consumed_at.map(millis_to_utc),
        hex_digest: row.hex_digest,
    })
}

/// Bodies past [`MAX_INGEST_BODY`] are cut off before buffering. They are
/// still a size mismatch and get the same error as any other wrong length.
fn oversized_body(headers: &HeaderMap, rejection: BytesRejection) -> ApiError {
    if rejection.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::BadRequest(rejection.body_text());
    }
    let actual = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(MAX_INGEST_BODY + 1);
    ApiError::InvalidEntropySize {
        expected: ENTROPY_LEN,
        actual,
    }
}

// -- Handlers --

/// POST /entropy: raw 32-byte body from the hardware peer, no auth.
pub async fn ingest_entropy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let body = body.map_err(|rejection| oversized_body(&headers, rejection))?;
    let response = tokio::task::spawn_blocking(move || ingest(&state.db, &body, Utc::now()))
        .await
        .map_err(ApiError::join)??;

    Ok(Json(response))
}

/// GET /entropy/fresh: one issued value per call.
pub async fn issue_entropy(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let window = state.freshness_window;
    let issued = tokio::task::spawn_blocking(move || issue(&state.db, window, Utc::now()))
        .await
        .map_err(ApiError::join)??;

    Ok(Json(issued))
}

/// GET /entropy/stats
pub async fn entropy_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let window = state.freshness_window;
    let stats = tokio::task::spawn_blocking(move || stats(&state.db, window, Utc::now()))
        .await
        .map_err(ApiError::join)??;

    Ok(Json(stats))
}

/// GET /entropy/log/{hex_digest}
pub async fn entropy_log_entry(
    State(state): State<AppState>,
    Path(hex_digest): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let sample = tokio::task::spawn_blocking(move || lookup(&state.db, &hex_digest))
        .await
        .map_err(ApiError::join)??;

    Ok(Json(sample))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(45);

    fn counting_bytes() -> Vec<u8> {
        (0x01..=0x20).collect()
    }

    #[test]
    fn wrong_sizes_rejected() {
        let db = Database::open_in_memory().unwrap();
        for len in [0usize, 1, 16, 31, 33, 64, 1024] {
            let payload = vec![0x5A; len];
            match ingest(&db, &payload, Utc::now()) {
                Err(ApiError::InvalidEntropySize { expected: 32, actual }) => assert_eq!(actual, len),
                other => panic!("len {}: unexpected {:?}", len, other),
            }
        }
    }

    #[test]
    fn degenerate_payloads_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(ingest(&db, &[0x00; 32], Utc::now()), Err(ApiError::DegenerateEntropy)));
        assert!(matches!(ingest(&db, &[0xFF; 32], Utc::now()), Err(ApiError::DegenerateEntropy)));
    }

    #[test]
    fn second_ingest_is_replay() {
        let db = Database::open_in_memory().unwrap();
        for seed in [0x11u8, 0x42, 0x99] {
            let payload: Vec<u8> = (0..32).map(|i| seed.wrapping_add(i)).collect();
            assert!(ingest(&db, &payload, Utc::now()).unwrap().success);
            assert!(matches!(ingest(&db, &payload, Utc::now()), Err(ApiError::ReplayedEntropy)));
        }
    }

    #[test]
    fn replay_rejected_even_after_consumption() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        ingest(&db, &counting_bytes(), now).unwrap();
        issue(&db, WINDOW, now).unwrap();

        assert!(matches!(ingest(&db, &counting_bytes(), now), Err(ApiError::ReplayedEntropy)));
    }

    #[test]
    fn end_to_end_scenario() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();

        assert!(matches!(ingest(&db, &[0u8; 32], now), Err(ApiError::DegenerateEntropy)));

        let accepted = ingest(&db, &counting_bytes(), now).unwrap();
        assert!(accepted.success);
        assert_eq!(accepted.bytes, 32);

        assert!(matches!(ingest(&db, &counting_bytes(), now), Err(ApiError::ReplayedEntropy)));

        let issued = issue(&db, WINDOW, now + chrono::Duration::seconds(1)).unwrap();
        assert_eq!(issued.source, EntropySource::Hardware);
        assert_eq!(issued.entropy_hex, hex_of(&counting_bytes()));
        assert!(db.get_entropy(&issued.entropy_hex).unwrap().unwrap().consumed);

        let again = issue(&db, WINDOW, now + chrono::Duration::seconds(2)).unwrap();
        assert_eq!(again.source, EntropySource::Software);
        assert_ne!(again.entropy_hex, issued.entropy_hex);
    }

    #[test]
    fn stale_samples_fall_back_to_software() {
        let db = Database::open_in_memory().unwrap();
        let then = Utc::now();
        ingest(&db, &counting_bytes(), then).unwrap();

        let later = then + chrono::Duration::seconds(WINDOW.as_secs() as i64 + 1);
        let a = issue(&db, WINDOW, later).unwrap();
        let b = issue(&db, WINDOW, later).unwrap();

        assert_eq!(a.source, EntropySource::Software);
        assert_eq!(b.source, EntropySource::Software);
        assert_eq!(a.entropy_hex.len(), 64);
        assert_ne!(a.entropy_hex, b.entropy_hex);
        assert_eq!(a.timestamp, later);

        // The stale sample was never consumed
        assert!(!db.get_entropy(&hex_of(&counting_bytes())).unwrap().unwrap().consumed);
    }

    #[test]
    fn newest_sample_is_issued_first() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let older: Vec<u8> = (0x40..0x60).collect();
        ingest(&db, &older, now).unwrap();
        ingest(&db, &counting_bytes(), now + chrono::Duration::milliseconds(5)).unwrap();

        let first = issue(&db, WINDOW, now + chrono::Duration::seconds(1)).unwrap();
        assert_eq!(first.entropy_hex, hex_of(&counting_bytes()));
        let second = issue(&db, WINDOW, now + chrono::Duration::seconds(1)).unwrap();
        assert_eq!(second.entropy_hex, hex_of(&older));
    }

    #[test]
    fn stats_track_the_log() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        ingest(&db, &counting_bytes(), now).unwrap();

        let before = stats(&db, WINDOW, now).unwrap();
        assert_eq!((before.total, before.unconsumed, before.fresh), (1, 1, 1));
        assert_eq!(before.window_secs, 45);

        issue(&db, WINDOW, now).unwrap();
        let after = stats(&db, WINDOW, now).unwrap();
        assert_eq!((after.total, after.unconsumed, after.fresh), (1, 0, 0));
    }

    #[test]
    fn lookup_reflects_consumption() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        ingest(&db, &counting_bytes(), now).unwrap();

        let digest = hex_of(&counting_bytes());
        let before = lookup(&db, &digest).unwrap();
        assert_eq!(before.source, EntropySource::Hardware);
        assert!(!before.consumed);
        assert!(before.consumed_at.is_none());

        issue(&db, WINDOW, now).unwrap();
        let after = lookup(&db, &digest.to_uppercase()).unwrap();
        assert!(after.consumed);
        assert!(after.consumed_at.is_some());
        assert_eq!(after.created_at, before.created_at);

        assert!(matches!(lookup(&db, &"ee".repeat(32)), Err(ApiError::NotFound(_))));
    }

    fn hex_of(bytes: &[u8]) -> String {
        entropy_to_hex(bytes)
    }
}
