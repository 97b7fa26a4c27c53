use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use kindle_db::Database;

use crate::objects::ObjectStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub objects: ObjectStore,
    pub jwt_secret: String,
    /// Maximum age of a hardware sample that may still be issued.
    pub freshness_window: Duration,
    /// Upper bound on an uploaded file body, ciphertext included.
    pub max_file_bytes: usize,
}

/// Convert a stored Unix-millisecond timestamp back to UTC.
pub(crate) fn millis_to_utc(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(|| {
        warn!("Corrupt timestamp {} in store", ms);
        DateTime::<Utc>::default()
    })
}
