//! Database row types. These map directly to SQLite rows and are kept
//! separate from the kindle-types API models so this crate stays independent.
//! Timestamps are Unix milliseconds.

#[derive(Debug, Clone)]
pub struct EntropyRow {
    pub id: i64,
    pub hex_digest: String,
    pub source: String,
    pub consumed: bool,
    pub created_at: i64,
    pub consumed_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntropyCounts {
    pub total: u64,
    pub unconsumed: u64,
    pub fresh: u64,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub room_id: String,
    pub author_id: String,
    pub ciphertext: String,
    pub iv: String,
    pub salt: String,
    pub entropy_hex: String,
    pub source: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: String,
    pub uploader_id: String,
    pub iv: String,
    pub salt: String,
    pub entropy_hex: String,
    pub source: String,
    pub mime_type: String,
    pub size: i64,
    pub uploaded: bool,
    pub created_at: i64,
}
