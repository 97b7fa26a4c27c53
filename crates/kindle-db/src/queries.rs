use crate::Database;
use crate::models::{EntropyCounts, EntropyRow, FileRow, MessageRow};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row};
use tracing::debug;

const ENTROPY_COLUMNS: &str = "id, hex_digest, source, consumed, created_at, consumed_at";

/// Result of an entropy insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored; carries the persisted `created_at` (ms).
    Inserted(i64),
    /// A row with the same digest already exists.
    Duplicate,
}

impl Database {
    // -- Entropy log --

    pub fn entropy_exists(&self, hex_digest: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: i64 = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM entropy_log WHERE hex_digest = ?1)",
                [hex_digest],
                |row| row.get(0),
            )?;
            Ok(found != 0)
        })
    }

    /// Append a hardware sample. `created_at` is clamped so it never sorts
    /// before the newest existing row.
    pub fn insert_entropy(&self, hex_digest: &str, now_ms: i64) -> Result<InsertOutcome> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "INSERT INTO entropy_log (hex_digest, source, consumed, created_at)
                 VALUES (?1, 'hardware', 0,
                         MAX(?2, COALESCE((SELECT MAX(created_at) FROM entropy_log), 0)))
                 RETURNING created_at",
                rusqlite::params![hex_digest, now_ms],
                |row| row.get::<_, i64>(0),
            );

            match result {
                Ok(created_at) => Ok(InsertOutcome::Inserted(created_at)),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(InsertOutcome::Duplicate)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Atomically claim the newest unconsumed hardware sample created at or
    /// after `not_before_ms`, marking it consumed in the same statement.
    pub fn claim_fresh_entropy(&self, now_ms: i64, not_before_ms: i64) -> Result<Option<EntropyRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE entropy_log
                    SET consumed = 1, consumed_at = ?1
                  WHERE id = (
                        SELECT id FROM entropy_log
                         WHERE consumed = 0
                           AND source = 'hardware'
                           AND created_at >= ?2
                         ORDER BY created_at DESC, id DESC
                         LIMIT 1)
                    AND consumed = 0
                RETURNING {}",
                ENTROPY_COLUMNS
            );
            let row = conn
                .query_row(&sql, rusqlite::params![now_ms, not_before_ms], entropy_from_row)
                .optional()?;

            if let Some(r) = &row {
                debug!("Claimed entropy row {}", r.id);
            }
            Ok(row)
        })
    }

    pub fn get_entropy(&self, hex_digest: &str) -> Result<Option<EntropyRow>> {
        self.with_conn(|conn| query_entropy(conn, hex_digest))
    }

    pub fn entropy_counts(&self, not_before_ms: i64) -> Result<EntropyCounts> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(consumed = 0), 0),
                        COALESCE(SUM(consumed = 0 AND created_at >= ?1), 0)
                   FROM entropy_log",
                [not_before_ms],
                |row| {
                    Ok(EntropyCounts {
                        total: row.get::<_, i64>(0)? as u64,
                        unconsumed: row.get::<_, i64>(1)? as u64,
                        fresh: row.get::<_, i64>(2)? as u64,
                    })
                },
            )?;
            Ok(counts)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, room_id, author_id, ciphertext, iv, salt, entropy_hex, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    row.id,
                    row.room_id,
                    row.author_id,
                    row.ciphertext,
                    row.iv,
                    row.salt,
                    row.entropy_hex,
                    row.source,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, room_id, author_id, ciphertext, iv, salt, entropy_hex, source, created_at
                       FROM messages WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(MessageRow {
                            id: row.get(0)?,
                            room_id: row.get(1)?,
                            author_id: row.get(2)?,
                            ciphertext: row.get(3)?,
                            iv: row.get(4)?,
                            salt: row.get(5)?,
                            entropy_hex: row.get(6)?,
                            source: row.get(7)?,
                            created_at: row.get(8)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Files --

    pub fn insert_file(&self, row: &FileRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO files (id, uploader_id, iv, salt, entropy_hex, source, mime_type, size, uploaded, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    row.id,
                    row.uploader_id,
                    row.iv,
                    row.salt,
                    row.entropy_hex,
                    row.source,
                    row.mime_type,
                    row.size,
                    row.uploaded,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_file(&self, id: &str) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, uploader_id, iv, salt, entropy_hex, source, mime_type, size, uploaded, created_at
                       FROM files WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(FileRow {
                            id: row.get(0)?,
                            uploader_id: row.get(1)?,
                            iv: row.get(2)?,
                            salt: row.get(3)?,
                            entropy_hex: row.get(4)?,
                            source: row.get(5)?,
                            mime_type: row.get(6)?,
                            size: row.get(7)?,
                            uploaded: row.get(8)?,
                            created_at: row.get(9)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Flip `uploaded` from 0 to 1. Returns false if the row is missing or
    /// another upload already holds it, so at most one caller ever wins.
    pub fn claim_file_upload(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE files SET uploaded = 1 WHERE id = ?1 AND uploaded = 0",
                [id],
            )?;
            Ok(changed == 1)
        })
    }

    /// Undo a claim whose object write failed.
    pub fn release_file_upload(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE files SET uploaded = 0 WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}

fn query_entropy(conn: &Connection, hex_digest: &str) -> Result<Option<EntropyRow>> {
    let sql = format!(
        "SELECT {} FROM entropy_log WHERE hex_digest = ?1",
        ENTROPY_COLUMNS
    );
    let row = conn.query_row(&sql, [hex_digest], entropy_from_row).optional()?;
    Ok(row)
}

fn entropy_from_row(row: &Row<'_>) -> rusqlite::Result<EntropyRow> {
    Ok(EntropyRow {
        id: row.get(0)?,
        hex_digest: row.get(1)?,
        source: row.get(2)?,
        consumed: row.get(3)?,
        created_at: row.get(4)?,
        consumed_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn digest(n: u8) -> String {
        format!("{:02x}", n).repeat(32)
    }

    #[test]
    fn duplicate_digest_is_reported_not_stored() {
        let db = Database::open_in_memory().unwrap();

        assert!(matches!(db.insert_entropy(&digest(1), 10).unwrap(), InsertOutcome::Inserted(10)));
        assert_eq!(db.insert_entropy(&digest(1), 20).unwrap(), InsertOutcome::Duplicate);
        assert_eq!(db.entropy_counts(0).unwrap().total, 1);
    }

    #[test]
    fn created_at_never_goes_backwards() {
        let db = Database::open_in_memory().unwrap();

        db.insert_entropy(&digest(1), 5_000).unwrap();
        // Wall clock stepped back
        let outcome = db.insert_entropy(&digest(2), 4_000).unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted(5_000));
    }

    #[test]
    fn claim_takes_newest_fresh_sample_once() {
        let db = Database::open_in_memory().unwrap();
        db.insert_entropy(&digest(1), 1_000).unwrap();
        db.insert_entropy(&digest(2), 2_000).unwrap();

        let first = db.claim_fresh_entropy(3_000, 0).unwrap().unwrap();
        assert_eq!(first.hex_digest, digest(2));
        assert!(first.consumed);
        assert_eq!(first.consumed_at, Some(3_000));

        let second = db.claim_fresh_entropy(3_000, 0).unwrap().unwrap();
        assert_eq!(second.hex_digest, digest(1));

        assert!(db.claim_fresh_entropy(3_000, 0).unwrap().is_none());
    }

    #[test]
    fn claim_ignores_stale_samples() {
        let db = Database::open_in_memory().unwrap();
        db.insert_entropy(&digest(1), 1_000).unwrap();

        assert!(db.claim_fresh_entropy(100_000, 60_000).unwrap().is_none());
        let row = db.get_entropy(&digest(1)).unwrap().unwrap();
        assert!(!row.consumed);
    }

    #[test]
    fn concurrent_claims_never_share_a_sample() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        for n in 0..8 {
            db.insert_entropy(&digest(n), 1_000 + n as i64).unwrap();
        }

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let db = db.clone();
                thread::spawn(move || db.claim_fresh_entropy(2_000, 0).unwrap())
            })
            .collect();

        let mut claimed: Vec<String> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .map(|r| r.hex_digest)
            .collect();

        assert_eq!(claimed.len(), 8);
        claimed.sort();
        claimed.dedup();
        assert_eq!(claimed.len(), 8);
    }

    #[test]
    fn counts_split_fresh_and_consumed() {
        let db = Database::open_in_memory().unwrap();
        db.insert_entropy(&digest(1), 1_000).unwrap();
        db.insert_entropy(&digest(2), 50_000).unwrap();
        db.insert_entropy(&digest(3), 60_000).unwrap();
        db.claim_fresh_entropy(61_000, 40_000).unwrap();

        let counts = db.entropy_counts(40_000).unwrap();
        assert_eq!(counts, EntropyCounts { total: 3, unconsumed: 2, fresh: 1 });
    }

    #[test]
    fn file_upload_flag() {
        let db = Database::open_in_memory().unwrap();
        let row = FileRow {
            id: "f1".into(),
            uploader_id: "u1".into(),
            iv: "aXY=".into(),
            salt: "c2FsdA==".into(),
            entropy_hex: digest(9),
            source: "hardware".into(),
            mime_type: "image/png".into(),
            size: 10,
            uploaded: false,
            created_at: 1,
        };
        db.insert_file(&row).unwrap();
        assert!(db.claim_file_upload("f1").unwrap());
        assert!(db.get_file("f1").unwrap().unwrap().uploaded);
        assert!(!db.claim_file_upload("f1").unwrap());
        assert!(!db.claim_file_upload("missing").unwrap());

        db.release_file_upload("f1").unwrap();
        assert!(!db.get_file("f1").unwrap().unwrap().uploaded);
        assert!(db.claim_file_upload("f1").unwrap());
    }

    #[test]
    fn concurrent_upload_claims_have_one_winner() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_file(&FileRow {
            id: "f2".into(),
            uploader_id: "u1".into(),
            iv: "aXY=".into(),
            salt: "c2FsdA==".into(),
            entropy_hex: digest(10),
            source: "software".into(),
            mime_type: "text/plain".into(),
            size: 4,
            uploaded: false,
            created_at: 1,
        })
        .unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let db = db.clone();
                thread::spawn(move || db.claim_file_upload("f2").unwrap())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
