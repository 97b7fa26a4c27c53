use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (entropy log)");
        conn.execute_batch(
            "
            CREATE TABLE entropy_log (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                hex_digest  TEXT NOT NULL UNIQUE,
                source      TEXT NOT NULL DEFAULT 'hardware',
                consumed    INTEGER NOT NULL DEFAULT 0,
                created_at  INTEGER NOT NULL,
                consumed_at INTEGER
            );

            CREATE INDEX idx_entropy_unconsumed
                ON entropy_log(consumed, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (envelope records)");
        conn.execute_batch(
            "
            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                room_id     TEXT NOT NULL,
                author_id   TEXT NOT NULL,
                ciphertext  TEXT NOT NULL,
                iv          TEXT NOT NULL,
                salt        TEXT NOT NULL,
                entropy_hex TEXT NOT NULL,
                source      TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_messages_room
                ON messages(room_id, created_at);

            CREATE TABLE files (
                id          TEXT PRIMARY KEY,
                uploader_id TEXT NOT NULL,
                iv          TEXT NOT NULL,
                salt        TEXT NOT NULL,
                entropy_hex TEXT NOT NULL,
                source      TEXT NOT NULL,
                mime_type   TEXT NOT NULL,
                size        INTEGER NOT NULL,
                uploaded    INTEGER NOT NULL DEFAULT 0,
                created_at  INTEGER NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
