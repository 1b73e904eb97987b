use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            username        TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password        TEXT NOT NULL,
            birthday        TEXT NOT NULL,
            underage        INTEGER NOT NULL,
            -- JSON array of freet ids, mirrors the upvotes table
            upvoted_freets  TEXT NOT NULL DEFAULT '[]',
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS freets (
            id              TEXT PRIMARY KEY,
            author_id       TEXT NOT NULL REFERENCES users(id),
            content         TEXT NOT NULL,
            self_flagged    INTEGER NOT NULL DEFAULT 0,
            -- JSON array of flag reasons
            flags           TEXT NOT NULL DEFAULT '[]',
            created_at      TEXT NOT NULL,
            modified_at     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_freets_author
            ON freets(author_id);

        CREATE INDEX IF NOT EXISTS idx_freets_modified
            ON freets(modified_at);

        CREATE TABLE IF NOT EXISTS upvotes (
            id          TEXT PRIMARY KEY,
            author_id   TEXT NOT NULL REFERENCES users(id),
            freet_id    TEXT NOT NULL REFERENCES freets(id),
            created_at  TEXT NOT NULL,
            UNIQUE(author_id, freet_id)
        );

        CREATE INDEX IF NOT EXISTS idx_upvotes_freet
            ON upvotes(freet_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
