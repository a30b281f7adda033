use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            username    TEXT NOT NULL,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id          TEXT PRIMARY KEY,
            owner_id    TEXT NOT NULL REFERENCES users(id),
            title       TEXT NOT NULL,
            completed   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_owner
            ON tasks(owner_id);

        -- Revocation ledger: one row per explicitly logged-out token.
        -- created_at is a unix timestamp; rows older than the token
        -- lifetime are dead weight and get swept lazily on writes.
        CREATE TABLE IF NOT EXISTS revoked_tokens (
            token       TEXT PRIMARY KEY,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_revoked_created
            ON revoked_tokens(created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
