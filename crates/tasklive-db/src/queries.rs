use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::models::{TaskRow, UserRow};
use crate::{Database, Result, StoreError};

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, username, password) VALUES (?1, ?2, ?3, ?4)",
                (id, email, username, password_hash),
            )
            .map_err(map_unique)?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    // -- Tasks --

    pub fn insert_task(&self, id: &str, owner_id: &str, title: &str, completed: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, owner_id, title, completed) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, owner_id, title, completed],
            )?;
            Ok(())
        })
    }

    pub fn list_tasks(&self, owner_id: &str) -> Result<Vec<TaskRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner_id, title, completed, created_at
                 FROM tasks
                 WHERE owner_id = ?1
                 ORDER BY created_at, id",
            )?;

            let rows = stmt
                .query_map([owner_id], task_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Partial update: `None` fields keep their current values. Returns the
    /// updated row, or `None` when the id doesn't exist for this owner.
    pub fn update_task(
        &self,
        id: &str,
        owner_id: &str,
        title: Option<&str>,
        completed: Option<bool>,
    ) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| {
            let Some(existing) = query_task(conn, id, owner_id)? else {
                return Ok(None);
            };

            let title = title.unwrap_or(existing.title.as_str());
            let completed = completed.unwrap_or(existing.completed);

            conn.execute(
                "UPDATE tasks SET title = ?1, completed = ?2 WHERE id = ?3 AND owner_id = ?4",
                rusqlite::params![title, completed, id, owner_id],
            )?;

            query_task(conn, id, owner_id)
        })
    }

    /// Returns false when the id doesn't exist for this owner.
    pub fn delete_task(&self, id: &str, owner_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tasks WHERE id = ?1 AND owner_id = ?2",
                [id, owner_id],
            )?;
            Ok(deleted > 0)
        })
    }

    // -- Revocation ledger --

    /// Insert a revocation entry. Idempotent: revoking an already-revoked
    /// token succeeds without complaint, so logout is safe to retry.
    /// Piggybacks a sweep of entries past the TTL — the corresponding
    /// tokens have expired on their own and no longer need a block.
    pub fn revoke_token(&self, token: &str, now: DateTime<Utc>, ttl: Duration) -> Result<()> {
        self.with_conn(|conn| {
            let cutoff = (now - ttl).timestamp();
            conn.execute(
                "DELETE FROM revoked_tokens WHERE created_at < ?1",
                [cutoff],
            )?;
            conn.execute(
                "INSERT OR IGNORE INTO revoked_tokens (token, created_at) VALUES (?1, ?2)",
                rusqlite::params![token, now.timestamp()],
            )?;
            Ok(())
        })
    }

    /// Primary-key membership check. Entries older than the TTL read as
    /// absent even before the sweep physically removes them.
    pub fn is_token_revoked(&self, token: &str, now: DateTime<Utc>, ttl: Duration) -> Result<bool> {
        self.with_conn(|conn| {
            let cutoff = (now - ttl).timestamp();
            let revoked = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM revoked_tokens WHERE token = ?1 AND created_at >= ?2
                )",
                rusqlite::params![token, cutoff],
                |row| row.get(0),
            )?;
            Ok(revoked)
        })
    }
}

fn map_unique(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Duplicate
        }
        _ => StoreError::Sqlite(e),
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT id, email, username, password, created_at FROM users WHERE email = ?1")?;

    let row = stmt
        .query_row([email], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_task(conn: &Connection, id: &str, owner_id: &str) -> Result<Option<TaskRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, owner_id, title, completed, created_at
         FROM tasks
         WHERE id = ?1 AND owner_id = ?2",
    )?;

    let row = stmt.query_row([id, owner_id], task_from_row).optional()?;

    Ok(row)
}

fn task_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<TaskRow, rusqlite::Error> {
    Ok(TaskRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        completed: row.get(3)?,
        created_at: row.get(4)?,
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
