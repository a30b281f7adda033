/// Database row types — these map directly to SQLite rows.
/// Distinct from tasklive-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct TaskRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub completed: bool,
    pub created_at: String,
}
