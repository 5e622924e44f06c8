use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
}

/// A registered account row. The password hash never leaves this module's
/// callers in the auth layer.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Local storage backing: a user registry, one JSON document blob per user
/// partition, and the active session marker.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        // Open or create the database
        let conn = Connection::open(&db_path)?;

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open an in-memory database, used by tests.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;

        // One JSON blob per user partition; mutations replace the whole body.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                user_id         TEXT PRIMARY KEY,
                body            TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;

        // Single-row table holding the active login, if any.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS session (
                slot            INTEGER PRIMARY KEY CHECK (slot = 0),
                user_id         TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
            [],
        )?;

        Ok(())
    }

    fn row_to_user(row: &rusqlite::Row) -> Result<UserRow, rusqlite::Error> {
        Ok(UserRow {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    /// Insert a new account row
    pub fn insert_user(&self, user: &UserRow) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                user.id,
                user.name,
                user.email,
                user.password_hash,
                user.created_at
            ],
        )?;
        Ok(())
    }

    /// Look up an account by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = ?1",
        )?;
        let user = stmt
            .query_row(rusqlite::params![email], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Look up an account by identifier
    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE id = ?1",
        )?;
        let user = stmt
            .query_row(rusqlite::params![id], Self::row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Record the active session user
    pub fn set_session(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO session (slot, user_id) VALUES (0, ?1)
             ON CONFLICT(slot) DO UPDATE SET user_id = excluded.user_id",
            rusqlite::params![user_id],
        )?;
        Ok(())
    }

    /// Get the active session user id, if logged in
    pub fn get_session(&self) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT user_id FROM session WHERE slot = 0")?;
        let user_id = stmt.query_row([], |row| row.get(0)).optional()?;
        Ok(user_id)
    }

    /// Clear the active session
    pub fn clear_session(&self) -> Result<(), DatabaseError> {
        self.conn.execute("DELETE FROM session WHERE slot = 0", [])?;
        Ok(())
    }

    /// Load the serialized document for a user partition
    pub fn load_document(&self, user_id: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM documents WHERE user_id = ?1")?;
        let body = stmt
            .query_row(rusqlite::params![user_id], |row| row.get(0))
            .optional()?;
        Ok(body)
    }

    /// Replace the stored document for a user partition in one write
    pub fn save_document(&self, user_id: &str, body: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO documents (user_id, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            rusqlite::params![
                user_id,
                body,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Drop a user partition's document (account deletion)
    pub fn delete_document(&self, user_id: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM documents WHERE user_id = ?1",
            rusqlite::params![user_id],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(email: &str) -> UserRow {
        UserRow {
            id: crate::utils::new_id(),
            name: "Alice".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            created_at: "2024-01-10T08:00:00Z".to_string(),
        }
    }

    #[test]
    fn user_registry_round_trip() {
        let db = Database::in_memory().unwrap();
        let user = sample_user("alice@example.com");
        db.insert_user(&user).unwrap();

        let found = db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.name, "Alice");

        assert!(db.get_user_by_email("bob@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected_by_schema() {
        let db = Database::in_memory().unwrap();
        db.insert_user(&sample_user("alice@example.com")).unwrap();
        assert!(db.insert_user(&sample_user("alice@example.com")).is_err());
    }

    #[test]
    fn session_set_get_clear() {
        let db = Database::in_memory().unwrap();
        assert!(db.get_session().unwrap().is_none());

        db.set_session("user-1").unwrap();
        assert_eq!(db.get_session().unwrap().as_deref(), Some("user-1"));

        // Logging in as someone else replaces the slot.
        db.set_session("user-2").unwrap();
        assert_eq!(db.get_session().unwrap().as_deref(), Some("user-2"));

        db.clear_session().unwrap();
        assert!(db.get_session().unwrap().is_none());
    }

    #[test]
    fn document_blob_replace_and_delete() {
        let db = Database::in_memory().unwrap();
        assert!(db.load_document("u1").unwrap().is_none());

        db.save_document("u1", "{\"tasks\":[]}").unwrap();
        db.save_document("u1", "{\"tasks\":[1]}").unwrap();
        assert_eq!(db.load_document("u1").unwrap().unwrap(), "{\"tasks\":[1]}");

        // Partitions do not leak into each other.
        assert!(db.load_document("u2").unwrap().is_none());

        db.delete_document("u1").unwrap();
        assert!(db.load_document("u1").unwrap().is_none());
    }
}
