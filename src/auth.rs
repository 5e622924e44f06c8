use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use thiserror::Error;
use tracing::info;

use crate::database::{Database, DatabaseError, UserRow};
use crate::utils::new_id;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials. Please register first.")]
    InvalidCredentials,
    #[error("Email already registered.")]
    DuplicateEmail,
    #[error("Password hashing failed: {0}")]
    HashError(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

/// A signed-in identity. The id doubles as the storage partition key, so two
/// users can never observe each other's documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
        }
    }
}

/// Session and account management over the local registry.
pub struct Auth<'a> {
    db: &'a Database,
}

impl<'a> Auth<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a new account and sign it in. Fails with `DuplicateEmail`
    /// when the address is already taken.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        if self.db.get_user_by_email(email)?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let row = UserRow {
            id: new_id(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.db.insert_user(&row)?;
        self.db.set_session(&row.id)?;
        info!(email, "account registered");
        Ok(row.into())
    }

    /// Sign in an existing account. An unknown email and a wrong password
    /// are indistinguishable to the caller.
    pub fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let row = self
            .db
            .get_user_by_email(email)?
            .ok_or(AuthError::InvalidCredentials)?;

        let parsed_hash =
            PasswordHash::new(&row.password_hash).map_err(|_| AuthError::InvalidCredentials)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        self.db.set_session(&row.id)?;
        info!(email, "signed in");
        Ok(row.into())
    }

    /// The active session's user, if anyone is signed in.
    pub fn current_user(&self) -> Result<Option<User>, AuthError> {
        let Some(user_id) = self.db.get_session()? else {
            return Ok(None);
        };
        Ok(self.db.get_user(&user_id)?.map(User::from))
    }

    /// Clear the active session.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.db.clear_session()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_signs_in_and_partitions_by_id() {
        let db = Database::in_memory().unwrap();
        let auth = Auth::new(&db);

        let alice = auth.register("Alice", "alice@example.com", "hunter2").unwrap();
        assert_eq!(auth.current_user().unwrap(), Some(alice.clone()));

        let bob = auth.register("Bob", "bob@example.com", "swordfish").unwrap();
        assert_ne!(alice.id, bob.id);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = Database::in_memory().unwrap();
        let auth = Auth::new(&db);
        auth.register("Alice", "alice@example.com", "hunter2").unwrap();

        let err = auth
            .register("Imposter", "alice@example.com", "other")
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[test]
    fn login_verifies_the_password() {
        let db = Database::in_memory().unwrap();
        let auth = Auth::new(&db);
        auth.register("Alice", "alice@example.com", "hunter2").unwrap();
        auth.logout().unwrap();

        assert!(matches!(
            auth.login("alice@example.com", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "hunter2"),
            Err(AuthError::InvalidCredentials)
        ));

        let user = auth.login("alice@example.com", "hunter2").unwrap();
        assert_eq!(user.name, "Alice");
        assert_eq!(auth.current_user().unwrap(), Some(user));
    }

    #[test]
    fn logout_clears_the_session() {
        let db = Database::in_memory().unwrap();
        let auth = Auth::new(&db);
        auth.register("Alice", "alice@example.com", "hunter2").unwrap();

        auth.logout().unwrap();
        assert_eq!(auth.current_user().unwrap(), None);
    }
}
