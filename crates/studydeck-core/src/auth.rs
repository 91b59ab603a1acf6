//! Local accounts and bearer tokens.
//!
//! Passwords are stored as bcrypt hashes and tokens as SHA-256 digests, so a
//! leaked database yields neither. Every sign-in and sign-out is broadcast as
//! an [`AuthEvent`].

use crate::{Result, StudyError};
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use studydeck_types::{AuthEvent, User};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const DEFAULT_DISPLAY_NAME: &str = "User";
const TOKEN_TTL_DAYS: i64 = 30;
const EVENT_CAPACITY: usize = 64;

/// A signed-in user and the token that identifies the session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

pub struct AuthService {
    conn: Mutex<Connection>,
    bcrypt_cost: u32,
    events: broadcast::Sender<AuthEvent>,
}

fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let service = Self {
            conn: Mutex::new(conn),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            events,
        };
        service.init_schema()?;
        Ok(service)
    }

    /// Override the bcrypt work factor.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS auth_tokens (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Stream of sign-in and sign-out events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Create an account. A blank name falls back to a generic one.
    pub fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<User> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(StudyError::Validation("Please enter a valid email address.".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(StudyError::Validation(format!(
                "Password should be at least {} characters.",
                MIN_PASSWORD_LEN
            )));
        }

        let name = match name.trim() {
            "" => DEFAULT_DISPLAY_NAME.to_string(),
            n => n.to_string(),
        };
        let password_hash = bcrypt::hash(password, self.bcrypt_cost)?;
        let user = User {
            id: Uuid::new_v4(),
            name,
            email,
        };

        let conn = self.conn();
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            params![user.email],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StudyError::EmailTaken(user.email));
        }

        conn.execute(
            "INSERT INTO users (id, email, name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id.to_string(),
                user.email,
                user.name,
                password_hash,
                Utc::now().to_rfc3339()
            ],
        )?;
        info!(target: "studydeck::auth", "Registered user {}", user.id);
        Ok(user)
    }

    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = normalize_email(email);
        let invalid = || StudyError::Unauthorized("Invalid login credentials".into());

        let row = self
            .conn()
            .query_row(
                "SELECT id, name, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let (id, name, password_hash) = row.ok_or_else(invalid)?;

        if !bcrypt::verify(password, &password_hash)? {
            debug!(target: "studydeck::auth", "Wrong password for {}", id);
            return Err(invalid());
        }

        let user = User {
            id: Uuid::parse_str(&id).map_err(|_| invalid())?,
            name,
            email,
        };
        let token = new_token();
        let expires_at = Utc::now() + Duration::days(TOKEN_TTL_DAYS);
        self.conn().execute(
            "INSERT INTO auth_tokens (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![sha256_hex(&token), user.id.to_string(), expires_at.timestamp()],
        )?;

        info!(target: "studydeck::auth", "User {} signed in", user.id);
        self.publish(AuthEvent::SignedIn { user_id: user.id });
        Ok(AuthSession { token, user })
    }

    /// Revoke a token. Unknown tokens are ignored.
    pub fn sign_out(&self, token: &str) -> Result<()> {
        let user = self.current_user(token)?;
        self.conn().execute(
            "DELETE FROM auth_tokens WHERE token_hash = ?1",
            params![sha256_hex(token)],
        )?;

        if let Some(user) = user {
            info!(target: "studydeck::auth", "User {} signed out", user.id);
            self.publish(AuthEvent::SignedOut { user_id: user.id });
        }
        Ok(())
    }

    /// The user a token belongs to, if it is valid and unexpired.
    pub fn current_user(&self, token: &str) -> Result<Option<User>> {
        let row = self
            .conn()
            .query_row(
                r#"
                SELECT u.id, u.name, u.email
                FROM auth_tokens t JOIN users u ON u.id = t.user_id
                WHERE t.token_hash = ?1 AND t.expires_at > ?2
                "#,
                params![sha256_hex(token), Utc::now().timestamp()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.and_then(|(id, name, email)| {
            Uuid::parse_str(&id).ok().map(|id| User { id, name, email })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::open_in_memory().unwrap().with_bcrypt_cost(4)
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sign_up_validation() {
        let auth = service();
        assert!(matches!(
            auth.sign_up("a@b.c", "12345", "Ann"),
            Err(StudyError::Validation(_))
        ));
        assert!(matches!(
            auth.sign_up("not-an-email", "123456", "Ann"),
            Err(StudyError::Validation(_))
        ));

        let user = auth.sign_up("  Ann@Example.com ", "123456", "  ").unwrap();
        assert_eq!(user.email, "ann@example.com");
        assert_eq!(user.name, DEFAULT_DISPLAY_NAME);

        assert!(matches!(
            auth.sign_up("ann@example.com", "abcdef", "Ann"),
            Err(StudyError::EmailTaken(_))
        ));
    }

    #[test]
    fn test_sign_in_and_out() {
        let auth = service();
        let user = auth.sign_up("sam@example.com", "secret1", "Sam").unwrap();

        assert!(matches!(
            auth.sign_in_with_password("sam@example.com", "wrong!!"),
            Err(StudyError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.sign_in_with_password("nobody@example.com", "secret1"),
            Err(StudyError::Unauthorized(_))
        ));

        let session = auth.sign_in_with_password("SAM@example.com", "secret1").unwrap();
        assert_eq!(session.user, user);
        assert_eq!(auth.current_user(&session.token).unwrap(), Some(user));

        auth.sign_out(&session.token).unwrap();
        assert_eq!(auth.current_user(&session.token).unwrap(), None);
        auth.sign_out(&session.token).unwrap();
    }

    #[test]
    fn test_tokens_are_stored_hashed() {
        let auth = service();
        auth.sign_up("kim@example.com", "secret1", "Kim").unwrap();
        let session = auth.sign_in_with_password("kim@example.com", "secret1").unwrap();

        let stored: String = auth
            .conn()
            .query_row("SELECT token_hash FROM auth_tokens", [], |row| row.get(0))
            .unwrap();
        assert_ne!(stored, session.token);
        assert_eq!(stored, sha256_hex(&session.token));
    }

    #[test]
    fn test_events_are_broadcast() {
        let auth = service();
        let mut events = auth.subscribe();
        let user = auth.sign_up("lee@example.com", "secret1", "Lee").unwrap();

        let session = auth.sign_in_with_password("lee@example.com", "secret1").unwrap();
        auth.sign_out(&session.token).unwrap();

        assert_eq!(events.try_recv().unwrap(), AuthEvent::SignedIn { user_id: user.id });
        assert_eq!(events.try_recv().unwrap(), AuthEvent::SignedOut { user_id: user.id });
        assert!(events.try_recv().is_err());
    }
}
