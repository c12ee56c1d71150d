use crate::db::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

/// Lifetime of a login session
pub const SESSION_TTL_DAYS: i64 = 30;

/// Database-backed session manager for token authentication
///
/// Tokens are UUID v4 strings stored in the `sessions` table with a 30-day
/// expiry. Clients send them in the `X-Session-Token` header.
#[derive(Clone)]
pub struct SessionManager {
    db: Database,
}

impl SessionManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new session for a user and return its token
    pub fn create_session(&self, user_id: i64) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let expires_at = created_at + Duration::days(SESSION_TTL_DAYS);

        let conn = self.db.connection()?;
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![token, user_id, created_at, expires_at],
        )
        .context("Failed to create session")?;

        tracing::info!("Created session for user {}", user_id);
        Ok(token)
    }

    /// Resolve a token to its user id.
    ///
    /// Unknown tokens give `None`; expired ones are deleted and give `None` too.
    pub fn validate_session(&self, token: &str) -> Result<Option<i64>> {
        let found: Option<(i64, DateTime<Utc>)> = {
            let conn = self.db.connection()?;
            conn.query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                rusqlite::params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to look up session")?
        };

        match found {
            Some((_, expires_at)) if Utc::now() > expires_at => {
                self.delete_session(token)?;
                Ok(None)
            }
            Some((user_id, _)) => Ok(Some(user_id)),
            None => Ok(None),
        }
    }

    /// Delete a session (logout)
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.db.connection()?;
        let rows_affected = conn
            .execute(
                "DELETE FROM sessions WHERE token = ?1",
                rusqlite::params![token],
            )
            .context("Failed to delete session")?;

        if rows_affected > 0 {
            tracing::info!("Deleted session");
        }

        Ok(())
    }

    /// Remove every session past its expiry time; returns how many were removed
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.db.connection()?;
        let rows_affected = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                rusqlite::params![Utc::now()],
            )
            .context("Failed to cleanup expired sessions")?;

        if rows_affected > 0 {
            tracing::info!("Cleaned up {} expired sessions", rows_affected);
        }

        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_db() -> Database {
        let db = Database::in_memory().expect("Failed to create test database");
        db.initialize().expect("Failed to initialize database");
        db.seed_test_data().expect("Failed to seed test data");
        db
    }

    #[test]
    fn test_create_and_validate_session() {
        let manager = SessionManager::new(setup_test_db());

        let token = manager.create_session(2).expect("Failed to create session");
        assert!(Uuid::parse_str(&token).is_ok(), "Token should be a valid UUID");
        assert_eq!(manager.validate_session(&token).unwrap(), Some(2));
    }

    #[test]
    fn test_validate_invalid_session() {
        let manager = SessionManager::new(setup_test_db());
        assert_eq!(manager.validate_session("invalid-token").unwrap(), None);
    }

    #[test]
    fn test_delete_session() {
        let manager = SessionManager::new(setup_test_db());

        let token = manager.create_session(1).expect("Failed to create session");
        manager.delete_session(&token).expect("Failed to delete session");
        assert_eq!(manager.validate_session(&token).unwrap(), None);
    }

    #[test]
    fn test_cleanup_expired_sessions() {
        let db = setup_test_db();
        let manager = SessionManager::new(db.clone());

        let token = manager.create_session(1).expect("Failed to create session");
        let fresh = manager.create_session(1).expect("Failed to create session");

        let conn = db.connection().expect("Failed to get connection");
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE token = ?2",
            rusqlite::params![Utc::now() - Duration::days(1), token],
        )
        .expect("Failed to expire session");
        drop(conn);

        assert_eq!(manager.cleanup_expired_sessions().unwrap(), 1);
        assert_eq!(manager.validate_session(&token).unwrap(), None);
        assert_eq!(manager.validate_session(&fresh).unwrap(), Some(1));
    }

    #[test]
    fn test_expired_session_is_rejected_and_removed() {
        let db = setup_test_db();
        let manager = SessionManager::new(db.clone());
        let token = manager.create_session(3).expect("Failed to create session");

        let conn = db.connection().expect("Failed to get connection");
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE token = ?2",
            rusqlite::params![Utc::now() - Duration::minutes(1), token],
        )
        .expect("Failed to expire session");
        drop(conn);

        assert_eq!(manager.validate_session(&token).unwrap(), None);
        assert_eq!(manager.cleanup_expired_sessions().unwrap(), 0);
    }

    #[test]
    fn test_session_token_uniqueness() {
        let manager = SessionManager::new(setup_test_db());
        let token1 = manager.create_session(4).unwrap();
        let token2 = manager.create_session(4).unwrap();
        assert_ne!(token1, token2);
    }
}
