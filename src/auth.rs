//! Credentials and sessions
//!
//! Passwords are hashed with Argon2id and stored as PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so the parameters travel with
//! the hash. Sessions are opaque UUID tokens held in memory with a fixed TTL.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Id;

fn hash_password_blocking(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Other(anyhow::anyhow!("Failed to hash password: {}", e)))
}

/// A stored value that is not a PHC string never verifies.
fn verify_password_blocking(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Unreadable password hash: {}", e);
            false
        }
    }
}

/// Hash a password off the async runtime
pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(Error::internal)?
}

/// Check a password against a stored PHC hash string
pub async fn verify_password(password: String, stored: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &stored))
        .await
        .map_err(Error::internal)
}

#[derive(Debug, Clone)]
struct Session {
    user_id: Id,
    expires_at: Instant,
}

/// In-memory session table: token -> user id
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a new token for `user_id`
    pub async fn create(&self, user_id: Id) -> String {
        let token = Uuid::new_v4().to_string();
        let session = Session {
            user_id,
            expires_at: Instant::now() + self.ttl,
        };
        let mut sessions = self.sessions.write().await;
        // drop expired sessions while holding the write lock
        let now = Instant::now();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.clone(), session);
        debug!(user_id, active = sessions.len(), "session created");
        token
    }

    /// User id behind `token`, or `None` if unknown or expired
    pub async fn resolve(&self, token: &str) -> Option<Id> {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .filter(|s| s.expires_at > Instant::now())
            .map(|s| s.user_id)
    }

    /// Invalidate a token. Returns false if it was not active.
    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_password_roundtrip() {
        let stored = hash_password("hunter22".to_string()).await.unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(!stored.contains("hunter22"));
        assert!(verify_password("hunter22".to_string(), stored.clone())
            .await
            .unwrap());
        assert!(!verify_password("hunter23".to_string(), stored).await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_hash_does_not_verify() {
        assert!(!verify_password("x".to_string(), "garbage".to_string())
            .await
            .unwrap());
        // bare salt$hash without algorithm or parameters
        assert!(!verify_password(
            "x".to_string(),
            "f7802312a3bb7ce96502f50c0d21bf66$770e46a2".to_string()
        )
        .await
        .unwrap());
    }

    #[tokio::test]
    async fn test_stored_hash_is_a_phc_string() {
        let stored = hash_password("hunter22".to_string()).await.unwrap();
        let parsed = PasswordHash::new(&stored).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        assert!(parsed.salt.is_some());
        assert!(Argon2::default()
            .verify_password(b"hunter22", &parsed)
            .is_ok());
    }

    #[tokio::test]
    async fn test_sessions() {
        let sessions = SessionStore::new(Duration::from_secs(60));
        let token = sessions.create(7).await;
        assert_eq!(sessions.resolve(&token).await, Some(7));
        assert_eq!(sessions.resolve("nope").await, None);
        assert!(sessions.revoke(&token).await);
        assert!(!sessions.revoke(&token).await);
        assert_eq!(sessions.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn test_expired_session_does_not_resolve() {
        let sessions = SessionStore::new(Duration::ZERO);
        let token = sessions.create(1).await;
        assert_eq!(sessions.resolve(&token).await, None);
    }
}
