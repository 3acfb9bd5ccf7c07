//! Session manager: the active identity and its validity.
//!
//! The session is held by this instance and handed to the synchronizers via
//! dependency injection; there is no ambient global user. "No user" and
//! "stale session" gate identity-scoped operations the same way, even though
//! callers may surface different text for them.

use std::sync::{Arc, RwLock};

use crate::error::{RemoteError, SyncError};
use crate::models::User;
use crate::remote::DocumentStore;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 6..=20;

/// Tracks the current authenticated identity.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn DocumentStore>,
    session: Arc<RwLock<Option<User>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Registers a new account and signs it in.
    ///
    /// Username and password lengths are validated before the remote service
    /// is contacted at all.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, SyncError> {
        if !USERNAME_LEN.contains(&username.chars().count()) {
            return Err(SyncError::Validation(
                "username must be between 3 and 20 characters".to_string(),
            ));
        }
        if !PASSWORD_LEN.contains(&password.chars().count()) {
            return Err(SyncError::Validation(
                "password must be between 6 and 20 characters".to_string(),
            ));
        }

        let user = self
            .store
            .sign_up(username, password)
            .await
            .map_err(|e| match e {
                RemoteError::UsernameTaken => {
                    SyncError::Remote("that username is already taken".to_string())
                }
                RemoteError::AccessDenied(msg) => {
                    SyncError::Remote(format!("the server refused the registration: {}", msg))
                }
                other => SyncError::Remote(other.to_string()),
            })?;

        tracing::info!(username, "registered new account");
        self.install(user.clone());
        Ok(user)
    }

    /// Exchanges credentials for a session and makes it current.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, SyncError> {
        let user = self.store.log_in(username, password).await?;
        tracing::info!(username, "signed in");
        self.install(user.clone());
        Ok(user)
    }

    /// Clears the current session and signs out remotely.
    ///
    /// The local session is dropped even when the remote sign-out fails, so
    /// an unreachable backend can never keep a user signed in.
    pub async fn logout(&self) -> Result<(), SyncError> {
        *self.session.write().expect("session lock poisoned") = None;
        if let Err(e) = self.store.sign_out().await {
            tracing::warn!(error = %e, "remote sign-out failed after clearing the local session");
            return Err(e.into());
        }
        tracing::info!("signed out");
        Ok(())
    }

    /// Makes a previously persisted session current without a remote call.
    ///
    /// Host applications cache the signed-in user locally and restore it on
    /// startup; the restored credential may turn out to be stale.
    pub fn install(&self, user: User) {
        *self.session.write().expect("session lock poisoned") = Some(user);
    }

    /// Returns the active identity, if any.
    pub fn current_user(&self) -> Option<User> {
        self.session
            .read()
            .expect("session lock poisoned")
            .clone()
    }

    /// Fails with `SessionInvalid` when there is no active user or the
    /// active user's session credential is empty.
    pub fn require_valid_session(&self) -> Result<User, SyncError> {
        match self.current_user() {
            None => Err(SyncError::SessionInvalid),
            Some(user) if !user.has_live_session() => {
                tracing::warn!(
                    username = %user.username,
                    "cached user has no session token, sign-in required"
                );
                Err(SyncError::SessionInvalid)
            }
            Some(user) => Ok(user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;

    fn manager() -> (Arc<MemoryStore>, SessionManager) {
        let store = Arc::new(MemoryStore::new());
        let session = SessionManager::new(store.clone());
        (store, session)
    }

    #[tokio::test]
    async fn test_register_signs_in() {
        let (_, session) = manager();
        let user = session.register("mina", "secret99").await.unwrap();

        assert_eq!(user.username, "mina");
        assert!(user.has_live_session());
        assert_eq!(session.current_user(), Some(user));
    }

    #[tokio::test]
    async fn test_register_short_username_makes_no_remote_call() {
        let (store, session) = manager();
        let result = session.register("ab", "secret99").await;

        assert!(matches!(result, Err(SyncError::Validation(_))));
        assert_eq!(store.remote_calls(), 0);
    }

    #[tokio::test]
    async fn test_register_short_password_makes_no_remote_call() {
        let (store, session) = manager();
        let result = session.register("mina", "abc").await;

        assert!(matches!(result, Err(SyncError::Validation(_))));
        assert_eq!(store.remote_calls(), 0);
    }

    #[tokio::test]
    async fn test_register_duplicate_username_message() {
        let (_, session) = manager();
        session.register("mina", "secret99").await.unwrap();

        let err = session.register("mina", "other999").await.unwrap_err();
        assert_eq!(
            err,
            SyncError::Remote("that username is already taken".to_string())
        );
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let (_, session) = manager();
        session.register("mina", "secret99").await.unwrap();
        session.logout().await.unwrap();
        assert!(session.current_user().is_none());

        let user = session.login("mina", "secret99").await.unwrap();
        assert!(user.has_live_session());
        assert!(session.require_valid_session().is_ok());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (_, session) = manager();
        session.register("mina", "secret99").await.unwrap();
        session.logout().await.unwrap();

        let result = session.login("mina", "wrong").await;
        assert!(matches!(result, Err(SyncError::Remote(_))));
        assert!(session.current_user().is_none());
    }

    #[tokio::test]
    async fn test_logout_with_remote_down_still_clears_session() {
        let (store, session) = manager();
        session.register("mina", "secret99").await.unwrap();

        store.fail_requests(true);
        assert!(session.logout().await.is_err());

        assert!(session.current_user().is_none());
        assert_eq!(
            session.require_valid_session().unwrap_err(),
            SyncError::SessionInvalid
        );
    }

    #[tokio::test]
    async fn test_require_valid_session_without_user() {
        let (_, session) = manager();
        assert_eq!(
            session.require_valid_session().unwrap_err(),
            SyncError::SessionInvalid
        );
    }

    #[tokio::test]
    async fn test_require_valid_session_with_stale_token() {
        let (_, session) = manager();
        session.install(User::new("mina", ""));

        // The stale user stays cached but cannot gate operations.
        assert_eq!(
            session.require_valid_session().unwrap_err(),
            SyncError::SessionInvalid
        );
        assert!(session.current_user().is_some());
    }
}
