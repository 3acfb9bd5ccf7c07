use serde::{Deserialize, Serialize};

/// An authenticated identity.
///
/// A user with an empty `session_token` is a stale session: present, but not
/// valid for identity-scoped operations. That is a different state from no
/// user at all, though both gate the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub session_token: String,
}

impl User {
    pub fn new(username: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            session_token: session_token.into(),
        }
    }

    /// Returns true if the session credential is present and non-empty.
    pub fn has_live_session(&self) -> bool {
        !self.session_token.is_empty()
    }
}
