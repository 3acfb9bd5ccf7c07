//! Settings synchronizer.
//!
//! Settings live in a single remote document per user. Every operation here
//! returns a [`SettingsOutcome`] instead of an error: when sync is
//! impossible the caller's map comes back with a reason, and the caller
//! treats that echoed payload as the source of truth for local caching.

use std::sync::Arc;

use crate::error::RemoteError;
use crate::models::SettingsMap;
use crate::remote::{DocumentStore, Filter, Match, StoredDocument, FIELD_OWNER, RESERVED_KEYS};
use crate::session::SessionManager;

use super::CLASS_SETTINGS;

/// Outcome of a settings operation. The `settings` field is always present
/// so callers can fall back to it for local persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsOutcome {
    pub synced: bool,
    pub settings: SettingsMap,
    pub error: Option<String>,
}

impl SettingsOutcome {
    fn ok(settings: SettingsMap) -> Self {
        Self {
            synced: true,
            settings,
            error: None,
        }
    }

    fn degraded(settings: SettingsMap, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::warn!(reason = %reason, "settings operation degraded to local-only");
        Self {
            synced: false,
            settings,
            error: Some(reason),
        }
    }
}

/// Synchronizes the per-user settings document.
#[derive(Clone)]
pub struct SettingsSync {
    store: Arc<dyn DocumentStore>,
    session: SessionManager,
}

impl SettingsSync {
    pub fn new(store: Arc<dyn DocumentStore>, session: SessionManager) -> Self {
        Self { store, session }
    }

    async fn find_settings_doc(
        &self,
        username: &str,
    ) -> Result<Match<StoredDocument>, RemoteError> {
        let docs = self
            .store
            .query(
                CLASS_SETTINGS,
                &[Filter::eq(FIELD_OWNER, username)],
                None,
            )
            .await?;
        Ok(Match::from_vec(docs))
    }

    /// Merges the map into the user's settings document, creating it if
    /// absent. Never fails past this boundary: any failure comes back as a
    /// degraded outcome echoing the input map.
    pub async fn save_settings(&self, settings: SettingsMap) -> SettingsOutcome {
        let user = match self.session.require_valid_session() {
            Ok(user) => user,
            Err(_) => {
                return SettingsOutcome::degraded(
                    settings,
                    "not signed in, settings are kept locally only",
                );
            }
        };

        let existing = match self.find_settings_doc(&user.username).await {
            Ok(existing) => existing,
            Err(e) => {
                return SettingsOutcome::degraded(
                    settings,
                    format!("could not look up existing settings: {}", e),
                );
            }
        };

        let target = match existing {
            Match::None => None,
            Match::One(doc) => Some(doc),
            Match::Many(docs) => {
                tracing::warn!(
                    username = %user.username,
                    count = docs.len(),
                    "multiple settings documents for one user"
                );
                docs.into_iter().next()
            }
        };

        let result = match target {
            Some(doc) => {
                self.store
                    .save(CLASS_SETTINGS, &doc.id, settings.clone())
                    .await
            }
            None => {
                let mut fields = settings.clone();
                fields.insert(FIELD_OWNER.to_string(), user.username.clone().into());
                self.store.create(CLASS_SETTINGS, fields).await
            }
        };

        match result {
            Ok(_) => {
                tracing::debug!(username = %user.username, "settings saved");
                SettingsOutcome::ok(settings)
            }
            Err(e) => SettingsOutcome::degraded(settings, e.to_string()),
        }
    }

    /// Loads the user's settings as a flat map with the store's bookkeeping
    /// keys stripped. An absent document is a success with an empty map,
    /// which is not the same as a degraded failure.
    pub async fn load_settings(&self) -> SettingsOutcome {
        let user = match self.session.require_valid_session() {
            Ok(user) => user,
            Err(_) => {
                return SettingsOutcome::degraded(
                    SettingsMap::new(),
                    "not signed in, using local settings",
                );
            }
        };

        let existing = match self.find_settings_doc(&user.username).await {
            Ok(existing) => existing,
            Err(e) => return SettingsOutcome::degraded(SettingsMap::new(), e.to_string()),
        };

        let doc = match existing {
            Match::None => return SettingsOutcome::ok(SettingsMap::new()),
            Match::One(doc) => doc,
            Match::Many(docs) => {
                tracing::warn!(
                    username = %user.username,
                    count = docs.len(),
                    "multiple settings documents for one user"
                );
                match docs.into_iter().next() {
                    Some(doc) => doc,
                    None => return SettingsOutcome::ok(SettingsMap::new()),
                }
            }
        };

        let settings: SettingsMap = doc
            .fields
            .into_iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .collect();
        SettingsOutcome::ok(settings)
    }
}
