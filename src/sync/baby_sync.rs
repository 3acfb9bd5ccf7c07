//! Baby synchronizer and identity reconciler.
//!
//! A baby keeps its client-assigned identity across the round trip: the
//! remote document stores it in the `cloudId` field and every lookup matches
//! on (`cloudId`, owner). The store's native key is never used to address a
//! baby.

use std::sync::Arc;

use crate::error::SyncError;
use crate::models::{Baby, User};
use crate::remote::{
    DocumentStore, Fields, Filter, Match, StoredDocument, FIELD_OWNER,
};
use crate::session::SessionManager;

use super::{
    decode_date, encode_date, CLASS_BABY, CLASS_RECORD, FIELD_BABY_ID, FIELD_BIRTHDAY,
    FIELD_CLOUD_ID, FIELD_NAME,
};

/// Outcome of a baby save that degrades to local-only on failure.
///
/// On failure the caller's baby is echoed back so it can still be cached
/// locally; the user's entered data is never lost to a sync error.
#[derive(Debug, Clone, PartialEq)]
pub struct BabyOutcome {
    pub synced: bool,
    pub baby: Baby,
    pub error: Option<String>,
}

/// Synchronizes baby profiles with the remote store.
#[derive(Clone)]
pub struct BabySync {
    store: Arc<dyn DocumentStore>,
    session: SessionManager,
}

impl BabySync {
    pub fn new(store: Arc<dyn DocumentStore>, session: SessionManager) -> Self {
        Self { store, session }
    }

    /// Looks up the remote document for a local baby id, scoped to `user`.
    ///
    /// The (`cloudId`, owner) pair should be unique; `Match::Many` means the
    /// data is already inconsistent upstream and the call site decides what
    /// to do with it.
    pub(crate) async fn find_remote_baby(
        &self,
        local_id: &str,
        user: &User,
    ) -> Result<Match<StoredDocument>, SyncError> {
        let docs = self
            .store
            .query(
                CLASS_BABY,
                &[
                    Filter::eq(FIELD_CLOUD_ID, local_id),
                    Filter::eq(FIELD_OWNER, user.username.as_str()),
                ],
                None,
            )
            .await?;
        Ok(Match::from_vec(docs))
    }

    /// Creates or updates the baby's remote document.
    ///
    /// Sequential upserts for the same `local_id` never create a second
    /// document. Two callers racing past the lookup can still both create
    /// one; that race is accepted, not serialized here.
    pub async fn upsert_baby(&self, baby: &Baby) -> BabyOutcome {
        match self.try_upsert(baby).await {
            Ok(saved) => BabyOutcome {
                synced: true,
                baby: saved,
                error: None,
            },
            Err(e) => {
                tracing::warn!(
                    local_id = %baby.local_id,
                    error = %e,
                    "baby save degraded to local-only"
                );
                BabyOutcome {
                    synced: false,
                    baby: baby.clone(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_upsert(&self, baby: &Baby) -> Result<Baby, SyncError> {
        if !baby.is_complete() {
            return Err(SyncError::Validation(
                "baby profile is incomplete".to_string(),
            ));
        }
        let user = self.session.require_valid_session()?;

        let target = match self.find_remote_baby(&baby.local_id, &user).await? {
            Match::None => None,
            Match::One(doc) => Some(doc),
            Match::Many(docs) => {
                // Should be unique per (cloudId, owner); first match wins.
                tracing::warn!(
                    local_id = %baby.local_id,
                    count = docs.len(),
                    "multiple remote documents share one cloudId"
                );
                docs.into_iter().next()
            }
        };

        let mut fields = Fields::new();
        fields.insert(FIELD_NAME.to_string(), baby.name.clone().into());
        fields.insert(FIELD_BIRTHDAY.to_string(), encode_date(baby.birthday));

        let saved = match target {
            Some(doc) => {
                tracing::debug!(local_id = %baby.local_id, "updating existing baby document");
                self.store.save(CLASS_BABY, &doc.id, fields).await?
            }
            None => {
                tracing::debug!(local_id = %baby.local_id, "creating baby document");
                fields.insert(FIELD_CLOUD_ID.to_string(), baby.local_id.clone().into());
                fields.insert(FIELD_OWNER.to_string(), user.username.clone().into());
                self.store.create(CLASS_BABY, fields).await?
            }
        };

        baby_from_doc(&saved)
            .ok_or_else(|| SyncError::Remote("remote returned a malformed baby document".to_string()))
    }

    /// Lists the current user's babies.
    pub async fn list_babies(&self) -> Result<Vec<Baby>, SyncError> {
        let user = self.session.require_valid_session()?;
        let docs = self
            .store
            .query(
                CLASS_BABY,
                &[Filter::eq(FIELD_OWNER, user.username.as_str())],
                None,
            )
            .await?;

        let babies = docs
            .iter()
            .filter_map(|doc| {
                let baby = baby_from_doc(doc);
                if baby.is_none() {
                    tracing::warn!(id = %doc.id, "skipping malformed baby document");
                }
                baby
            })
            .collect();
        Ok(babies)
    }

    /// Deletes a baby and every record that references it.
    ///
    /// The baby is resolved via the cloudId match; its absence is not an
    /// error. The record cascade deliberately ignores owner scoping so no
    /// orphaned records survive.
    pub async fn delete_baby(&self, local_id: &str) -> Result<(), SyncError> {
        let user = self.session.require_valid_session()?;

        match self.find_remote_baby(local_id, &user).await? {
            Match::None => {}
            Match::One(doc) => self.store.destroy(CLASS_BABY, &doc.id).await?,
            Match::Many(docs) => {
                tracing::warn!(
                    local_id,
                    count = docs.len(),
                    "multiple remote documents share one cloudId"
                );
                for doc in docs {
                    self.store.destroy(CLASS_BABY, &doc.id).await?;
                }
            }
        }

        let records = self
            .store
            .query(CLASS_RECORD, &[Filter::eq(FIELD_BABY_ID, local_id)], None)
            .await?;
        if !records.is_empty() {
            let ids: Vec<String> = records.into_iter().map(|doc| doc.id).collect();
            tracing::info!(local_id, count = ids.len(), "cascading record deletion");
            self.store.destroy_all(CLASS_RECORD, &ids).await?;
        }
        Ok(())
    }
}

/// Maps a remote baby document back into the local shape. The baby's id is
/// the `cloudId` field, never the document's native key.
pub(crate) fn baby_from_doc(doc: &StoredDocument) -> Option<Baby> {
    Some(Baby {
        local_id: doc.str_field(FIELD_CLOUD_ID)?.to_string(),
        name: doc.str_field(FIELD_NAME)?.to_string(),
        birthday: decode_date(doc.fields.get(FIELD_BIRTHDAY)?)?,
    })
}
