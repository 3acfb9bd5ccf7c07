//! Record synchronizer: upsert/match/merge logic for timestamped care
//! records.
//!
//! A record's identity is the store's native key once created; the one
//! exception is closing a sleep interval, which matches on content because
//! the caller ending a sleep session may only know the start time.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::error::SyncError;
use crate::models::{Record, RecordDetail, RecordView};
use crate::remote::{DocumentStore, Fields, Filter, Match, SortOrder, StoredDocument, FIELD_OWNER};
use crate::session::SessionManager;

use super::{
    decode_time, encode_time, CLASS_RECORD, FIELD_AMOUNT, FIELD_BABY_ID, FIELD_DURATION,
    FIELD_END, FIELD_START, FIELD_TIME, FIELD_TYPE,
};

/// Synchronizes care records with the remote store.
#[derive(Clone)]
pub struct RecordSync {
    store: Arc<dyn DocumentStore>,
    session: SessionManager,
}

impl RecordSync {
    pub fn new(store: Arc<dyn DocumentStore>, session: SessionManager) -> Self {
        Self { store, session }
    }

    /// Creates a new remote record and returns it with the assigned id.
    ///
    /// The assigned id is the store's native key; from here on the same
    /// value addresses the record for update and delete.
    pub async fn create_record(&self, record: &Record) -> Result<Record, SyncError> {
        let user = self.session.require_valid_session()?;

        let mut fields = Fields::new();
        fields.insert(FIELD_TYPE.to_string(), record.detail.kind().into());
        fields.insert(FIELD_TIME.to_string(), encode_time(record.time));
        fields.insert(FIELD_BABY_ID.to_string(), record.baby_id.clone().into());
        fields.insert(FIELD_OWNER.to_string(), user.username.into());
        write_detail_fields(&mut fields, &record.detail);

        let doc = self.store.create(CLASS_RECORD, fields).await?;
        tracing::debug!(id = %doc.id, kind = record.detail.kind(), "record created");
        Ok(record.clone().with_id(doc.id))
    }

    /// Closes the open sleep interval matching (start, baby, owner).
    ///
    /// Resolution is by content, not by id. Returns `NotFound` and writes
    /// nothing when no such record exists.
    pub async fn close_sleep_record(
        &self,
        baby_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Record, SyncError> {
        let user = self.session.require_valid_session()?;

        let docs = self
            .store
            .query(
                CLASS_RECORD,
                &[
                    Filter::eq(FIELD_TYPE, "sleep"),
                    Filter::eq(FIELD_START, encode_time(start)),
                    Filter::eq(FIELD_BABY_ID, baby_id),
                    Filter::eq(FIELD_OWNER, user.username.as_str()),
                ],
                None,
            )
            .await?;

        let doc = match Match::from_vec(docs) {
            Match::None => {
                return Err(SyncError::NotFound("sleep record not found".to_string()));
            }
            Match::One(doc) => doc,
            Match::Many(mut docs) => {
                tracing::warn!(
                    baby_id,
                    count = docs.len(),
                    "multiple sleep records share one start time"
                );
                docs.remove(0)
            }
        };

        let mut fields = Fields::new();
        fields.insert(FIELD_END.to_string(), encode_time(end));
        fields.insert(
            FIELD_DURATION.to_string(),
            Value::from((end - start).num_minutes()),
        );
        let saved = self.store.save(CLASS_RECORD, &doc.id, fields).await?;

        record_from_doc(&saved)
            .ok_or_else(|| SyncError::Remote("remote returned a malformed record".to_string()))
    }

    /// Updates a record addressed purely by its stored id.
    ///
    /// Writes `time` plus the fields of the record's own variant; fields of
    /// other variants are left untouched.
    pub async fn update_record(&self, record: &Record) -> Result<Record, SyncError> {
        let id = record
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::Validation("record id is required".to_string()))?;
        self.session.require_valid_session()?;

        let mut fields = Fields::new();
        fields.insert(FIELD_TIME.to_string(), encode_time(record.time));
        write_detail_fields(&mut fields, &record.detail);

        let saved = self.store.save(CLASS_RECORD, id, fields).await?;
        tracing::debug!(id = %saved.id, "record updated");
        record_from_doc(&saved)
            .ok_or_else(|| SyncError::Remote("remote returned a malformed record".to_string()))
    }

    /// Lists the baby's records for the current user, ascending by time.
    ///
    /// Each view carries display renderings computed here, at read time.
    pub async fn list_records(&self, baby_id: &str) -> Result<Vec<RecordView>, SyncError> {
        let user = self.session.require_valid_session()?;
        let docs = self
            .store
            .query(
                CLASS_RECORD,
                &[
                    Filter::eq(FIELD_BABY_ID, baby_id),
                    Filter::eq(FIELD_OWNER, user.username.as_str()),
                ],
                Some(SortOrder::Ascending(FIELD_TIME.to_string())),
            )
            .await?;

        let views = docs
            .iter()
            .filter_map(|doc| {
                let record = record_from_doc(doc);
                if record.is_none() {
                    tracing::warn!(id = %doc.id, "skipping malformed record document");
                }
                record.map(RecordView::from_record)
            })
            .collect();
        Ok(views)
    }

    /// Deletes a record by its stored id. Absence is not an error.
    pub async fn delete_record(&self, id: &str) -> Result<(), SyncError> {
        if id.trim().is_empty() {
            return Err(SyncError::Validation("record id is required".to_string()));
        }
        self.session.require_valid_session()?;
        self.store.destroy(CLASS_RECORD, id).await?;
        tracing::debug!(id, "record deleted");
        Ok(())
    }
}

fn write_detail_fields(fields: &mut Fields, detail: &RecordDetail) {
    match detail {
        RecordDetail::Milk { amount_ml } => {
            fields.insert(FIELD_AMOUNT.to_string(), Value::from(*amount_ml));
        }
        RecordDetail::Sleep {
            start,
            end,
            duration_minutes,
        } => {
            fields.insert(FIELD_START.to_string(), encode_time(*start));
            if let Some(end) = end {
                fields.insert(FIELD_END.to_string(), encode_time(*end));
            }
            if let Some(duration) = duration_minutes {
                fields.insert(FIELD_DURATION.to_string(), Value::from(*duration));
            }
        }
        RecordDetail::Other { amount, .. } => {
            if let Some(amount) = amount {
                fields.insert(FIELD_AMOUNT.to_string(), Value::from(*amount));
            }
        }
    }
}

/// Maps a remote record document back into the tagged local shape. The
/// record id is the document's native key.
pub(crate) fn record_from_doc(doc: &StoredDocument) -> Option<Record> {
    let kind = doc.str_field(FIELD_TYPE)?;
    let time = decode_time(doc.fields.get(FIELD_TIME)?)?;
    let baby_id = doc.str_field(FIELD_BABY_ID)?.to_string();

    let detail = match kind {
        "milk" => RecordDetail::Milk {
            amount_ml: doc.f64_field(FIELD_AMOUNT)?,
        },
        "sleep" => RecordDetail::Sleep {
            start: decode_time(doc.fields.get(FIELD_START)?)?,
            end: doc.fields.get(FIELD_END).and_then(decode_time),
            duration_minutes: doc.i64_field(FIELD_DURATION),
        },
        other => RecordDetail::Other {
            kind: other.to_string(),
            amount: doc.f64_field(FIELD_AMOUNT),
        },
    };

    Some(Record {
        id: Some(doc.id.clone()),
        baby_id,
        time,
        detail,
    })
}
