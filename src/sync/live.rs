//! Change notifier: remote change streams re-emitted as normalized events.
//!
//! Each subscription is scoped to the current owner and delivers events in
//! the same shapes synchronous reads produce. Delivery runs on its own
//! channel, fully decoupled from the request/response flow; a local write's
//! completion and its change event are not ordered relative to each other.
//! The subscription ends when the receiver is dropped; there is no
//! auto-reconnect.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::SyncError;
use crate::models::{Baby, RecordView};
use crate::remote::{DocumentStore, Filter, RemoteChange, FIELD_OWNER};
use crate::session::SessionManager;

use super::baby_sync::baby_from_doc;
use super::record_sync::record_from_doc;
use super::{CLASS_BABY, CLASS_RECORD, FIELD_CLOUD_ID};

/// Capacity of each consumer-facing event channel.
const EVENT_BUFFER: usize = 64;

/// A normalized record change. Deletions carry only the record id.
#[derive(Debug, Clone)]
pub enum RecordEvent {
    Created(RecordView),
    Updated(RecordView),
    Deleted(String),
}

/// A normalized baby change. Deletions carry the baby's `cloudId`, the only
/// identifier the local application knows a baby by.
#[derive(Debug, Clone)]
pub enum BabyEvent {
    Created(Baby),
    Updated(Baby),
    Deleted(String),
}

/// Subscribes to remote change streams and re-emits normalized events.
#[derive(Clone)]
pub struct ChangeNotifier {
    store: Arc<dyn DocumentStore>,
    session: SessionManager,
}

impl ChangeNotifier {
    pub fn new(store: Arc<dyn DocumentStore>, session: SessionManager) -> Self {
        Self { store, session }
    }

    /// Opens an owner-scoped subscription for record changes.
    ///
    /// Setup failures surface to the caller; after that, malformed remote
    /// events are logged and skipped rather than ending the stream.
    pub async fn subscribe_records(&self) -> Result<mpsc::Receiver<RecordEvent>, SyncError> {
        let user = self.session.require_valid_session()?;
        let mut changes = self
            .store
            .subscribe(
                CLASS_RECORD,
                &[Filter::eq(FIELD_OWNER, user.username.as_str())],
            )
            .await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                let event = match change {
                    RemoteChange::Created(doc) => match record_from_doc(&doc) {
                        Some(record) => RecordEvent::Created(RecordView::from_record(record)),
                        None => {
                            tracing::warn!(id = %doc.id, "skipping malformed record change");
                            continue;
                        }
                    },
                    RemoteChange::Updated(doc) => match record_from_doc(&doc) {
                        Some(record) => RecordEvent::Updated(RecordView::from_record(record)),
                        None => {
                            tracing::warn!(id = %doc.id, "skipping malformed record change");
                            continue;
                        }
                    },
                    RemoteChange::Deleted(doc) => RecordEvent::Deleted(doc.id),
                };
                if tx.send(event).await.is_err() {
                    // Consumer dropped the receiver; the subscription's
                    // lifetime is theirs to end.
                    break;
                }
            }
        });
        Ok(rx)
    }

    /// Opens an owner-scoped subscription for baby changes.
    pub async fn subscribe_babies(&self) -> Result<mpsc::Receiver<BabyEvent>, SyncError> {
        let user = self.session.require_valid_session()?;
        let mut changes = self
            .store
            .subscribe(
                CLASS_BABY,
                &[Filter::eq(FIELD_OWNER, user.username.as_str())],
            )
            .await?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                let event = match change {
                    RemoteChange::Created(doc) => match baby_from_doc(&doc) {
                        Some(baby) => BabyEvent::Created(baby),
                        None => {
                            tracing::warn!(id = %doc.id, "skipping malformed baby change");
                            continue;
                        }
                    },
                    RemoteChange::Updated(doc) => match baby_from_doc(&doc) {
                        Some(baby) => BabyEvent::Updated(baby),
                        None => {
                            tracing::warn!(id = %doc.id, "skipping malformed baby change");
                            continue;
                        }
                    },
                    RemoteChange::Deleted(doc) => match doc.str_field(FIELD_CLOUD_ID) {
                        Some(cloud_id) => BabyEvent::Deleted(cloud_id.to_string()),
                        None => {
                            tracing::warn!(id = %doc.id, "deleted baby without a cloudId");
                            continue;
                        }
                    },
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}
