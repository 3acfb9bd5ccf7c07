//! Client-side cloud data-access and sync layer for the Nestling baby
//! tracker.
//!
//! The crate reconciles locally-identified entities (babies, timestamped
//! care records, per-user settings) with documents in a remote store, and
//! re-emits remote changes as normalized local events. The store itself is
//! an opaque collaborator behind [`remote::DocumentStore`]; everything here
//! is the matching, merging and degradation logic layered on top of it.
//!
//! # Identity rules
//!
//! - A baby keeps its client-assigned id: the remote document stores it in
//!   a `cloudId` field and lookups match on (`cloudId`, owner), never on
//!   the store's native key.
//! - A record's id IS the store's native key once created.
//! - Closing a sleep interval matches on content (type, start, baby,
//!   owner), because the caller ending a sleep session may not hold the id
//!   assigned at creation.
//!
//! # Degradation
//!
//! Baby saves and settings operations never lose the user's entered data:
//! when sync is impossible they return the caller's input back with a
//! reason, for local-only caching.

pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod session;
pub mod sync;

pub use config::{CloudConfig, ConfigError};
pub use error::{RemoteError, SyncError};
pub use models::{Baby, Record, RecordDetail, RecordView, SettingsMap, User};
pub use remote::{
    DocumentStore, Fields, Filter, Match, MemoryStore, RemoteChange, SortOrder, StoredDocument,
};
pub use session::SessionManager;
pub use sync::{
    BabyEvent, BabyOutcome, BabySync, ChangeNotifier, RecordEvent, RecordSync, SettingsOutcome,
    SettingsSync,
};

use std::sync::Arc;
use tokio::sync::OnceCell;

/// Entry point bundling the store, the session and the synchronizers.
///
/// Construct one per process, initialize it once, and hand the component
/// handles out to the rest of the application.
pub struct CloudService {
    store: Arc<dyn DocumentStore>,
    config: CloudConfig,
    session: SessionManager,
    init: OnceCell<()>,
}

impl CloudService {
    pub fn new(store: Arc<dyn DocumentStore>, config: CloudConfig) -> Self {
        let session = SessionManager::new(store.clone());
        Self {
            store,
            config,
            session,
            init: OnceCell::new(),
        }
    }

    /// Performs the one-time remote connection setup.
    ///
    /// Safe to call from any number of components, concurrently or not: the
    /// connection is established once and later callers await that first
    /// run's outcome. A failed attempt is retried by the next caller.
    pub async fn initialize(&self) -> Result<(), SyncError> {
        self.init
            .get_or_try_init(|| async {
                self.store
                    .connect(&self.config)
                    .await
                    .map_err(SyncError::from)
            })
            .await?;
        Ok(())
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn babies(&self) -> BabySync {
        BabySync::new(self.store.clone(), self.session.clone())
    }

    pub fn records(&self) -> RecordSync {
        RecordSync::new(self.store.clone(), self.session.clone())
    }

    pub fn settings(&self) -> SettingsSync {
        SettingsSync::new(self.store.clone(), self.session.clone())
    }

    pub fn changes(&self) -> ChangeNotifier {
        ChangeNotifier::new(self.store.clone(), self.session.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn service() -> (Arc<MemoryStore>, CloudService) {
        let store = Arc::new(MemoryStore::new());
        let service = CloudService::new(store.clone(), CloudConfig::default());
        (store, service)
    }

    #[tokio::test]
    async fn test_initialize_runs_connect_once() {
        let (store, service) = service();

        service.initialize().await.unwrap();
        service.initialize().await.unwrap();

        assert_eq!(store.remote_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_runs_connect_once() {
        let (store, service) = service();

        let (a, b) = tokio::join!(service.initialize(), service.initialize());
        a.unwrap();
        b.unwrap();

        assert_eq!(store.remote_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_initialize_can_be_retried() {
        let (store, service) = service();

        store.fail_requests(true);
        assert!(service.initialize().await.is_err());

        store.fail_requests(false);
        service.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn test_end_to_end_flow() {
        let (_, service) = service();
        service.initialize().await.unwrap();

        service
            .session()
            .register("mina", "secret99")
            .await
            .unwrap();

        let baby = Baby::new("b1", "Mina", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(service.babies().upsert_baby(&baby).await.synced);

        let time = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        service
            .records()
            .create_record(&Record::new(
                "b1",
                time,
                RecordDetail::Milk { amount_ml: 120.0 },
            ))
            .await
            .unwrap();

        let views = service.records().list_records("b1").await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(service.babies().list_babies().await.unwrap(), vec![baby]);
    }
}
