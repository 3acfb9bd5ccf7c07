//! In-memory document store.
//!
//! Implements the full [`DocumentStore`] contract in-process: owner fields,
//! audit timestamps, change fan-out and credential exchange. Used as the
//! remote collaborator in tests and for local-only operation. The call
//! counter and failure switch exist so tests can assert "no remote call was
//! issued" and exercise degraded paths.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{DocumentStore, Fields, Filter, RemoteChange, SortOrder, StoredDocument};
use crate::config::CloudConfig;
use crate::error::RemoteError;
use crate::models::User;

struct Subscriber {
    class: String,
    filters: Vec<Filter>,
    tx: mpsc::UnboundedSender<RemoteChange>,
}

#[derive(Default)]
struct Inner {
    classes: HashMap<String, Vec<StoredDocument>>,
    accounts: HashMap<String, String>,
    subscribers: Vec<Subscriber>,
}

/// In-memory [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remote operations attempted so far, failures included.
    pub fn remote_calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// When set, every subsequent operation fails as unreachable.
    pub fn fail_requests(&self, fail: bool) {
        self.fail.store(fail, AtomicOrdering::SeqCst);
    }

    /// Number of documents currently stored for a class.
    pub fn document_count(&self, class: &str) -> usize {
        let inner = self.inner.lock().expect("store lock poisoned");
        inner.classes.get(class).map_or(0, Vec::len)
    }

    fn checkpoint(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.fail.load(AtomicOrdering::SeqCst) {
            return Err(RemoteError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }

    fn notify(inner: &mut Inner, class: &str, change: &RemoteChange) {
        let doc = match change {
            RemoteChange::Created(d) | RemoteChange::Updated(d) | RemoteChange::Deleted(d) => d,
        };
        inner.subscribers.retain(|sub| {
            if sub.class != class || !sub.filters.iter().all(|f| f.matches(doc)) {
                return true;
            }
            // A closed receiver unregisters the subscription.
            sub.tx.send(change.clone()).is_ok()
        });
    }

    fn now() -> Value {
        Value::from(chrono::Utc::now().to_rfc3339())
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn connect(&self, _config: &CloudConfig) -> Result<(), RemoteError> {
        self.checkpoint()
    }

    async fn create(&self, class: &str, mut fields: Fields) -> Result<StoredDocument, RemoteError> {
        self.checkpoint()?;
        fields.insert("createdAt".to_string(), Self::now());
        fields.insert("updatedAt".to_string(), Self::now());
        let doc = StoredDocument {
            id: Uuid::new_v4().to_string(),
            fields,
        };
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner
            .classes
            .entry(class.to_string())
            .or_default()
            .push(doc.clone());
        Self::notify(&mut inner, class, &RemoteChange::Created(doc.clone()));
        Ok(doc)
    }

    async fn query(
        &self,
        class: &str,
        filters: &[Filter],
        order: Option<SortOrder>,
    ) -> Result<Vec<StoredDocument>, RemoteError> {
        self.checkpoint()?;
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut docs: Vec<StoredDocument> = inner
            .classes
            .get(class)
            .into_iter()
            .flatten()
            .filter(|doc| filters.iter().all(|f| f.matches(doc)))
            .cloned()
            .collect();
        if let Some(SortOrder::Ascending(field)) = order {
            docs.sort_by(|a, b| {
                match (a.fields.get(&field), b.fields.get(&field)) {
                    (Some(x), Some(y)) => compare_values(x, y),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                }
            });
        }
        Ok(docs)
    }

    async fn save(
        &self,
        class: &str,
        id: &str,
        fields: Fields,
    ) -> Result<StoredDocument, RemoteError> {
        self.checkpoint()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let doc = inner
            .classes
            .get_mut(class)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| RemoteError::Invalid(format!("no {} document with id {}", class, id)))?;
        for (key, value) in fields {
            doc.fields.insert(key, value);
        }
        doc.fields.insert("updatedAt".to_string(), Self::now());
        let saved = doc.clone();
        Self::notify(&mut inner, class, &RemoteChange::Updated(saved.clone()));
        Ok(saved)
    }

    async fn destroy(&self, class: &str, id: &str) -> Result<(), RemoteError> {
        self.checkpoint()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let removed = inner.classes.get_mut(class).and_then(|docs| {
            let idx = docs.iter().position(|d| d.id == id)?;
            Some(docs.remove(idx))
        });
        // Destroying an absent document is a success.
        if let Some(doc) = removed {
            Self::notify(&mut inner, class, &RemoteChange::Deleted(doc));
        }
        Ok(())
    }

    async fn destroy_all(&self, class: &str, ids: &[String]) -> Result<(), RemoteError> {
        self.checkpoint()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        for id in ids {
            let removed = inner.classes.get_mut(class).and_then(|docs| {
                let idx = docs.iter().position(|d| &d.id == id)?;
                Some(docs.remove(idx))
            });
            if let Some(doc) = removed {
                Self::notify(&mut inner, class, &RemoteChange::Deleted(doc));
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        class: &str,
        filters: &[Filter],
    ) -> Result<mpsc::UnboundedReceiver<RemoteChange>, RemoteError> {
        self.checkpoint()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.subscribers.push(Subscriber {
            class: class.to_string(),
            filters: filters.to_vec(),
            tx,
        });
        Ok(rx)
    }

    async fn sign_up(&self, username: &str, password: &str) -> Result<User, RemoteError> {
        self.checkpoint()?;
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.accounts.contains_key(username) {
            return Err(RemoteError::UsernameTaken);
        }
        inner
            .accounts
            .insert(username.to_string(), password.to_string());
        Ok(User::new(username, Uuid::new_v4().to_string()))
    }

    async fn log_in(&self, username: &str, password: &str) -> Result<User, RemoteError> {
        self.checkpoint()?;
        let inner = self.inner.lock().expect("store lock poisoned");
        match inner.accounts.get(username) {
            Some(stored) if stored == password => {
                Ok(User::new(username, Uuid::new_v4().to_string()))
            }
            _ => Err(RemoteError::AccessDenied(
                "incorrect username or password".to_string(),
            )),
        }
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.checkpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let doc = store
            .create("Baby", fields(&[("name", Value::from("Mina"))]))
            .await
            .unwrap();

        assert!(!doc.id.is_empty());
        assert!(doc.fields.contains_key("createdAt"));
        assert!(doc.fields.contains_key("updatedAt"));
    }

    #[tokio::test]
    async fn test_query_filters_and_sorts() {
        let store = MemoryStore::new();
        for (baby, time) in [("b1", "2024-03-10T14:00:00"), ("b1", "2024-03-10T09:00:00"), ("b2", "2024-03-10T11:00:00")] {
            store
                .create(
                    "Record",
                    fields(&[("babyId", Value::from(baby)), ("time", Value::from(time))]),
                )
                .await
                .unwrap();
        }

        let docs = store
            .query(
                "Record",
                &[Filter::eq("babyId", "b1")],
                Some(SortOrder::Ascending("time".to_string())),
            )
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].str_field("time"), Some("2024-03-10T09:00:00"));
        assert_eq!(docs[1].str_field("time"), Some("2024-03-10T14:00:00"));
    }

    #[tokio::test]
    async fn test_save_merges_fields() {
        let store = MemoryStore::new();
        let doc = store
            .create("Baby", fields(&[("name", Value::from("Mina"))]))
            .await
            .unwrap();

        let saved = store
            .save("Baby", &doc.id, fields(&[("birthday", Value::from("2024-01-01"))]))
            .await
            .unwrap();

        assert_eq!(saved.str_field("name"), Some("Mina"));
        assert_eq!(saved.str_field("birthday"), Some("2024-01-01"));
    }

    #[tokio::test]
    async fn test_save_missing_document_fails() {
        let store = MemoryStore::new();
        let result = store.save("Baby", "nope", Fields::new()).await;
        assert!(matches!(result, Err(RemoteError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let store = MemoryStore::new();
        let doc = store.create("Record", Fields::new()).await.unwrap();

        store.destroy("Record", &doc.id).await.unwrap();
        store.destroy("Record", &doc.id).await.unwrap();
        assert_eq!(store.document_count("Record"), 0);
    }

    #[tokio::test]
    async fn test_subscribe_receives_matching_changes() {
        let store = MemoryStore::new();
        let mut rx = store
            .subscribe("Record", &[Filter::eq("user", "mina")])
            .await
            .unwrap();

        store
            .create("Record", fields(&[("user", Value::from("mina"))]))
            .await
            .unwrap();
        store
            .create("Record", fields(&[("user", Value::from("otheruser"))]))
            .await
            .unwrap();

        let change = rx.recv().await.unwrap();
        assert!(matches!(change, RemoteChange::Created(d) if d.str_field("user") == Some("mina")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_call_counting_and_failure_injection() {
        let store = MemoryStore::new();
        assert_eq!(store.remote_calls(), 0);

        store.create("Record", Fields::new()).await.unwrap();
        assert_eq!(store.remote_calls(), 1);

        store.fail_requests(true);
        let result = store.query("Record", &[], None).await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
        assert_eq!(store.remote_calls(), 2);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_duplicate_username() {
        let store = MemoryStore::new();
        store.sign_up("mina", "secret99").await.unwrap();
        let result = store.sign_up("mina", "other999").await;
        assert!(matches!(result, Err(RemoteError::UsernameTaken)));
    }

    #[tokio::test]
    async fn test_log_in_checks_password() {
        let store = MemoryStore::new();
        store.sign_up("mina", "secret99").await.unwrap();

        let user = store.log_in("mina", "secret99").await.unwrap();
        assert!(user.has_live_session());

        let result = store.log_in("mina", "wrong").await;
        assert!(matches!(result, Err(RemoteError::AccessDenied(_))));
    }
}
