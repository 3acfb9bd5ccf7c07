//! Remote document service abstraction.
//!
//! The backend is an opaque collaborator offering typed document CRUD,
//! equality queries, change subscriptions and credential exchange. The sync
//! layer only depends on this trait; `memory` provides an in-process
//! implementation used in tests and for local-only operation.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::config::CloudConfig;
use crate::error::RemoteError;
use crate::models::User;

pub mod memory;

pub use memory::MemoryStore;

/// Loosely structured field bag of a remote document.
pub type Fields = Map<String, Value>;

/// Document field holding the owning user.
pub const FIELD_OWNER: &str = "user";
/// Bookkeeping keys the store maintains on every document.
pub const RESERVED_KEYS: [&str; 4] = [FIELD_OWNER, "createdAt", "updatedAt", "ACL"];

/// A document as the remote store holds it: native key plus fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Fields,
}

impl StoredDocument {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }
}

/// Equality filter on a document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns true if the document carries exactly this field value.
    pub fn matches(&self, doc: &StoredDocument) -> bool {
        doc.fields.get(&self.field) == Some(&self.value)
    }
}

/// Result ordering. Ascending is the only ordering this layer needs.
#[derive(Debug, Clone, PartialEq)]
pub enum SortOrder {
    Ascending(String),
}

/// A change observed on a remote subscription.
///
/// Deletions carry the full document as it was before removal, so consumers
/// can identify entities by a field rather than the native key.
#[derive(Debug, Clone)]
pub enum RemoteChange {
    Created(StoredDocument),
    Updated(StoredDocument),
    Deleted(StoredDocument),
}

/// Multiplicity of an equality lookup that should be unique.
///
/// `Many` is a data-integrity anomaly: the "take the first, log it" policy
/// is decided at each call site, never inside a query wrapper.
#[derive(Debug, Clone)]
pub enum Match<T> {
    None,
    One(T),
    Many(Vec<T>),
}

impl<T> Match<T> {
    pub fn from_vec(mut items: Vec<T>) -> Self {
        match items.len() {
            0 => Match::None,
            1 => Match::One(items.remove(0)),
            _ => Match::Many(items),
        }
    }
}

/// The remote document service.
///
/// All operations are independently awaitable request/response exchanges;
/// no timeout or cancellation is layered on top of the store's own.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// One-time connection setup. Must be idempotent; callers may race.
    async fn connect(&self, config: &CloudConfig) -> Result<(), RemoteError>;

    /// Creates a document of the given class and returns it with its
    /// store-assigned key.
    async fn create(&self, class: &str, fields: Fields) -> Result<StoredDocument, RemoteError>;

    /// Returns every document of `class` matching all `filters`, optionally
    /// ordered.
    async fn query(
        &self,
        class: &str,
        filters: &[Filter],
        order: Option<SortOrder>,
    ) -> Result<Vec<StoredDocument>, RemoteError>;

    /// Merges `fields` into the document addressed by its native key.
    async fn save(
        &self,
        class: &str,
        id: &str,
        fields: Fields,
    ) -> Result<StoredDocument, RemoteError>;

    /// Removes a document by native key. Removing a document that does not
    /// exist is a success.
    async fn destroy(&self, class: &str, id: &str) -> Result<(), RemoteError>;

    /// Removes many documents by native key.
    async fn destroy_all(&self, class: &str, ids: &[String]) -> Result<(), RemoteError>;

    /// Opens a standing change subscription for documents of `class`
    /// matching all `filters`. Delivery ends when the receiver is dropped;
    /// there is no auto-reconnect.
    async fn subscribe(
        &self,
        class: &str,
        filters: &[Filter],
    ) -> Result<mpsc::UnboundedReceiver<RemoteChange>, RemoteError>;

    /// Registers a new account and returns its signed-in identity.
    async fn sign_up(&self, username: &str, password: &str) -> Result<User, RemoteError>;

    /// Exchanges credentials for a signed-in identity.
    async fn log_in(&self, username: &str, password: &str) -> Result<User, RemoteError>;

    /// Invalidates the current session on the server side.
    async fn sign_out(&self) -> Result<(), RemoteError>;
}
