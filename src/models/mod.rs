//! Domain models for the baby tracker.
//!
//! Everything except [`User`] is owned by exactly one user; queries against
//! the remote store are always scoped to the current session's user.

mod baby;
mod record;
mod user;

pub use baby::Baby;
pub use record::{Record, RecordDetail, RecordView};
pub use user::User;

/// Open-ended per-user settings bag.
///
/// Stored as a single remote document per user; reserved bookkeeping keys
/// are stripped when the map is read back.
pub type SettingsMap = serde_json::Map<String, serde_json::Value>;
