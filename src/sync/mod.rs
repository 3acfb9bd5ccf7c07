//! Synchronization layer: reconciliation between local entities and remote
//! documents.
//!
//! Each synchronizer consults the session manager, resolves identity where
//! needed, and talks to the remote document service. Timestamps cross the
//! wire as the caller's local civil time and come back unchanged.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

pub mod baby_sync;
pub mod live;
pub mod record_sync;
pub mod settings_sync;

pub use baby_sync::{BabyOutcome, BabySync};
pub use live::{BabyEvent, ChangeNotifier, RecordEvent};
pub use record_sync::RecordSync;
pub use settings_sync::{SettingsOutcome, SettingsSync};

pub(crate) const CLASS_BABY: &str = "Baby";
pub(crate) const CLASS_RECORD: &str = "Record";
pub(crate) const CLASS_SETTINGS: &str = "UserSettings";

pub(crate) const FIELD_CLOUD_ID: &str = "cloudId";
pub(crate) const FIELD_NAME: &str = "name";
pub(crate) const FIELD_BIRTHDAY: &str = "birthday";
pub(crate) const FIELD_TYPE: &str = "type";
pub(crate) const FIELD_TIME: &str = "time";
pub(crate) const FIELD_AMOUNT: &str = "amount";
pub(crate) const FIELD_START: &str = "start";
pub(crate) const FIELD_END: &str = "end";
pub(crate) const FIELD_DURATION: &str = "duration";
pub(crate) const FIELD_BABY_ID: &str = "babyId";

/// Wire format for civil timestamps. Lexicographic order matches
/// chronological order, so the store can sort on the raw field.
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn encode_time(time: NaiveDateTime) -> Value {
    Value::from(time.format(TIME_FORMAT).to_string())
}

pub(crate) fn decode_time(value: &Value) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.as_str()?, TIME_FORMAT).ok()
}

pub(crate) fn encode_date(date: NaiveDate) -> Value {
    Value::from(date.format(DATE_FORMAT).to_string())
}

pub(crate) fn decode_date(value: &Value) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.as_str()?, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_time_roundtrip() {
        let time = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(13, 45, 30)
            .unwrap();
        let encoded = encode_time(time);
        assert_eq!(encoded, Value::from("2024-03-10T13:45:30"));
        assert_eq!(decode_time(&encoded), Some(time));
    }

    #[test]
    fn test_date_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let encoded = encode_date(date);
        assert_eq!(decode_date(&encoded), Some(date));
    }

    #[test]
    fn test_decode_rejects_non_strings() {
        assert_eq!(decode_time(&Value::from(42)), None);
        assert_eq!(decode_date(&Value::Null), None);
    }
}
