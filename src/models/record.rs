use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendering used for the display strings attached to record views.
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Type-specific payload of a care record.
///
/// Each variant declares exactly the fields that apply to its record type;
/// there is no shared loosely-typed field bag on the local side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecordDetail {
    /// A feeding with a measured quantity.
    Milk { amount_ml: f64 },
    /// A sleep interval. Open while `end` and `duration_minutes` are absent;
    /// closed once both are set.
    Sleep {
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        duration_minutes: Option<i64>,
    },
    /// Any other record type, carried through with an optional quantity.
    Other {
        kind: String,
        amount: Option<f64>,
    },
}

impl RecordDetail {
    /// Starts an open sleep interval.
    pub fn sleep_open(start: NaiveDateTime) -> Self {
        RecordDetail::Sleep {
            start,
            end: None,
            duration_minutes: None,
        }
    }

    /// Builds a closed sleep interval, deriving the duration from the ends.
    pub fn sleep_closed(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        RecordDetail::Sleep {
            start,
            end: Some(end),
            duration_minutes: Some((end - start).num_minutes()),
        }
    }

    /// The record type string persisted remotely.
    pub fn kind(&self) -> &str {
        match self {
            RecordDetail::Milk { .. } => "milk",
            RecordDetail::Sleep { .. } => "sleep",
            RecordDetail::Other { kind, .. } => kind,
        }
    }

    /// True for a sleep interval that has not been closed yet.
    pub fn is_open_sleep(&self) -> bool {
        matches!(
            self,
            RecordDetail::Sleep {
                end: None,
                duration_minutes: None,
                ..
            }
        )
    }
}

/// A timestamped care record for one baby.
///
/// Unlike [`crate::models::Baby`], a record's identity is the remote store's
/// native key: `id` is `None` until the record has been created remotely,
/// after which the same value addresses it for update and delete.
///
/// `time` (and the sleep ends) are the caller's local civil time. They are
/// persisted and read back as entered, never reinterpreted into UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<String>,
    pub baby_id: String,
    pub time: NaiveDateTime,
    #[serde(flatten)]
    pub detail: RecordDetail,
}

impl Record {
    pub fn new(baby_id: impl Into<String>, time: NaiveDateTime, detail: RecordDetail) -> Self {
        Self {
            id: None,
            baby_id: baby_id.into(),
            time,
            detail,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} record at {}", self.detail.kind(), self.time)
    }
}

/// A record plus display renderings computed at read time.
///
/// The display strings are derived whenever records are listed or a change
/// event is normalized; they are never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordView {
    pub record: Record,
    pub display_time: String,
    pub display_start: Option<String>,
    pub display_end: Option<String>,
}

impl RecordView {
    pub fn from_record(record: Record) -> Self {
        let display_time = record.time.format(DISPLAY_FORMAT).to_string();
        let (display_start, display_end) = match &record.detail {
            RecordDetail::Sleep { start, end, .. } => (
                Some(start.format(DISPLAY_FORMAT).to_string()),
                end.map(|e| e.format(DISPLAY_FORMAT).to_string()),
            ),
            _ => (None, None),
        };
        Self {
            record,
            display_time,
            display_start,
            display_end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_open_sleep() {
        let detail = RecordDetail::sleep_open(t(13, 0));
        assert!(detail.is_open_sleep());
        assert_eq!(detail.kind(), "sleep");
    }

    #[test]
    fn test_closed_sleep_derives_duration() {
        let detail = RecordDetail::sleep_closed(t(13, 0), t(14, 30));
        assert!(!detail.is_open_sleep());
        match detail {
            RecordDetail::Sleep {
                duration_minutes, ..
            } => assert_eq!(duration_minutes, Some(90)),
            _ => panic!("expected sleep"),
        }
    }

    #[test]
    fn test_record_starts_without_id() {
        let record = Record::new("b1", t(9, 0), RecordDetail::Milk { amount_ml: 120.0 });
        assert!(record.id.is_none());

        let created = record.with_id("rec-1");
        assert_eq!(created.id.as_deref(), Some("rec-1"));
    }

    #[test]
    fn test_view_display_strings() {
        let record = Record::new("b1", t(13, 0), RecordDetail::sleep_closed(t(13, 0), t(14, 30)));
        let view = RecordView::from_record(record);

        assert_eq!(view.display_time, "2024-03-10 13:00");
        assert_eq!(view.display_start.as_deref(), Some("2024-03-10 13:00"));
        assert_eq!(view.display_end.as_deref(), Some("2024-03-10 14:30"));
    }

    #[test]
    fn test_milk_view_has_no_interval_strings() {
        let record = Record::new("b1", t(9, 0), RecordDetail::Milk { amount_ml: 120.0 });
        let view = RecordView::from_record(record);

        assert!(view.display_start.is_none());
        assert!(view.display_end.is_none());
    }

    #[test]
    fn test_record_json_roundtrip() {
        let record = Record::new("b1", t(13, 0), RecordDetail::sleep_open(t(13, 0)));
        let json = serde_json::to_string(&record).unwrap();
        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
