use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A baby profile.
///
/// `local_id` is assigned by the client and is the baby's identity for the
/// whole round trip: the remote document carries it in a `cloudId` field,
/// and every remote lookup matches on that field plus the owning user. The
/// application never learns or persists the store's native key for a baby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baby {
    pub local_id: String,
    pub name: String,
    pub birthday: NaiveDate,
}

impl Baby {
    pub fn new(
        local_id: impl Into<String>,
        name: impl Into<String>,
        birthday: NaiveDate,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            name: name.into(),
            birthday,
        }
    }

    /// Checks the fields required before any remote call is made.
    pub fn is_complete(&self) -> bool {
        !self.local_id.trim().is_empty() && !self.name.trim().is_empty()
    }
}

impl fmt::Display for Baby {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (born {})", self.name, self.birthday)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn birthday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_complete_baby() {
        let baby = Baby::new("b1", "Mina", birthday());
        assert!(baby.is_complete());
    }

    #[test]
    fn test_blank_name_is_incomplete() {
        let baby = Baby::new("b1", "  ", birthday());
        assert!(!baby.is_complete());
    }

    #[test]
    fn test_blank_id_is_incomplete() {
        let baby = Baby::new("", "Mina", birthday());
        assert!(!baby.is_complete());
    }

    #[test]
    fn test_display() {
        let baby = Baby::new("b1", "Mina", birthday());
        assert_eq!(format!("{}", baby), "Mina (born 2024-01-01)");
    }
}
