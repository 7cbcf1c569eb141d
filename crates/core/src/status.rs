//! Record lifecycle status shared by instances and bindings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a persisted instance or binding record.
///
/// Records are never physically deleted. Retiring one flips the status and
/// stamps `ineffective_at`; lookups only ever see `Active` rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Retired,
}

impl RecordStatus {
    /// Column value stored in the metadata tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Retired => "retired",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl FromStr for RecordStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "retired" => Ok(Self::Retired),
            other => Err(crate::Error::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse() {
        assert_eq!("active".parse::<RecordStatus>().unwrap(), RecordStatus::Active);
        assert_eq!("retired".parse::<RecordStatus>().unwrap(), RecordStatus::Retired);
        assert!("deleted".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn test_status_column_values() {
        assert_eq!(RecordStatus::Active.as_str(), "active");
        assert_eq!(RecordStatus::Retired.to_string(), "retired");
        assert!(!RecordStatus::Retired.is_active());
    }
}
