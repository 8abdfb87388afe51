use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position ID, derived from the local time of generation (`YYYYMMDD-HHMMSS`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub String);

impl PositionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Base id for a timestamp, before any collision suffix.
    pub fn from_timestamp(ts: NaiveDateTime) -> Self {
        Self(ts.format("%Y%m%d-%H%M%S").to_string())
    }

    /// The `n`-th alternative for a colliding base id (`n >= 2`).
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PositionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn timestamp_format() {
        let ts = NaiveDate::from_ymd_opt(2026, 2, 27)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        assert_eq!(PositionId::from_timestamp(ts).as_str(), "20260227-090503");
    }

    #[test]
    fn suffix_appends_counter() {
        let id = PositionId::new("20260227-090503");
        assert_eq!(id.with_suffix(2).as_str(), "20260227-090503-2");
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&PositionId::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
