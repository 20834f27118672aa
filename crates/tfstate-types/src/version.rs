use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const FORMAT: &str = "%Y%m%d%H%M%S";
const WIDTH: usize = 14;

/// Identifier of a historical state snapshot: UTC `YYYYMMDDHHMMSS`.
///
/// The fixed width makes lexicographic order equal chronological order, so
/// the derived `Ord` on the inner string is also time order. Resolution is
/// one second; two updates of the same ref inside one second map to the same
/// id and the later snapshot replaces the earlier one.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// The id for the current wall-clock second.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(FORMAT).to_string())
    }

    /// Parse and validate an id (exactly 14 digits forming a real instant).
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.len() != WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidVersion(s.to_string()));
        }
        NaiveDateTime::parse_from_str(s, FORMAT)
            .map_err(|_| TypeError::InvalidVersion(s.to_string()))?;
        Ok(Self(s.to_string()))
    }

    /// The instant this id names.
    pub fn timestamp(&self) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(&self.0, FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VersionId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionId> for String {
    fn from(value: VersionId) -> Self {
        value.0
    }
}

impl std::str::FromStr for VersionId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({})", self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn formats_fixed_width_utc() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(VersionId::from_datetime(at).as_str(), "20240307090501");
    }

    #[test]
    fn now_is_parseable() {
        let v = VersionId::now();
        assert_eq!(VersionId::parse(v.as_str()).unwrap(), v);
    }

    #[test]
    fn rejects_malformed() {
        assert!(VersionId::parse("2024030709050").is_err());
        assert!(VersionId::parse("2024030709050x").is_err());
        assert!(VersionId::parse("20241307090501").is_err());
        assert!(VersionId::parse("../../etc/pass").is_err());
    }

    #[test]
    fn timestamp_roundtrip() {
        let at = Utc.with_ymd_and_hms(2031, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(VersionId::from_datetime(at).timestamp(), at);
    }

    proptest! {
        #[test]
        fn string_order_is_time_order(a in 0i64..4_000_000_000, b in 0i64..4_000_000_000) {
            let ta = Utc.timestamp_opt(a, 0).unwrap();
            let tb = Utc.timestamp_opt(b, 0).unwrap();
            let va = VersionId::from_datetime(ta);
            let vb = VersionId::from_datetime(tb);
            prop_assert_eq!(va.cmp(&vb), ta.cmp(&tb));
        }
    }
}
