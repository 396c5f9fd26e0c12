use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Serialize, Serializer};

use crate::error::DecodeError;

/// Wire format of the API timestamps, e.g. `2018-01-18T07:45:58+0100`.
pub const QONTO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

// `%.f` also matches no fraction at all
const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// An instant as returned by the API, keeping the offset it was sent with.
///
/// Equality and ordering compare the absolute instant, so
/// `07:45:58+0100` and `06:45:58+0000` are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QontoTime(DateTime<FixedOffset>);

impl QontoTime {
    /// Decodes `raw`, naming `field` in the error when it is not a timestamp.
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, DecodeError> {
        let raw = raw.trim();

        DateTime::parse_from_str(raw, PARSE_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .map(QontoTime)
            .map_err(|_| DecodeError::Timestamp {
                field,
                value: raw.to_owned(),
            })
    }

    pub fn as_utc(&self) -> DateTime<Utc> {
        self.0.to_utc()
    }

    pub fn offset(&self) -> FixedOffset {
        *self.0.offset()
    }
}

impl From<DateTime<FixedOffset>> for QontoTime {
    fn from(value: DateTime<FixedOffset>) -> Self {
        QontoTime(value)
    }
}

impl From<DateTime<Utc>> for QontoTime {
    fn from(value: DateTime<Utc>) -> Self {
        QontoTime(value.fixed_offset())
    }
}

impl fmt::Display for QontoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(QONTO_TIME_FORMAT))
    }
}

impl Serialize for QontoTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
