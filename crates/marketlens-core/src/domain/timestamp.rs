use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::ValidationError;

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    /// Converts upstream epoch seconds (Yahoo market time, publish time).
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        OffsetDateTime::from_unix_timestamp(seconds).ok().map(Self)
    }

    /// Parses a `YYYY-MM-DD` trading day as midnight UTC.
    pub fn from_trading_day(input: &str) -> Option<Self> {
        let format = format_description!("[year]-[month]-[day]");
        let date = Date::parse(input.trim(), &format).ok()?;
        Some(Self(date.midnight().assume_utc()))
    }

    /// Parses RSS `pubDate` values such as `Fri, 31 May 2024 06:00:00 GMT`,
    /// normalizing any offset to UTC.
    pub fn from_rfc2822(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let parsed = OffsetDateTime::parse(trimmed, &Rfc2822).or_else(|error| {
            match trimmed.strip_suffix(" GMT") {
                Some(head) => OffsetDateTime::parse(&format!("{head} +0000"), &Rfc2822),
                None => Err(error),
            }
        });
        parsed.ok().map(|value| Self(value.to_offset(UtcOffset::UTC)))
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("<unformattable>"))
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}
