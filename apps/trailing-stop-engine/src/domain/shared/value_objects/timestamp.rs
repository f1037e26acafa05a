//! Wall-clock instants recorded in trailing-stop state.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// UTC instant of an observation, transition or exit attempt.
///
/// Persisted as RFC 3339, so it stays meaningful across restarts (unlike
/// `std::time::Instant`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse an RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns error if the string is not valid RFC 3339.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Time elapsed from `earlier` to `self`. Zero if `earlier` is later
    /// (clock stepped backwards).
    #[must_use]
    pub fn elapsed_since(&self, earlier: Self) -> Duration {
        (self.0 - earlier.0).to_std().unwrap_or(Duration::ZERO)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}
