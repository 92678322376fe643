//! Time-window resolution for `GET /data/{client_id}`.
//!
//! Resolution order:
//! 1. `start_date` and `end_date` both present: inclusive bound on `created_at`,
//!    passed to the store verbatim, whatever `range` says.
//! 2. otherwise a `range` other than `all`: `created_at >= now - window`.
//! 3. otherwise: no time filter.
//!
//! A lone `start_date` or `end_date` is ignored. When a key repeats, its
//! first value wins.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::AppError;

/// Named relative window over record creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    Day,
    Week,
    Month,
    #[default]
    All,
}

impl TimeRange {
    /// Length of the window, or `None` for [`TimeRange::All`].
    pub fn span(self) -> Option<Duration> {
        match self {
            TimeRange::Day => Some(Duration::days(1)),
            TimeRange::Week => Some(Duration::weeks(1)),
            TimeRange::Month => Some(Duration::days(30)),
            TimeRange::All => None,
        }
    }

    /// Earliest `created_at` still inside the window, measured back from `now`.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.span().map(|span| now - span)
    }
}

impl FromStr for TimeRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(TimeRange::Day),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "all" => Ok(TimeRange::All),
            _ => Err(AppError::validation(
                "Invalid range type. Use 'day', 'week', 'month', or 'all'",
            )),
        }
    }
}

/// The `created_at` predicate handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeFilter {
    /// No time restriction.
    Unbounded,
    /// `created_at >= cutoff`.
    Since(DateTime<Utc>),
    /// `start <= created_at <= end`, both exactly as the client sent them.
    Between { start: String, end: String },
}

/// Query string of `GET /data/{client_id}`.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub range: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl WindowQuery {
    /// Build from raw query pairs, keeping the first value of each key.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        // ---
        let mut query = WindowQuery::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "range" => &mut query.range,
                "start_date" => &mut query.start_date,
                "end_date" => &mut query.end_date,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }

    /// Turn the query string into a store predicate, relative to `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<TimeFilter, AppError> {
        // ---
        if let (Some(start), Some(end)) = (present(&self.start_date), present(&self.end_date)) {
            return Ok(TimeFilter::Between {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        let range = match self.range.as_deref() {
            Some(name) => name.parse::<TimeRange>()?,
            None => TimeRange::All,
        };

        Ok(match range.cutoff(now) {
            Some(cutoff) => TimeFilter::Since(cutoff),
            None => TimeFilter::Unbounded,
        })
    }
}

/// Treat an empty query value the same as a missing one.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
