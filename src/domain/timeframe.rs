//! Timeframe set and epoch-aligned bucket arithmetic.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use crate::domain::error::PerpsimError;

/// Seconds between the Monday preceding the Unix epoch (1969-12-29) and the
/// epoch itself, which falls on a Thursday. Weekly buckets are shifted by
/// this amount so they open on Monday 00:00 UTC like exchange weekly candles.
const WEEK_EPOCH_SHIFT_SECS: i64 = 3 * 24 * 3600;

/// The fixed timeframe set, ordered finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
    ];

    /// The base interval all coarser candles are aggregated from.
    pub const BASE: Timeframe = Timeframe::M1;

    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
            Timeframe::W1 => 10080,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// The next finer timeframe in the drill-down chain, or `None` at the
    /// base interval.
    pub fn next_finer(&self) -> Option<Timeframe> {
        match self {
            Timeframe::W1 => Some(Timeframe::D1),
            Timeframe::D1 => Some(Timeframe::H4),
            Timeframe::H4 => Some(Timeframe::H1),
            Timeframe::H1 => Some(Timeframe::M15),
            Timeframe::M15 => Some(Timeframe::M5),
            Timeframe::M5 => Some(Timeframe::M1),
            Timeframe::M1 => None,
        }
    }

    /// Start of the bucket containing `timestamp`: floor division of the
    /// seconds-since-epoch by the bucket span. Weekly buckets use the
    /// Monday-shifted epoch; every other timeframe divides the Unix epoch
    /// evenly, so alignment is deterministic and independent of where a
    /// session begins.
    pub fn bucket_start(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let span = self.minutes() * 60;
        let shift = match self {
            Timeframe::W1 => WEEK_EPOCH_SHIFT_SECS,
            _ => 0,
        };
        let secs = timestamp.timestamp() + shift;
        let bucket = secs.div_euclid(span) * span - shift;
        DateTime::UNIX_EPOCH + Duration::seconds(bucket)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = PerpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.label() == s)
            .ok_or_else(|| PerpsimError::UnknownTimeframe {
                label: s.to_string(),
            })
    }
}
