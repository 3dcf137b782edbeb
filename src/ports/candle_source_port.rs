//! Port for range-bounded candle retrieval.

use chrono::{DateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::error::PerpsimError;
use crate::domain::timeframe::Timeframe;

/// Supplies candles for an arbitrary timeframe and time range.
///
/// The stop/take-profit resolver drills into finer timeframes one span at
/// a time, so implementations must answer repeated small-range queries
/// cheaply. Candles are returned in ascending timestamp order, half-open
/// on the end bound: `start <= timestamp < end`.
pub trait CandleSource {
    fn fetch(
        &self,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, PerpsimError>;
}
