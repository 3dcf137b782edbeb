//! Port for market data access.

use chrono::{DateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::error::PerpsimError;
use crate::domain::timeframe::Timeframe;

/// Access to stored and streaming market data for one venue.
///
/// Backtests pull a whole base-timeframe series up front with [`candles`];
/// forward tests poll [`next_candle`] and mark open positions against
/// [`latest_price`]. Historical stores leave the streaming methods at
/// their defaults.
///
/// [`candles`]: DataFeed::candles
/// [`next_candle`]: DataFeed::next_candle
/// [`latest_price`]: DataFeed::latest_price
pub trait DataFeed {
    /// Returns candles for `symbol` at `timeframe` with `start <= timestamp < end`,
    /// in ascending timestamp order.
    fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, PerpsimError>;

    /// Returns the earliest timestamp, latest timestamp, and row count stored
    /// for `symbol` at `timeframe`, or `None` when nothing is stored.
    fn data_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, PerpsimError>;

    /// Returns the next unseen base-timeframe candle for `symbol`, or `None`
    /// when no new candle has completed yet.
    fn next_candle(&mut self, _symbol: &str) -> Result<Option<Candle>, PerpsimError> {
        Ok(None)
    }

    /// Returns the most recent traded price for `symbol`.
    fn latest_price(&self, symbol: &str) -> Result<f64, PerpsimError> {
        Err(PerpsimError::NoData {
            symbol: symbol.to_string(),
            timeframe: Timeframe::BASE,
        })
    }
}
