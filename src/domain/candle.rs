//! Candle record for perpetual futures market data.

use chrono::{DateTime, Utc};

use crate::domain::error::PerpsimError;
use crate::domain::timeframe::Timeframe;

/// One fixed-interval candle: OHLCV plus the two perp-specific series,
/// open interest and cumulative volume delta. `timestamp` is the interval
/// start in UTC. Read-only once produced by ingestion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub open_interest: f64,
    /// Running total of signed volume, not a per-candle delta.
    pub cumulative_volume_delta: f64,
}

impl Candle {
    /// Check the OHLC containment invariant:
    /// `low <= min(open, close) <= max(open, close) <= high`.
    pub fn validate(&self) -> Result<(), PerpsimError> {
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        if self.low > body_low || self.high < body_high {
            return Err(PerpsimError::InvalidCandle {
                timestamp: self.timestamp,
                reason: format!(
                    "OHLC containment violated: open={} high={} low={} close={}",
                    self.open, self.high, self.low, self.close
                ),
            });
        }
        if self.volume < 0.0 {
            return Err(PerpsimError::InvalidCandle {
                timestamp: self.timestamp,
                reason: format!("negative volume {}", self.volume),
            });
        }
        Ok(())
    }
}

/// Check that a series is strictly increasing and evenly spaced by
/// `timeframe`'s interval. Duplicates, reordering, and gaps all fail.
pub fn validate_series(candles: &[Candle], timeframe: Timeframe) -> Result<(), PerpsimError> {
    let step = timeframe.duration();
    for pair in candles.windows(2) {
        let expected = pair[0].timestamp + step;
        if pair[1].timestamp != expected {
            return Err(PerpsimError::Sequence {
                expected,
                got: pair[1].timestamp,
            });
        }
    }
    Ok(())
}
