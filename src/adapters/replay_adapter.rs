//! In-memory candle replay for forward-test sessions.

use chrono::{DateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::error::PerpsimError;
use crate::domain::timeframe::Timeframe;
use crate::ports::candle_source_port::CandleSource;
use crate::ports::data_port::DataFeed;

/// Serves a pre-loaded base-candle series one candle at a time, the way
/// a live feed would. The latest traded price is the close of the last
/// candle yielded, and range queries only ever see candles already
/// replayed, so nothing downstream can peek ahead.
pub struct ReplayFeed {
    candles: Vec<Candle>,
    cursor: usize,
    last_price: Option<f64>,
}

impl ReplayFeed {
    pub fn new(candles: Vec<Candle>) -> Self {
        ReplayFeed {
            candles,
            cursor: 0,
            last_price: None,
        }
    }

    fn replayed(&self) -> &[Candle] {
        &self.candles[..self.cursor]
    }
}

impl DataFeed for ReplayFeed {
    fn candles(
        &self,
        _symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, PerpsimError> {
        if timeframe != Timeframe::BASE {
            return Ok(Vec::new());
        }
        Ok(self
            .replayed()
            .iter()
            .filter(|c| c.timestamp >= start && c.timestamp < end)
            .copied()
            .collect())
    }

    fn data_range(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, PerpsimError> {
        match (self.candles.first(), self.candles.last()) {
            (Some(first), Some(last)) => {
                Ok(Some((first.timestamp, last.timestamp, self.candles.len())))
            }
            _ => Ok(None),
        }
    }

    fn next_candle(&mut self, _symbol: &str) -> Result<Option<Candle>, PerpsimError> {
        let Some(candle) = self.candles.get(self.cursor).copied() else {
            return Ok(None);
        };
        self.cursor += 1;
        self.last_price = Some(candle.close);
        Ok(Some(candle))
    }

    fn latest_price(&self, symbol: &str) -> Result<f64, PerpsimError> {
        self.last_price.ok_or_else(|| PerpsimError::NoData {
            symbol: symbol.to_string(),
            timeframe: Timeframe::BASE,
        })
    }
}

impl CandleSource for ReplayFeed {
    fn fetch(
        &self,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, PerpsimError> {
        if timeframe != Timeframe::BASE {
            return Ok(Vec::new());
        }
        Ok(self
            .replayed()
            .iter()
            .filter(|c| c.timestamp >= start && c.timestamp < end)
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn flat_candle(minute: i64, close: f64) -> Candle {
        Candle {
            timestamp: start() + Duration::minutes(minute),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            open_interest: 0.0,
            cumulative_volume_delta: 0.0,
        }
    }

    fn sample_feed() -> ReplayFeed {
        ReplayFeed::new(vec![
            flat_candle(0, 100.0),
            flat_candle(1, 101.0),
            flat_candle(2, 102.0),
        ])
    }

    #[test]
    fn yields_candles_in_order_then_none() {
        let mut feed = sample_feed();
        assert_eq!(feed.next_candle("BTCUSDT").unwrap().unwrap().timestamp, start());
        assert_eq!(
            feed.next_candle("BTCUSDT").unwrap().unwrap().timestamp,
            start() + Duration::minutes(1)
        );
        assert!(feed.next_candle("BTCUSDT").unwrap().is_some());
        assert!(feed.next_candle("BTCUSDT").unwrap().is_none());
        assert!(feed.next_candle("BTCUSDT").unwrap().is_none());
    }

    #[test]
    fn latest_price_tracks_the_last_yield() {
        let mut feed = sample_feed();
        assert!(matches!(
            feed.latest_price("BTCUSDT"),
            Err(PerpsimError::NoData { .. })
        ));

        feed.next_candle("BTCUSDT").unwrap();
        assert!((feed.latest_price("BTCUSDT").unwrap() - 100.0).abs() < f64::EPSILON);
        feed.next_candle("BTCUSDT").unwrap();
        assert!((feed.latest_price("BTCUSDT").unwrap() - 101.0).abs() < f64::EPSILON);
    }

    #[test]
    fn range_queries_never_reveal_the_future() {
        let mut feed = sample_feed();
        feed.next_candle("BTCUSDT").unwrap();

        let seen = feed
            .fetch(Timeframe::M1, start(), start() + Duration::minutes(10))
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].timestamp, start());
    }

    #[test]
    fn only_the_base_timeframe_has_data() {
        let mut feed = sample_feed();
        feed.next_candle("BTCUSDT").unwrap();
        let coarser = feed
            .fetch(Timeframe::H1, start(), start() + Duration::hours(5))
            .unwrap();
        assert!(coarser.is_empty());
    }

    #[test]
    fn data_range_covers_the_whole_series() {
        let feed = sample_feed();
        let (first, last, count) = feed
            .data_range("BTCUSDT", Timeframe::M1)
            .unwrap()
            .unwrap();
        assert_eq!(first, start());
        assert_eq!(last, start() + Duration::minutes(2));
        assert_eq!(count, 3);
    }
}
