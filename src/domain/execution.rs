//! Fill policies: how signals turn into executed prices and times.
//!
//! Fills are frictionless; the two policies differ only in which price a
//! signal executes at and which clock stamps the fill.

use chrono::{DateTime, Utc};

use super::candle::Candle;

/// Decides the execution price and timestamp for a signal raised on a
/// completed candle.
///
/// `mark_price` is the most recent traded price known to the engine; in a
/// backtest that is the candle's own close, in a forward test it comes
/// from the live feed and may already have moved past the close.
pub trait FillPolicy {
    fn fill_price(&self, candle: &Candle, mark_price: f64) -> f64;
    fn fill_time(&self, candle: &Candle) -> DateTime<Utc>;
}

/// Historical replay fills: every signal executes at the close of the
/// candle that produced it, stamped with that candle's timestamp. Runs
/// over the same data are bit-for-bit identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktestFill;

impl FillPolicy for BacktestFill {
    fn fill_price(&self, candle: &Candle, _mark_price: f64) -> f64 {
        candle.close
    }

    fn fill_time(&self, candle: &Candle) -> DateTime<Utc> {
        candle.timestamp
    }
}

/// Paper-trading fills: signals execute at the latest observed market
/// price and are stamped with the wall clock, mirroring what a live
/// order would have seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaperFill;

impl FillPolicy for PaperFill {
    fn fill_price(&self, _candle: &Candle, mark_price: f64) -> f64 {
        mark_price
    }

    fn fill_time(&self, _candle: &Candle) -> DateTime<Utc> {
        Utc::now()
    }
}
