//! Port for trading strategies.

use std::fmt;

use crate::domain::aggregator::MarketView;
use crate::domain::ledger::Ledger;
use crate::domain::signal::Signal;
use crate::domain::timeframe::Timeframe;

/// A trading strategy driven by completed candles.
///
/// The engine calls [`on_candle`] once per base-timeframe tick, after
/// aggregation and stop/take-profit checks, passing a read-only view of
/// every declared timeframe and of the ledger. Strategies never mutate
/// state directly; they return [`Signal`]s and the engine applies them
/// through its fill policy.
///
/// [`on_candle`]: Strategy::on_candle
pub trait Strategy {
    /// Short identifier used in config files and reports.
    fn name(&self) -> &str;

    /// Timeframes this strategy reads. The engine aggregates exactly these;
    /// requesting an undeclared timeframe from the view is an error.
    fn timeframes(&self) -> &[Timeframe];

    /// Called once before the first tick, after warm-up candles are loaded.
    fn on_init(&mut self, _market: &MarketView<'_>) {}

    /// Called once per completed base candle. Returns any orders to place,
    /// in the order they should be applied.
    fn on_candle(&mut self, market: &MarketView<'_>, ledger: &Ledger) -> Vec<Signal>;
}

impl fmt::Debug for dyn Strategy + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy").field("name", &self.name()).finish()
    }
}
