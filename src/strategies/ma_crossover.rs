//! Moving-average crossover on the 1m chart.

use crate::domain::aggregator::MarketView;
use crate::domain::indicator;
use crate::domain::ledger::Ledger;
use crate::domain::position::Side;
use crate::domain::signal::Signal;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::strategy_port::Strategy;

const TIMEFRAMES: [Timeframe; 1] = [Timeframe::M1];

/// Goes long when the fast SMA crosses above the slow SMA and short on
/// the opposite cross, flipping any open position on the other side.
/// Stops and targets sit a fixed percentage from the entry price.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    fast_period: usize,
    slow_period: usize,
    size_percent: f64,
    sl_percent: f64,
    tp_percent: f64,
    prev_fast: Option<f64>,
    prev_slow: Option<f64>,
}

impl MaCrossover {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        size_percent: f64,
        sl_percent: f64,
        tp_percent: f64,
    ) -> Self {
        MaCrossover {
            fast_period,
            slow_period,
            size_percent,
            sl_percent,
            tp_percent,
            prev_fast: None,
            prev_slow: None,
        }
    }

    /// Reads parameters from the `[ma_crossover]` section, falling back
    /// to the standard 10/30 setup.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let section = "ma_crossover";
        MaCrossover::new(
            config.get_int(section, "fast_period", 10) as usize,
            config.get_int(section, "slow_period", 30) as usize,
            config.get_double(section, "size_percent", 100.0),
            config.get_double(section, "sl_percent", 2.0),
            config.get_double(section, "tp_percent", 4.0),
        )
    }
}

impl Strategy for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn timeframes(&self) -> &[Timeframe] {
        &TIMEFRAMES
    }

    fn on_candle(&mut self, market: &MarketView<'_>, ledger: &Ledger) -> Vec<Signal> {
        let Ok(m1) = market.timeframe(Timeframe::M1) else {
            return Vec::new();
        };
        let price = m1.current.close;

        let (Some(fast), Some(slow)) = (
            indicator::sma(m1.history, self.fast_period),
            indicator::sma(m1.history, self.slow_period),
        ) else {
            return Vec::new();
        };

        let mut signals = Vec::new();
        if let (Some(prev_fast), Some(prev_slow)) = (self.prev_fast, self.prev_slow) {
            let crossed_above = prev_fast <= prev_slow && fast > slow;
            let crossed_below = prev_fast >= prev_slow && fast < slow;

            if crossed_above {
                for position in ledger.positions() {
                    if position.side == Side::Short {
                        signals.push(Signal::close_position(position.id));
                    }
                }
                signals.push(Signal::open_long(
                    self.size_percent,
                    price * (1.0 - self.sl_percent / 100.0),
                    price * (1.0 + self.tp_percent / 100.0),
                ));
            } else if crossed_below {
                for position in ledger.positions() {
                    if position.side == Side::Long {
                        signals.push(Signal::close_position(position.id));
                    }
                }
                signals.push(Signal::open_short(
                    self.size_percent,
                    price * (1.0 + self.sl_percent / 100.0),
                    price * (1.0 - self.tp_percent / 100.0),
                ));
            }
        }

        self.prev_fast = Some(fast);
        self.prev_slow = Some(slow);
        signals
    }
}
