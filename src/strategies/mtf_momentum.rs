//! Trend-gated momentum: 4h trend filter, 1m crossover entries.

use crate::domain::aggregator::MarketView;
use crate::domain::indicator;
use crate::domain::ledger::Ledger;
use crate::domain::position::Side;
use crate::domain::signal::Signal;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::strategy_port::Strategy;

const TIMEFRAMES: [Timeframe; 2] = [Timeframe::M1, Timeframe::H4];

/// Takes 1m SMA crossovers only in the direction of the 4h trend.
///
/// The trend reads the in-progress 4h close against an SMA of completed
/// 4h candles: above is bullish, below is bearish. A bullish cross up
/// opens a long, a bearish cross down opens a short, and either flips an
/// open position on the other side. Counter-trend crossings are dropped,
/// though the crossover state still advances through them.
#[derive(Debug, Clone)]
pub struct MtfMomentum {
    trend_period: usize,
    fast_period: usize,
    slow_period: usize,
    size_percent: f64,
    sl_percent: f64,
    tp_percent: f64,
    prev_fast: Option<f64>,
    prev_slow: Option<f64>,
}

impl MtfMomentum {
    pub fn new(
        trend_period: usize,
        fast_period: usize,
        slow_period: usize,
        size_percent: f64,
        sl_percent: f64,
        tp_percent: f64,
    ) -> Self {
        MtfMomentum {
            trend_period,
            fast_period,
            slow_period,
            size_percent,
            sl_percent,
            tp_percent,
            prev_fast: None,
            prev_slow: None,
        }
    }

    /// Reads parameters from the `[mtf_momentum]` section, falling back
    /// to a 50-candle trend filter over a 10/30 crossover.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let section = "mtf_momentum";
        MtfMomentum::new(
            config.get_int(section, "trend_period", 50) as usize,
            config.get_int(section, "fast_period", 10) as usize,
            config.get_int(section, "slow_period", 30) as usize,
            config.get_double(section, "size_percent", 100.0),
            config.get_double(section, "sl_percent", 1.5),
            config.get_double(section, "tp_percent", 3.0),
        )
    }
}

impl Strategy for MtfMomentum {
    fn name(&self) -> &str {
        "mtf_momentum"
    }

    fn timeframes(&self) -> &[Timeframe] {
        &TIMEFRAMES
    }

    fn on_candle(&mut self, market: &MarketView<'_>, ledger: &Ledger) -> Vec<Signal> {
        let Ok(h4) = market.timeframe(Timeframe::H4) else {
            return Vec::new();
        };
        let Some(trend_sma) = indicator::sma(h4.history, self.trend_period) else {
            return Vec::new();
        };
        let trend_price = h4.current.close;
        let bullish = trend_price > trend_sma;
        let bearish = trend_price < trend_sma;

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

            if crossed_above && bullish {
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
            } else if crossed_below && bearish {
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
