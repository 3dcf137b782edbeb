//! RSI mean reversion on the 1m chart.

use crate::domain::aggregator::MarketView;
use crate::domain::indicator;
use crate::domain::ledger::Ledger;
use crate::domain::position::Side;
use crate::domain::signal::Signal;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::strategy_port::Strategy;

const TIMEFRAMES: [Timeframe; 1] = [Timeframe::M1];

/// Buys when RSI crosses down into oversold territory and sells when it
/// crosses up into overbought, flipping any open position on the other
/// side. Sitting inside either band does not re-trigger; only the
/// crossing does.
#[derive(Debug, Clone)]
pub struct RsiReversion {
    period: usize,
    overbought: f64,
    oversold: f64,
    size_percent: f64,
    sl_percent: f64,
    tp_percent: f64,
    prev_rsi: Option<f64>,
}

impl RsiReversion {
    pub fn new(
        period: usize,
        overbought: f64,
        oversold: f64,
        size_percent: f64,
        sl_percent: f64,
        tp_percent: f64,
    ) -> Self {
        RsiReversion {
            period,
            overbought,
            oversold,
            size_percent,
            sl_percent,
            tp_percent,
            prev_rsi: None,
        }
    }

    /// Reads parameters from the `[rsi_reversion]` section, falling back
    /// to the classic 14-period 30/70 bands.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let section = "rsi_reversion";
        RsiReversion::new(
            config.get_int(section, "period", 14) as usize,
            config.get_double(section, "overbought", 70.0),
            config.get_double(section, "oversold", 30.0),
            config.get_double(section, "size_percent", 100.0),
            config.get_double(section, "sl_percent", 2.0),
            config.get_double(section, "tp_percent", 4.0),
        )
    }
}

impl Strategy for RsiReversion {
    fn name(&self) -> &str {
        "rsi_reversion"
    }

    fn timeframes(&self) -> &[Timeframe] {
        &TIMEFRAMES
    }

    fn on_candle(&mut self, market: &MarketView<'_>, ledger: &Ledger) -> Vec<Signal> {
        let Ok(m1) = market.timeframe(Timeframe::M1) else {
            return Vec::new();
        };
        let price = m1.current.close;

        let Some(rsi) = indicator::rsi(m1.history, self.period) else {
            return Vec::new();
        };

        let mut signals = Vec::new();
        if let Some(prev_rsi) = self.prev_rsi {
            let crossed_into_oversold = prev_rsi >= self.oversold && rsi < self.oversold;
            let crossed_into_overbought = prev_rsi <= self.overbought && rsi > self.overbought;

            if crossed_into_oversold {
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
            } else if crossed_into_overbought {
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

        self.prev_rsi = Some(rsi);
        signals
    }
}
