//! Donchian channel breakout on the 1m chart.

use crate::domain::aggregator::MarketView;
use crate::domain::indicator;
use crate::domain::ledger::Ledger;
use crate::domain::position::Side;
use crate::domain::signal::Signal;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::strategy_port::Strategy;

const TIMEFRAMES: [Timeframe; 1] = [Timeframe::M1];

/// Goes long when the close breaks above the previous candle's channel
/// high, short when it breaks below the channel low. The stop sits at
/// the opposite channel boundary; the target is a multiple of the
/// channel width from the entry. A zero-width channel never signals.
#[derive(Debug, Clone)]
pub struct Breakout {
    period: usize,
    size_percent: f64,
    tp_multiplier: f64,
    prev_upper: Option<f64>,
    prev_lower: Option<f64>,
}

impl Breakout {
    pub fn new(period: usize, size_percent: f64, tp_multiplier: f64) -> Self {
        Breakout {
            period,
            size_percent,
            tp_multiplier,
            prev_upper: None,
            prev_lower: None,
        }
    }

    /// Reads parameters from the `[breakout]` section, falling back to a
    /// 20-candle channel with a 1.5x width target.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let section = "breakout";
        Breakout::new(
            config.get_int(section, "period", 20) as usize,
            config.get_double(section, "size_percent", 100.0),
            config.get_double(section, "tp_multiplier", 1.5),
        )
    }
}

impl Strategy for Breakout {
    fn name(&self) -> &str {
        "breakout"
    }

    fn timeframes(&self) -> &[Timeframe] {
        &TIMEFRAMES
    }

    fn on_candle(&mut self, market: &MarketView<'_>, ledger: &Ledger) -> Vec<Signal> {
        let Ok(m1) = market.timeframe(Timeframe::M1) else {
            return Vec::new();
        };
        let price = m1.current.close;

        let Some((upper, lower)) = indicator::channel(m1.history, self.period) else {
            return Vec::new();
        };
        let width = upper - lower;

        let mut signals = Vec::new();
        if let (Some(prev_upper), Some(prev_lower)) = (self.prev_upper, self.prev_lower) {
            if width > 0.0 {
                if price > prev_upper {
                    for position in ledger.positions() {
                        if position.side == Side::Short {
                            signals.push(Signal::close_position(position.id));
                        }
                    }
                    signals.push(Signal::open_long(
                        self.size_percent,
                        lower,
                        price + width * self.tp_multiplier,
                    ));
                } else if price < prev_lower {
                    for position in ledger.positions() {
                        if position.side == Side::Long {
                            signals.push(Signal::close_position(position.id));
                        }
                    }
                    signals.push(Signal::open_short(
                        self.size_percent,
                        upper,
                        price - width * self.tp_multiplier,
                    ));
                }
            }
        }

        self.prev_upper = Some(upper);
        self.prev_lower = Some(lower);
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregator::TimeframeAggregator;
    use crate::domain::candle::Candle;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// Candle with a one-point range either side of the close.
    fn ranged_candle(minute: i64, close: f64) -> Candle {
        Candle {
            timestamp: start() + Duration::minutes(minute),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1.0,
            open_interest: 0.0,
            cumulative_volume_delta: 0.0,
        }
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

    fn run(
        strategy: &mut Breakout,
        ledger: &Ledger,
        candles: &[Candle],
    ) -> Vec<Vec<Signal>> {
        let mut agg = TimeframeAggregator::new(strategy.timeframes());
        candles
            .iter()
            .map(|candle| {
                agg.ingest(candle).unwrap();
                strategy.on_candle(&agg.view(), ledger)
            })
            .collect()
    }

    fn sample_strategy() -> Breakout {
        Breakout::new(3, 100.0, 1.5)
    }

    #[test]
    fn break_above_the_channel_opens_a_long() {
        let ledger = Ledger::new(10_000.0);
        let candles = [
            ranged_candle(0, 100.0),
            ranged_candle(1, 100.0),
            ranged_candle(2, 100.0),
            ranged_candle(3, 105.0),
        ];
        let ticks = run(&mut sample_strategy(), &ledger, &candles);

        // Channel over the first three candles is (101, 99); the fourth
        // close at 105 clears it.
        assert!(ticks[..3].iter().all(|t| t.is_empty()));
        assert_eq!(ticks[3].len(), 1);
        match ticks[3][0] {
            Signal::OpenLong {
                stop_loss,
                take_profit,
                ..
            } => {
                // Stop at the refreshed channel low, target 1.5 widths up
                // from the refreshed (106, 99) channel.
                assert!((stop_loss - 99.0).abs() < f64::EPSILON);
                assert!((take_profit - (105.0 + 7.0 * 1.5)).abs() < 1e-9);
            }
            other => panic!("expected OpenLong, got {other:?}"),
        }
    }

    #[test]
    fn break_below_the_channel_flips_an_open_long() {
        let mut ledger = Ledger::new(10_000.0);
        let position = ledger
            .open(Side::Long, 50.0, 90.0, 120.0, 100.0, start())
            .unwrap();

        let candles = [
            ranged_candle(0, 100.0),
            ranged_candle(1, 100.0),
            ranged_candle(2, 100.0),
            ranged_candle(3, 95.0),
        ];
        let ticks = run(&mut sample_strategy(), &ledger, &candles);

        assert_eq!(ticks[3].len(), 2);
        assert_eq!(ticks[3][0], Signal::close_position(position.id));
        match ticks[3][1] {
            Signal::OpenShort {
                stop_loss,
                take_profit,
                ..
            } => {
                assert!((stop_loss - 101.0).abs() < f64::EPSILON);
                assert!((take_profit - (95.0 - 7.0 * 1.5)).abs() < 1e-9);
            }
            other => panic!("expected OpenShort, got {other:?}"),
        }
    }

    #[test]
    fn zero_width_channel_never_signals() {
        let ledger = Ledger::new(10_000.0);
        let candles: Vec<Candle> = (0..6).map(|i| flat_candle(i, 100.0)).collect();
        let ticks = run(&mut sample_strategy(), &ledger, &candles);
        assert!(ticks.iter().all(|t| t.is_empty()));
    }

    #[test]
    fn close_inside_the_channel_is_quiet() {
        let ledger = Ledger::new(10_000.0);
        let candles = [
            ranged_candle(0, 100.0),
            ranged_candle(1, 100.0),
            ranged_candle(2, 100.0),
            ranged_candle(3, 100.5),
        ];
        let ticks = run(&mut sample_strategy(), &ledger, &candles);
        assert!(ticks.iter().all(|t| t.is_empty()));
    }
}
