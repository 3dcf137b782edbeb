//! Simulation engine: drives base candles through aggregation, exit
//! checks, the strategy, and the fill policy.
//!
//! Backtest and forward runs share one loop; they differ only in where
//! candles come from and which [`FillPolicy`] prices the fills.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::aggregator::TimeframeAggregator;
use crate::domain::candle::Candle;
use crate::domain::error::PerpsimError;
use crate::domain::execution::FillPolicy;
use crate::domain::ledger::{Ledger, Rejection};
use crate::domain::metrics::Metrics;
use crate::domain::position::{ExitReason, Position, Side, Trade};
use crate::domain::signal::Signal;
use crate::domain::sl_tp;
use crate::domain::timeframe::Timeframe;
use crate::ports::candle_source_port::CandleSource;
use crate::ports::data_port::DataFeed;
use crate::ports::event_port::EventSink;
use crate::ports::strategy_port::Strategy;

/// Minimum warm-up in base candles, regardless of declared timeframes.
const MIN_WARM_UP_BARS: i64 = 100;

/// Run-level settings independent of strategy parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub symbol: String,
    pub initial_balance: f64,
    /// Per-period risk-free rate fed into the Sharpe ratio.
    pub risk_free_rate: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            symbol: "BTCUSDT".to_string(),
            initial_balance: 10_000.0,
            risk_free_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    Backtest,
    Forward,
}

impl SimMode {
    pub fn label(&self) -> &'static str {
        match self {
            SimMode::Backtest => "backtest",
            SimMode::Forward => "forward",
        }
    }
}

/// A single point on the equity curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// A signal the ledger refused, kept for the run audit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RejectionRecord {
    pub timestamp: DateTime<Utc>,
    pub signal: Signal,
    pub rejection: Rejection,
}

/// Events published to sinks as the simulation produces them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    PositionOpened(Position),
    PositionClosed(Trade),
    /// The closed trade's exit was decided by the conservative stop-first
    /// fallback rather than finer data.
    AmbiguousExit(Trade),
    SignalRejected(RejectionRecord),
    EquitySample(EquityPoint),
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub mode: SimMode,
    pub symbol: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub initial_balance: f64,
    pub final_equity: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub rejections: Vec<RejectionRecord>,
    pub metrics: Metrics,
}

impl BacktestReport {
    /// Fixed-width text block for terminals and logs.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(50);
        let profit_factor = if self.metrics.profit_factor.is_infinite() {
            "inf".to_string()
        } else {
            format!("{:.2}", self.metrics.profit_factor)
        };
        let title = match self.mode {
            SimMode::Backtest => "BACKTEST RESULTS",
            SimMode::Forward => "FORWARD TEST RESULTS",
        };
        let lines = [
            rule.clone(),
            title.to_string(),
            rule.clone(),
            format!("Symbol:          {}", self.symbol),
            format!(
                "Period:          {} to {}",
                self.start_time.format("%Y-%m-%d %H:%M"),
                self.end_time.format("%Y-%m-%d %H:%M")
            ),
            format!("Initial Balance: ${:.2}", self.initial_balance),
            format!("Final Equity:    ${:.2}", self.final_equity),
            format!(
                "Total Return:    {:+.2}%",
                self.metrics.total_return * 100.0
            ),
            format!("Total Trades:    {}", self.metrics.total_trades),
            format!("Win Rate:        {:.1}%", self.metrics.win_rate * 100.0),
            format!("Profit Factor:   {profit_factor}"),
            format!(
                "Max Drawdown:    {:.2}%",
                self.metrics.max_drawdown * 100.0
            ),
            format!("Sharpe Ratio:    {:.2}", self.metrics.sharpe_ratio),
            format!("Rejected:        {}", self.rejections.len()),
            rule,
        ];
        lines.join("\n")
    }
}

enum Applied {
    Opened(Position),
    Closed(Trade),
}

/// Orchestrates one simulation run.
///
/// Per base candle, in order: ingest into the aggregator, check open
/// positions for stop/target exits (oldest first, at exact level
/// prices), hand the full view to the strategy, apply its signals
/// through the fill policy, then sample equity. Rejected signals are
/// recorded and skipped; the run itself only fails on data or
/// accounting errors.
pub struct Engine {
    config: SimConfig,
    strategy: Box<dyn Strategy>,
    fill: Box<dyn FillPolicy>,
    sinks: Vec<Box<dyn EventSink>>,
    ledger: Ledger,
    aggregator: TimeframeAggregator,
    equity_curve: Vec<EquityPoint>,
    rejections: Vec<RejectionRecord>,
}

impl Engine {
    pub fn new(
        config: SimConfig,
        strategy: Box<dyn Strategy>,
        fill: Box<dyn FillPolicy>,
    ) -> Self {
        let aggregator = TimeframeAggregator::new(strategy.timeframes());
        let ledger = Ledger::new(config.initial_balance);
        Engine {
            config,
            strategy,
            fill,
            sinks: Vec::new(),
            ledger,
            aggregator,
            equity_curve: Vec::new(),
            rejections: Vec::new(),
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Runs over a pre-fetched base-candle series and reports.
    ///
    /// The leading candles warm up the aggregator without trading; the
    /// strategy's `on_init` sees the view as of the last warm-up candle.
    /// Any position still open after the last candle is force-closed at
    /// its close (reason `signal`).
    pub fn run_backtest(
        &mut self,
        candles: &[Candle],
        source: &dyn CandleSource,
    ) -> Result<BacktestReport, PerpsimError> {
        if candles.is_empty() {
            return Err(PerpsimError::NoData {
                symbol: self.config.symbol.clone(),
                timeframe: Timeframe::BASE,
            });
        }

        let warm_up = self.warm_up_bars();
        if candles.len() <= warm_up {
            return Err(PerpsimError::Data {
                reason: format!(
                    "warm-up needs {warm_up} candles before the first tradable one, got {}",
                    candles.len()
                ),
            });
        }
        let (warm_up_candles, live) = candles.split_at(warm_up);

        info!(
            symbol = %self.config.symbol,
            start = %live[0].timestamp,
            end = %live[live.len() - 1].timestamp,
            candles = live.len(),
            warm_up,
            "starting backtest"
        );

        self.aggregator.warm_up(warm_up_candles)?;
        self.strategy.on_init(&self.aggregator.view());

        for candle in live {
            self.aggregator.ingest(candle)?;
            self.check_exits(candle, source)?;
            let signals = {
                let view = self.aggregator.view();
                self.strategy.on_candle(&view, &self.ledger)
            };
            for signal in &signals {
                self.apply_signal(signal, candle, candle.close)?;
            }
            self.sample_equity(candle.timestamp, candle.close);
        }

        let last = &live[live.len() - 1];
        self.close_all(last.close, last.timestamp)?;

        let report = self.build_report(
            SimMode::Backtest,
            live[0].timestamp,
            last.timestamp,
            last.close,
        );
        info!("backtest complete\n{}", report.summary());
        Ok(report)
    }

    /// Runs against a live-style feed until it stops yielding candles.
    ///
    /// The same loop as [`run_backtest`], except fills price off the
    /// feed's latest traded price and positions left open at the end stay
    /// open; a paper session ending is not an exit signal.
    ///
    /// [`run_backtest`]: Engine::run_backtest
    pub fn run_forward<F>(&mut self, feed: &mut F) -> Result<BacktestReport, PerpsimError>
    where
        F: DataFeed + CandleSource,
    {
        let symbol = self.config.symbol.clone();
        let warm_up = self.warm_up_bars();

        info!(symbol = %symbol, warm_up, "starting forward test");

        let mut seen = 0usize;
        let mut first_live: Option<DateTime<Utc>> = None;
        let mut last: Option<Candle> = None;

        while let Some(candle) = feed.next_candle(&symbol)? {
            self.aggregator.ingest(&candle)?;
            seen += 1;
            if seen < warm_up {
                continue;
            }
            if seen == warm_up {
                self.strategy.on_init(&self.aggregator.view());
                continue;
            }

            let mark = feed.latest_price(&symbol)?;
            self.check_exits(&candle, &*feed)?;
            let signals = {
                let view = self.aggregator.view();
                self.strategy.on_candle(&view, &self.ledger)
            };
            for signal in &signals {
                self.apply_signal(signal, &candle, mark)?;
            }
            self.sample_equity(candle.timestamp, mark);

            first_live.get_or_insert(candle.timestamp);
            last = Some(candle);
        }

        let (Some(start_time), Some(last)) = (first_live, last) else {
            return Err(PerpsimError::Data {
                reason: format!("feed for {symbol} ended before the {warm_up}-candle warm-up"),
            });
        };

        let last_price = feed.latest_price(&symbol)?;
        let report = self.build_report(SimMode::Forward, start_time, last.timestamp, last_price);
        info!("forward test complete\n{}", report.summary());
        Ok(report)
    }

    /// Warm-up length in base candles: one full candle of the coarsest
    /// declared timeframe, floored at [`MIN_WARM_UP_BARS`].
    fn warm_up_bars(&self) -> usize {
        let coarsest = self
            .strategy
            .timeframes()
            .iter()
            .map(|tf| tf.minutes())
            .max()
            .unwrap_or(1);
        coarsest.max(MIN_WARM_UP_BARS) as usize
    }

    /// Checks open positions, oldest first, against the new base candle.
    /// Exits fill at the exact stop or target price.
    fn check_exits(
        &mut self,
        candle: &Candle,
        source: &dyn CandleSource,
    ) -> Result<(), PerpsimError> {
        // Snapshot so closing does not disturb the iteration order.
        let open: Vec<Position> = self.ledger.positions().to_vec();
        for position in open {
            let Some(resolution) = sl_tp::evaluate(&position, candle, Timeframe::BASE, source)?
            else {
                continue;
            };
            let price = match resolution.reason {
                ExitReason::TakeProfit => position.take_profit,
                _ => position.stop_loss,
            };
            let trade = self
                .ledger
                .close(position.id, price, candle.timestamp, resolution.reason)
                .map_err(|rejection| PerpsimError::Data {
                    reason: format!("exit close of {} rejected: {rejection}", position.id),
                })?;
            debug!(
                position = trade.id.0,
                reason = trade.exit_reason.label(),
                price,
                pnl = trade.pnl,
                "position closed by level"
            );
            if resolution.ambiguous {
                self.publish(&EngineEvent::AmbiguousExit(trade));
            }
            self.publish(&EngineEvent::PositionClosed(trade));
            self.check_balance()?;
        }
        Ok(())
    }

    /// Applies one strategy signal through the fill policy. Rejections
    /// are recorded and published, never fatal.
    fn apply_signal(
        &mut self,
        signal: &Signal,
        candle: &Candle,
        mark_price: f64,
    ) -> Result<(), PerpsimError> {
        let price = self.fill.fill_price(candle, mark_price);
        let time = self.fill.fill_time(candle);

        let applied = match *signal {
            Signal::OpenLong {
                size_percent,
                stop_loss,
                take_profit,
            } => self
                .ledger
                .open(Side::Long, size_percent, stop_loss, take_profit, price, time)
                .map(Applied::Opened),
            Signal::OpenShort {
                size_percent,
                stop_loss,
                take_profit,
            } => self
                .ledger
                .open(Side::Short, size_percent, stop_loss, take_profit, price, time)
                .map(Applied::Opened),
            Signal::Close { position_id } => {
                match position_id.or_else(|| self.ledger.oldest_position_id()) {
                    Some(id) => self
                        .ledger
                        .close(id, price, time, ExitReason::Signal)
                        .map(Applied::Closed),
                    None => Err(Rejection::NoOpenPosition),
                }
            }
        };

        match applied {
            Ok(Applied::Opened(position)) => {
                self.publish(&EngineEvent::PositionOpened(position));
            }
            Ok(Applied::Closed(trade)) => {
                self.publish(&EngineEvent::PositionClosed(trade));
                self.check_balance()?;
            }
            Err(rejection) => {
                warn!(%rejection, timestamp = %candle.timestamp, "signal rejected");
                let record = RejectionRecord {
                    timestamp: candle.timestamp,
                    signal: *signal,
                    rejection,
                };
                self.rejections.push(record);
                self.publish(&EngineEvent::SignalRejected(record));
            }
        }
        Ok(())
    }

    /// Force-closes every remaining position at `price`.
    fn close_all(&mut self, price: f64, time: DateTime<Utc>) -> Result<(), PerpsimError> {
        while let Some(id) = self.ledger.oldest_position_id() {
            let trade = self
                .ledger
                .close(id, price, time, ExitReason::Signal)
                .map_err(|rejection| PerpsimError::Data {
                    reason: format!("force close of {id} rejected: {rejection}"),
                })?;
            debug!(position = trade.id.0, pnl = trade.pnl, "force-closed at end of run");
            self.publish(&EngineEvent::PositionClosed(trade));
            self.check_balance()?;
        }
        Ok(())
    }

    fn sample_equity(&mut self, timestamp: DateTime<Utc>, price: f64) {
        let point = EquityPoint {
            timestamp,
            equity: self.ledger.equity(price),
        };
        self.equity_curve.push(point);
        self.publish(&EngineEvent::EquitySample(point));
    }

    /// A close can overdraw the ledger only when a short's exit exceeds
    /// twice its entry; there is no liquidation model, so treat it as a
    /// run-ending accounting failure.
    fn check_balance(&self) -> Result<(), PerpsimError> {
        let balance = self.ledger.balance();
        if balance < 0.0 {
            return Err(PerpsimError::NegativeBalance { balance });
        }
        Ok(())
    }

    fn publish(&mut self, event: &EngineEvent) {
        for sink in &mut self.sinks {
            sink.publish(event);
        }
    }

    fn build_report(
        &self,
        mode: SimMode,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        last_price: f64,
    ) -> BacktestReport {
        let metrics = Metrics::compute(
            self.ledger.trades(),
            &self.equity_curve,
            self.ledger.initial_balance(),
            self.config.risk_free_rate,
        );
        BacktestReport {
            mode,
            symbol: self.config.symbol.clone(),
            start_time,
            end_time,
            initial_balance: self.ledger.initial_balance(),
            final_equity: self.ledger.equity(last_price),
            trades: self.ledger.trades().to_vec(),
            equity_curve: self.equity_curve.clone(),
            rejections: self.rejections.clone(),
            metrics,
        }
    }
}
