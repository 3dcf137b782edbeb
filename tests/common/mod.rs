#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use perpsim::domain::aggregator::MarketView;
use perpsim::domain::candle::Candle;
use perpsim::domain::engine::EngineEvent;
use perpsim::domain::error::PerpsimError;
use perpsim::domain::ledger::Ledger;
use perpsim::domain::signal::Signal;
use perpsim::domain::timeframe::Timeframe;
use perpsim::ports::candle_source_port::CandleSource;
use perpsim::ports::event_port::EventSink;
use perpsim::ports::strategy_port::Strategy;
use std::cell::RefCell;
use std::rc::Rc;

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// A candle with no intrabar range: open, high, low and close all sit at
/// `price`. Keeps stop and target levels untouched unless a test moves
/// them on purpose.
pub fn flat_candle(timestamp: DateTime<Utc>, price: f64) -> Candle {
    Candle {
        timestamp,
        open: price,
        high: price,
        low: price,
        close: price,
        volume: 1_000.0,
        open_interest: 0.0,
        cumulative_volume_delta: 0.0,
    }
}

pub fn candle_ohlc(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        timestamp,
        open,
        high,
        low,
        close,
        volume: 1_000.0,
        open_interest: 0.0,
        cumulative_volume_delta: 0.0,
    }
}

/// One flat minute candle per entry in `closes`, starting at `start`.
pub fn minute_series(start: DateTime<Utc>, closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| flat_candle(start + Duration::minutes(i as i64), *close))
        .collect()
}

/// `count` flat minute candles at a single price.
pub fn generate_candles(start: DateTime<Utc>, count: usize, price: f64) -> Vec<Candle> {
    (0..count)
        .map(|i| flat_candle(start + Duration::minutes(i as i64), price))
        .collect()
}

const SCRIPTED_TIMEFRAMES: [Timeframe; 1] = [Timeframe::M1];

/// Strategy that replays a fixed plan: each `(tick, signal)` pair emits
/// `signal` on the given live-candle index. Indifferent to prices, so
/// tests control exactly when positions open and close.
pub struct ScriptedStrategy {
    plan: Vec<(usize, Signal)>,
    tick: usize,
}

impl ScriptedStrategy {
    pub fn new(plan: Vec<(usize, Signal)>) -> Self {
        Self { plan, tick: 0 }
    }
}

impl Strategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn timeframes(&self) -> &[Timeframe] {
        &SCRIPTED_TIMEFRAMES
    }

    fn on_candle(&mut self, _market: &MarketView<'_>, _ledger: &Ledger) -> Vec<Signal> {
        let tick = self.tick;
        self.tick += 1;
        self.plan
            .iter()
            .filter(|(at, _)| *at == tick)
            .map(|(_, signal)| *signal)
            .collect()
    }
}

/// Candle source with nothing to drill into.
pub struct EmptySource;

impl CandleSource for EmptySource {
    fn fetch(
        &self,
        _timeframe: Timeframe,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, PerpsimError> {
        Ok(Vec::new())
    }
}

/// Sink that appends every event to a shared log.
pub struct CollectingSink {
    events: Rc<RefCell<Vec<EngineEvent>>>,
}

impl CollectingSink {
    pub fn new() -> (Self, Rc<RefCell<Vec<EngineEvent>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                events: Rc::clone(&events),
            },
            events,
        )
    }
}

impl EventSink for CollectingSink {
    fn publish(&mut self, event: &EngineEvent) {
        self.events.borrow_mut().push(*event);
    }
}
