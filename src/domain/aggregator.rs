//! Incremental multi-timeframe candle aggregation.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::domain::candle::Candle;
use crate::domain::error::PerpsimError;
use crate::domain::timeframe::Timeframe;

/// Bars of 1m data in one year; per-timeframe history capacity defaults to
/// the year-equivalent share of this.
const BARS_PER_YEAR_1M: i64 = 525_600;

fn default_capacity(timeframe: Timeframe) -> usize {
    (BARS_PER_YEAR_1M / timeframe.minutes()).max(1) as usize
}

#[derive(Debug, Clone)]
struct Slot {
    timeframe: Timeframe,
    capacity: usize,
    current: Option<Candle>,
    history: VecDeque<Candle>,
}

impl Slot {
    fn new(timeframe: Timeframe, capacity: usize) -> Self {
        Slot {
            timeframe,
            capacity,
            current: None,
            history: VecDeque::new(),
        }
    }

    fn apply(&mut self, base: &Candle) {
        if self.timeframe == Timeframe::BASE {
            // The base interval completes every tick: the candle goes
            // straight into history and doubles as `current`.
            self.push_completed(*base);
            self.current = Some(*base);
            return;
        }

        let bucket = self.timeframe.bucket_start(base.timestamp);
        match &mut self.current {
            Some(current) if current.timestamp == bucket => {
                current.high = current.high.max(base.high);
                current.low = current.low.min(base.low);
                current.close = base.close;
                current.volume += base.volume;
                current.open_interest = base.open_interest;
                // CVD is already a running total; keep the latest value.
                current.cumulative_volume_delta = base.cumulative_volume_delta;
            }
            _ => {
                if let Some(done) = self.current.take() {
                    trace!(
                        timeframe = self.timeframe.label(),
                        start = %done.timestamp,
                        "completed candle"
                    );
                    self.push_completed(done);
                }
                self.current = Some(Candle {
                    timestamp: bucket,
                    ..*base
                });
            }
        }
    }

    fn push_completed(&mut self, candle: Candle) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(candle);
    }
}

/// Read-only snapshot of one timeframe: the in-progress candle plus
/// completed history (oldest first). For the base timeframe `current` is the
/// most recent completed candle and also the last history entry.
#[derive(Debug, Clone, Copy)]
pub struct TimeframeView<'a> {
    pub current: Candle,
    pub history: &'a VecDeque<Candle>,
}

/// Snapshot over all declared timeframes, handed to strategies each step.
/// Borrows the aggregator, so it cannot outlive the next ingest.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    slots: &'a [Slot],
}

impl<'a> MarketView<'a> {
    /// Look up one declared timeframe. Undeclared timeframes are a typed
    /// error, never a silently constructed default.
    pub fn timeframe(&self, timeframe: Timeframe) -> Result<TimeframeView<'a>, PerpsimError> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.timeframe == timeframe)
            .ok_or(PerpsimError::UndeclaredTimeframe { timeframe })?;
        let current = slot
            .current
            .ok_or(PerpsimError::EmptyTimeframe { timeframe })?;
        Ok(TimeframeView {
            current,
            history: &slot.history,
        })
    }
}

/// Builds coarser candles incrementally from a strictly sequential 1m
/// stream. Each declared timeframe keeps one in-progress candle and a
/// bounded FIFO history of completed ones.
#[derive(Debug, Clone)]
pub struct TimeframeAggregator {
    slots: Vec<Slot>,
    last_ingested: Option<DateTime<Utc>>,
}

impl TimeframeAggregator {
    /// History capacity defaults to a one-year equivalent per timeframe.
    /// An empty declaration falls back to the base timeframe alone.
    pub fn new(timeframes: &[Timeframe]) -> Self {
        Self::build(timeframes, None)
    }

    /// Same declaration rules with a flat history capacity, used when a run
    /// wants shorter (or longer) lookback than the one-year default.
    pub fn with_capacity(timeframes: &[Timeframe], capacity: usize) -> Self {
        Self::build(timeframes, Some(capacity.max(1)))
    }

    fn build(timeframes: &[Timeframe], capacity: Option<usize>) -> Self {
        let mut declared: Vec<Timeframe> = timeframes.to_vec();
        if declared.is_empty() {
            declared.push(Timeframe::BASE);
        }
        declared.sort_unstable();
        declared.dedup();
        let slots = declared
            .into_iter()
            .map(|tf| Slot::new(tf, capacity.unwrap_or_else(|| default_capacity(tf))))
            .collect();
        TimeframeAggregator {
            slots,
            last_ingested: None,
        }
    }

    pub fn declared(&self) -> impl Iterator<Item = Timeframe> + '_ {
        self.slots.iter().map(|s| s.timeframe)
    }

    /// Ingest the next base candle. Candles must arrive exactly once, in
    /// order, spaced by the base interval; anything else is fatal to the
    /// run.
    pub fn ingest(&mut self, candle: &Candle) -> Result<(), PerpsimError> {
        if let Some(last) = self.last_ingested {
            let expected = last + Timeframe::BASE.duration();
            if candle.timestamp != expected {
                return Err(PerpsimError::Sequence {
                    expected,
                    got: candle.timestamp,
                });
            }
        }
        candle.validate()?;

        for slot in &mut self.slots {
            slot.apply(candle);
        }
        self.last_ingested = Some(candle.timestamp);
        Ok(())
    }

    /// Ingest a block of leading history in one call.
    pub fn warm_up(&mut self, candles: &[Candle]) -> Result<(), PerpsimError> {
        for candle in candles {
            self.ingest(candle)?;
        }
        Ok(())
    }

    pub fn view(&self) -> MarketView<'_> {
        MarketView { slots: &self.slots }
    }
}
