//! Stop-loss and take-profit monitoring with finer-timeframe disambiguation.

use tracing::debug;

use crate::domain::candle::Candle;
use crate::domain::error::PerpsimError;
use crate::domain::position::{ExitReason, Position, Side};
use crate::domain::timeframe::Timeframe;
use crate::ports::candle_source_port::CandleSource;

/// Which protective level(s) a candle's range reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch {
    Neither,
    StopLoss,
    TakeProfit,
    Both,
}

/// Outcome of resolving a candle against a position's levels.
///
/// `ambiguous` marks exits decided by the conservative fallback rather
/// than by actual finer data: the candle reached both levels, no finer
/// series settled the order, and the stop was assumed to fill first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub reason: ExitReason,
    pub ambiguous: bool,
}

impl Resolution {
    fn clean(reason: ExitReason) -> Self {
        Resolution {
            reason,
            ambiguous: false,
        }
    }

    fn assumed_stop() -> Self {
        Resolution {
            reason: ExitReason::StopLoss,
            ambiguous: true,
        }
    }
}

/// Compares a candle's extremes against the position's levels.
///
/// Touches are boundary-inclusive: a low exactly at a long's stop, or a
/// high exactly at its target, counts as reached. Shorts mirror: the
/// stop sits above entry and trips on `high`, the target below and
/// trips on `low`.
pub fn touched(position: &Position, candle: &Candle) -> Touch {
    let (stop_hit, target_hit) = match position.side {
        Side::Long => (
            candle.low <= position.stop_loss,
            candle.high >= position.take_profit,
        ),
        Side::Short => (
            candle.high >= position.stop_loss,
            candle.low <= position.take_profit,
        ),
    };
    match (stop_hit, target_hit) {
        (false, false) => Touch::Neither,
        (true, false) => Touch::StopLoss,
        (false, true) => Touch::TakeProfit,
        (true, true) => Touch::Both,
    }
}

/// Checks one candle against a position and decides any exit.
///
/// Returns `None` when neither level was reached. A single touch is
/// decisive on its own; a double touch is handed to [`resolve`] to
/// establish which level traded first.
pub fn evaluate(
    position: &Position,
    candle: &Candle,
    timeframe: Timeframe,
    source: &dyn CandleSource,
) -> Result<Option<Resolution>, PerpsimError> {
    match touched(position, candle) {
        Touch::Neither => Ok(None),
        Touch::StopLoss => Ok(Some(Resolution::clean(ExitReason::StopLoss))),
        Touch::TakeProfit => Ok(Some(Resolution::clean(ExitReason::TakeProfit))),
        Touch::Both => resolve(position, candle, timeframe, source).map(Some),
    }
}

/// Orders a double touch by drilling into the next finer timeframe.
///
/// Fetches the finer candles covering exactly this candle's span and
/// walks them in time order; the first single touch decides the exit. A
/// finer candle that again reaches both levels recurses another level
/// down. When no finer timeframe exists, the fetch comes back empty, or
/// the finer series never confirms either touch, the stop is assumed to
/// have filled first and the resolution is flagged ambiguous.
pub fn resolve(
    position: &Position,
    candle: &Candle,
    timeframe: Timeframe,
    source: &dyn CandleSource,
) -> Result<Resolution, PerpsimError> {
    let Some(finer) = timeframe.next_finer() else {
        debug!(
            position = position.id.0,
            timeframe = %timeframe,
            timestamp = %candle.timestamp,
            "both levels inside one base candle, assuming stop filled first"
        );
        return Ok(Resolution::assumed_stop());
    };

    let start = candle.timestamp;
    let end = start + timeframe.duration();
    let children = source.fetch(finer, start, end)?;
    if children.is_empty() {
        debug!(
            position = position.id.0,
            timeframe = %finer,
            timestamp = %candle.timestamp,
            "no finer candles for span, assuming stop filled first"
        );
        return Ok(Resolution::assumed_stop());
    }

    for child in &children {
        match touched(position, child) {
            Touch::Neither => continue,
            Touch::StopLoss => return Ok(Resolution::clean(ExitReason::StopLoss)),
            Touch::TakeProfit => return Ok(Resolution::clean(ExitReason::TakeProfit)),
            Touch::Both => return resolve(position, child, finer, source),
        }
    }

    // The coarse candle reached both levels but its children reached
    // neither; the series disagree, so fall back conservatively.
    debug!(
        position = position.id.0,
        timeframe = %finer,
        timestamp = %candle.timestamp,
        "finer candles never reached either level, assuming stop filled first"
    );
    Ok(Resolution::assumed_stop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::PositionId;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        // A Monday, so every timeframe bucket is aligned.
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn candle_at(ts: DateTime<Utc>, low: f64, high: f64) -> Candle {
        Candle {
            timestamp: ts,
            open: (low + high) / 2.0,
            high,
            low,
            close: (low + high) / 2.0,
            volume: 1.0,
            open_interest: 0.0,
            cumulative_volume_delta: 0.0,
        }
    }

    fn long(stop: f64, target: f64) -> Position {
        Position {
            id: PositionId(1),
            side: Side::Long,
            entry_price: 100_000.0,
            entry_time: start(),
            size: 0.05,
            size_usd: 5_000.0,
            stop_loss: stop,
            take_profit: target,
        }
    }

    fn short(stop: f64, target: f64) -> Position {
        Position {
            side: Side::Short,
            stop_loss: stop,
            take_profit: target,
            ..long(0.0, 0.0)
        }
    }

    /// In-memory source keyed by timeframe; `fetch` applies the half-open
    /// range filter the real adapters apply.
    struct FixedSource {
        series: Vec<(Timeframe, Vec<Candle>)>,
    }

    impl FixedSource {
        fn empty() -> Self {
            FixedSource { series: Vec::new() }
        }
    }

    impl CandleSource for FixedSource {
        fn fetch(
            &self,
            timeframe: Timeframe,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Candle>, PerpsimError> {
            Ok(self
                .series
                .iter()
                .find(|(tf, _)| *tf == timeframe)
                .map(|(_, candles)| {
                    candles
                        .iter()
                        .copied()
                        .filter(|c| c.timestamp >= start && c.timestamp < end)
                        .collect()
                })
                .unwrap_or_default())
        }
    }

    #[test]
    fn range_inside_levels_touches_neither() {
        let pos = long(95_000.0, 105_000.0);
        let c = candle_at(start(), 96_000.0, 104_000.0);
        assert_eq!(touched(&pos, &c), Touch::Neither);

        let res = evaluate(&pos, &c, Timeframe::M1, &FixedSource::empty()).unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn long_low_through_stop_touches_stop() {
        let pos = long(95_000.0, 105_000.0);
        let c = candle_at(start(), 94_000.0, 104_000.0);
        assert_eq!(touched(&pos, &c), Touch::StopLoss);

        let res = evaluate(&pos, &c, Timeframe::M1, &FixedSource::empty())
            .unwrap()
            .unwrap();
        assert_eq!(res.reason, ExitReason::StopLoss);
        assert!(!res.ambiguous);
    }

    #[test]
    fn long_high_through_target_touches_target() {
        let pos = long(95_000.0, 105_000.0);
        let c = candle_at(start(), 96_000.0, 106_000.0);
        assert_eq!(touched(&pos, &c), Touch::TakeProfit);

        let res = evaluate(&pos, &c, Timeframe::M1, &FixedSource::empty())
            .unwrap()
            .unwrap();
        assert_eq!(res.reason, ExitReason::TakeProfit);
        assert!(!res.ambiguous);
    }

    #[test]
    fn exact_boundary_counts_as_touched() {
        let pos = long(95_000.0, 105_000.0);
        let at_stop = candle_at(start(), 95_000.0, 104_000.0);
        let at_target = candle_at(start(), 96_000.0, 105_000.0);
        assert_eq!(touched(&pos, &at_stop), Touch::StopLoss);
        assert_eq!(touched(&pos, &at_target), Touch::TakeProfit);
    }

    #[test]
    fn wide_range_touches_both() {
        let pos = long(95_000.0, 105_000.0);
        let c = candle_at(start(), 94_000.0, 106_000.0);
        assert_eq!(touched(&pos, &c), Touch::Both);
    }

    #[test]
    fn short_levels_are_mirrored() {
        // Short from 100k: stop above at 108k, target below at 92k.
        let pos = short(108_000.0, 92_000.0);

        let squeeze = candle_at(start(), 100_000.0, 109_000.0);
        assert_eq!(touched(&pos, &squeeze), Touch::StopLoss);

        let flush = candle_at(start(), 91_000.0, 100_000.0);
        assert_eq!(touched(&pos, &flush), Touch::TakeProfit);

        let sweep = candle_at(start(), 91_000.0, 109_000.0);
        assert_eq!(touched(&pos, &sweep), Touch::Both);
    }

    #[test]
    fn both_resolved_by_finer_stop_first() {
        let pos = long(95_000.0, 105_000.0);
        let hour = candle_at(start(), 94_000.0, 106_000.0);
        let source = FixedSource {
            series: vec![(
                Timeframe::M15,
                vec![
                    candle_at(start(), 94_000.0, 100_000.0),
                    candle_at(start() + Duration::minutes(15), 96_000.0, 106_000.0),
                ],
            )],
        };

        let res = resolve(&pos, &hour, Timeframe::H1, &source).unwrap();
        assert_eq!(res.reason, ExitReason::StopLoss);
        assert!(!res.ambiguous);
    }

    #[test]
    fn both_resolved_by_finer_target_first() {
        let pos = long(95_000.0, 105_000.0);
        let hour = candle_at(start(), 94_000.0, 106_000.0);
        let source = FixedSource {
            series: vec![(
                Timeframe::M15,
                vec![
                    candle_at(start(), 100_000.0, 106_000.0),
                    candle_at(start() + Duration::minutes(15), 94_000.0, 100_000.0),
                ],
            )],
        };

        let res = resolve(&pos, &hour, Timeframe::H1, &source).unwrap();
        assert_eq!(res.reason, ExitReason::TakeProfit);
        assert!(!res.ambiguous);
    }

    #[test]
    fn quiet_children_before_the_trigger_are_skipped() {
        let pos = long(95_000.0, 105_000.0);
        let hour = candle_at(start(), 94_000.0, 106_000.0);
        let source = FixedSource {
            series: vec![(
                Timeframe::M15,
                vec![
                    candle_at(start(), 98_000.0, 102_000.0),
                    candle_at(start() + Duration::minutes(15), 97_000.0, 103_000.0),
                    candle_at(start() + Duration::minutes(30), 94_000.0, 101_000.0),
                ],
            )],
        };

        let res = resolve(&pos, &hour, Timeframe::H1, &source).unwrap();
        assert_eq!(res.reason, ExitReason::StopLoss);
        assert!(!res.ambiguous);
    }

    #[test]
    fn recursion_walks_down_until_a_single_touch() {
        let pos = long(95_000.0, 105_000.0);
        let four_hour = candle_at(start(), 94_000.0, 106_000.0);
        // The second hour sweeps both levels; its first quarter reaches
        // only the target, which settles the order two levels down.
        let source = FixedSource {
            series: vec![
                (
                    Timeframe::H1,
                    vec![
                        candle_at(start(), 97_000.0, 103_000.0),
                        candle_at(start() + Duration::hours(1), 94_000.0, 106_000.0),
                    ],
                ),
                (
                    Timeframe::M15,
                    vec![
                        candle_at(start() + Duration::hours(1), 99_000.0, 106_000.0),
                        candle_at(
                            start() + Duration::hours(1) + Duration::minutes(15),
                            94_000.0,
                            100_000.0,
                        ),
                    ],
                ),
            ],
        };

        let res = resolve(&pos, &four_hour, Timeframe::H4, &source).unwrap();
        assert_eq!(res.reason, ExitReason::TakeProfit);
        assert!(!res.ambiguous);
    }

    #[test]
    fn recursion_only_fetches_the_parent_span() {
        let pos = long(95_000.0, 105_000.0);
        let second_hour = candle_at(start() + Duration::hours(1), 94_000.0, 106_000.0);
        // A decisive stop touch sits in hour one; it must not leak into
        // the resolution of hour two, whose own quarters say target.
        let source = FixedSource {
            series: vec![(
                Timeframe::M15,
                vec![
                    candle_at(start(), 94_000.0, 96_000.0),
                    candle_at(start() + Duration::hours(1), 100_000.0, 106_000.0),
                ],
            )],
        };

        let res = resolve(&pos, &second_hour, Timeframe::H1, &source).unwrap();
        assert_eq!(res.reason, ExitReason::TakeProfit);
    }

    #[test]
    fn both_at_base_timeframe_assumes_stop() {
        let pos = long(95_000.0, 105_000.0);
        let minute = candle_at(start(), 94_000.0, 106_000.0);

        let res = resolve(&pos, &minute, Timeframe::M1, &FixedSource::empty()).unwrap();
        assert_eq!(res.reason, ExitReason::StopLoss);
        assert!(res.ambiguous);
    }

    #[test]
    fn missing_finer_data_assumes_stop() {
        let pos = long(95_000.0, 105_000.0);
        let hour = candle_at(start(), 94_000.0, 106_000.0);

        let res = resolve(&pos, &hour, Timeframe::H1, &FixedSource::empty()).unwrap();
        assert_eq!(res.reason, ExitReason::StopLoss);
        assert!(res.ambiguous);
    }

    #[test]
    fn children_reaching_neither_level_assume_stop() {
        let pos = long(95_000.0, 105_000.0);
        let hour = candle_at(start(), 94_000.0, 106_000.0);
        let source = FixedSource {
            series: vec![(
                Timeframe::M15,
                vec![
                    candle_at(start(), 98_000.0, 102_000.0),
                    candle_at(start() + Duration::minutes(15), 97_000.0, 103_000.0),
                ],
            )],
        };

        let res = resolve(&pos, &hour, Timeframe::H1, &source).unwrap();
        assert_eq!(res.reason, ExitReason::StopLoss);
        assert!(res.ambiguous);
    }

    #[test]
    fn short_double_touch_drills_down() {
        let pos = short(108_000.0, 92_000.0);
        let hour = candle_at(start(), 91_000.0, 109_000.0);
        // First quarter's low reaches the short's target while its high
        // stays under the stop.
        let source = FixedSource {
            series: vec![(
                Timeframe::M15,
                vec![
                    candle_at(start(), 91_000.0, 107_000.0),
                    candle_at(start() + Duration::minutes(15), 100_000.0, 109_000.0),
                ],
            )],
        };

        let res = resolve(&pos, &hour, Timeframe::H1, &source).unwrap();
        assert_eq!(res.reason, ExitReason::TakeProfit);
        assert!(!res.ambiguous);
    }
}
