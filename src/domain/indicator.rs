//! Indicator helpers computed over completed-candle history.
//!
//! All helpers read the rolling history a [`TimeframeView`] exposes and
//! return `None` until enough candles have accumulated, so strategies can
//! gate themselves with a plain `let Some(..) = ..` during warm-up.
//!
//! [`TimeframeView`]: crate::domain::aggregator::TimeframeView

use std::collections::VecDeque;

use super::candle::Candle;

/// Simple moving average of the last `period` closes.
pub fn sma(candles: &VecDeque<Candle>, period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let sum: f64 = candles.iter().rev().take(period).map(|c| c.close).sum();
    Some(sum / period as f64)
}

/// Relative Strength Index with Wilder smoothing.
///
/// Seeds the average gain/loss with a simple mean of the first `period`
/// close-to-close changes, then applies the Wilder recurrence
/// `avg = (avg * (n - 1) + current) / n` across the rest of the history.
/// Needs at least `period + 1` candles. A history with no losing changes
/// reads 100, one with no winning changes reads 0.
pub fn rsi(candles: &VecDeque<Candle>, period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    let mut prev_close = candles[0].close;
    for (i, candle) in candles.iter().enumerate().skip(1) {
        let change = candle.close - prev_close;
        prev_close = candle.close;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        if i <= period {
            avg_gain += gain / period as f64;
            avg_loss += loss / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
        }
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Donchian channel: `(highest high, lowest low)` of the last `period` candles.
pub fn channel(candles: &VecDeque<Candle>, period: usize) -> Option<(f64, f64)> {
    if period == 0 || candles.len() < period {
        return None;
    }
    let mut upper = f64::NEG_INFINITY;
    let mut lower = f64::INFINITY;
    for candle in candles.iter().rev().take(period) {
        upper = upper.max(candle.high);
        lower = lower.min(candle.low);
    }
    Some((upper, lower))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn history_of_closes(closes: &[f64]) -> VecDeque<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::minutes(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
                open_interest: 0.0,
                cumulative_volume_delta: 0.0,
            })
            .collect()
    }

    fn history_of_ranges(ranges: &[(f64, f64)]) -> VecDeque<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ranges
            .iter()
            .enumerate()
            .map(|(i, &(low, high))| Candle {
                timestamp: start + Duration::minutes(i as i64),
                open: low,
                high,
                low,
                close: high,
                volume: 1.0,
                open_interest: 0.0,
                cumulative_volume_delta: 0.0,
            })
            .collect()
    }

    #[test]
    fn sma_requires_a_full_window() {
        let candles = history_of_closes(&[1.0, 2.0]);
        assert!(sma(&candles, 3).is_none());
        assert!(sma(&candles, 0).is_none());
    }

    #[test]
    fn sma_averages_only_the_last_window() {
        let candles = history_of_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let value = sma(&candles, 3).unwrap();
        assert!((value - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_needs_period_plus_one_candles() {
        let candles = history_of_closes(&[1.0, 2.0, 3.0]);
        assert!(rsi(&candles, 3).is_none());
        assert!(rsi(&candles, 2).is_some());
    }

    #[test]
    fn rsi_is_100_when_every_change_gains() {
        let closes: Vec<f64> = (0..16).map(|i| 100.0 + i as f64).collect();
        let candles = history_of_closes(&closes);
        let value = rsi(&candles, 14).unwrap();
        assert!((value - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_is_0_when_every_change_loses() {
        let closes: Vec<f64> = (0..16).map(|i| 100.0 - i as f64).collect();
        let candles = history_of_closes(&closes);
        let value = rsi(&candles, 14).unwrap();
        assert!((value - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_matches_a_hand_computed_sequence() {
        // period 2 over closes 10, 11, 10.5, 11.5:
        // deltas +1.0, -0.5, +1.0; seed avg_gain 0.5, avg_loss 0.25;
        // one smoothing step gives avg_gain 0.75, avg_loss 0.125, rs 6.
        let candles = history_of_closes(&[10.0, 11.0, 10.5, 11.5]);
        let value = rsi(&candles, 2).unwrap();
        assert_relative_eq!(value, 100.0 - 100.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn rsi_stays_in_range_over_a_zigzag() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + ((i % 7) as f64 - 3.0) * 2.0)
            .collect();
        let candles = history_of_closes(&closes);
        let value = rsi(&candles, 14).unwrap();
        assert!((0.0..=100.0).contains(&value), "rsi {value} out of range");
    }

    #[test]
    fn channel_requires_a_full_window() {
        let candles = history_of_ranges(&[(99.0, 101.0)]);
        assert!(channel(&candles, 2).is_none());
    }

    #[test]
    fn channel_spans_the_last_window_extremes() {
        let candles = history_of_ranges(&[
            (80.0, 120.0), // outside the window, must not count
            (99.0, 101.0),
            (97.0, 102.0),
            (98.0, 100.0),
        ]);
        let (upper, lower) = channel(&candles, 3).unwrap();
        assert!((upper - 102.0).abs() < f64::EPSILON);
        assert!((lower - 97.0).abs() < f64::EPSILON);
    }
}
