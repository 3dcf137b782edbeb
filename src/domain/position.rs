//! Open positions and closed trades.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::domain::error::PerpsimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short; multiplies price deltas into signed pnl.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Side {
    type Err = PerpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Side::Long),
            "short" => Ok(Side::Short),
            other => Err(PerpsimError::Data {
                reason: format!("unknown side '{other}'"),
            }),
        }
    }
}

/// Sequential id assigned by the ledger. Runs on identical input produce
/// identical ids, so trade logs compare byte-for-byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An open position. Owned and mutated only by the ledger; `size_usd` is the
/// margin locked at open, `size` the quantity in base units
/// (`size_usd / entry_price`). Stop and target are absolute prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub id: PositionId,
    pub side: Side,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub size: f64,
    pub size_usd: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Position {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size * self.side.sign()
    }
}

/// Why a position was closed. `Signal` covers strategy-requested closes and
/// the end-of-backtest force close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::Signal => "signal",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ExitReason {
    type Err = PerpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop_loss" => Ok(ExitReason::StopLoss),
            "take_profit" => Ok(ExitReason::TakeProfit),
            "signal" => Ok(ExitReason::Signal),
            other => Err(PerpsimError::Data {
                reason: format!("unknown exit reason '{other}'"),
            }),
        }
    }
}

/// Immutable record of a closed position, appended to the ledger's trade log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub id: PositionId,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub size: f64,
    pub size_usd: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub exit_reason: ExitReason,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_long_position() -> Position {
        Position {
            id: PositionId(1),
            side: Side::Long,
            entry_price: 100_000.0,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            size: 0.05,
            size_usd: 5_000.0,
            stop_loss: 95_000.0,
            take_profit: 105_000.0,
        }
    }

    fn sample_short_position() -> Position {
        Position {
            id: PositionId(2),
            side: Side::Short,
            entry_price: 100_000.0,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            size: 0.05,
            size_usd: 5_000.0,
            stop_loss: 105_000.0,
            take_profit: 95_000.0,
        }
    }

    #[test]
    fn unrealized_pnl_long_profit() {
        let pos = sample_long_position();
        // (102000 - 100000) * 0.05 = 100
        assert!((pos.unrealized_pnl(102_000.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_long_loss() {
        let pos = sample_long_position();
        assert!((pos.unrealized_pnl(98_000.0) - (-100.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_short_profit() {
        let pos = sample_short_position();
        assert!((pos.unrealized_pnl(98_000.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_short_loss() {
        let pos = sample_short_position();
        assert!((pos.unrealized_pnl(102_000.0) - (-100.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn side_signs_and_labels() {
        assert!((Side::Long.sign() - 1.0).abs() < f64::EPSILON);
        assert!((Side::Short.sign() + 1.0).abs() < f64::EPSILON);
        assert_eq!(Side::Long.opposite(), Side::Short);
        assert_eq!("long".parse::<Side>().unwrap(), Side::Long);
        assert_eq!("short".parse::<Side>().unwrap(), Side::Short);
        assert!("flat".parse::<Side>().is_err());
    }

    #[test]
    fn exit_reason_labels_round_trip() {
        for reason in [ExitReason::StopLoss, ExitReason::TakeProfit, ExitReason::Signal] {
            assert_eq!(reason.label().parse::<ExitReason>().unwrap(), reason);
        }
        assert!("liquidation".parse::<ExitReason>().is_err());
    }
}
