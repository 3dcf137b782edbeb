//! Domain error types and exit-code mapping.

use chrono::{DateTime, Utc};

use crate::domain::timeframe::Timeframe;

/// Top-level error type for perpsim.
///
/// Signal-level validation failures are *not* errors; they are
/// [`Rejection`](crate::domain::ledger::Rejection) values handled inline by
/// the simulation loop. Everything here either aborts the current run or a
/// CLI command.
#[derive(Debug, thiserror::Error)]
pub enum PerpsimError {
    #[error("candle out of sequence: expected {expected}, got {got}")]
    Sequence {
        expected: DateTime<Utc>,
        got: DateTime<Utc>,
    },

    #[error("malformed candle at {timestamp}: {reason}")]
    InvalidCandle {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    #[error("timeframe {timeframe} was not declared to the aggregator")]
    UndeclaredTimeframe { timeframe: Timeframe },

    #[error("timeframe {timeframe} has no candles yet")]
    EmptyTimeframe { timeframe: Timeframe },

    #[error("unknown timeframe '{label}' (expected one of 1m, 5m, 15m, 1h, 4h, 1d, 1w)")]
    UnknownTimeframe { label: String },

    #[error("ledger balance went negative ({balance:.2}); close exceeded locked margin")]
    NegativeBalance { balance: f64 },

    #[error("unknown strategy '{name}' (available: {available})")]
    UnknownStrategy { name: String, available: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no candle data for {symbol} on {timeframe}")]
    NoData {
        symbol: String,
        timeframe: Timeframe,
    },

    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&PerpsimError> for std::process::ExitCode {
    fn from(err: &PerpsimError) -> Self {
        let code: u8 = match err {
            PerpsimError::Io(_) | PerpsimError::NegativeBalance { .. } => 1,
            PerpsimError::ConfigParse { .. }
            | PerpsimError::ConfigMissing { .. }
            | PerpsimError::ConfigInvalid { .. } => 2,
            PerpsimError::Sequence { .. }
            | PerpsimError::InvalidCandle { .. }
            | PerpsimError::EmptyTimeframe { .. }
            | PerpsimError::Data { .. }
            | PerpsimError::NoData { .. } => 3,
            PerpsimError::UndeclaredTimeframe { .. }
            | PerpsimError::UnknownTimeframe { .. }
            | PerpsimError::UnknownStrategy { .. } => 4,
            PerpsimError::Persistence { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
