//! Core domain types and simulation logic.

pub mod candle;
pub mod timeframe;
pub mod position;
pub mod signal;
pub mod aggregator;
pub mod ledger;
pub mod sl_tp;
pub mod execution;
pub mod indicator;
pub mod engine;
pub mod metrics;
pub mod error;
