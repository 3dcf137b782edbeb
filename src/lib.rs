//! perpsim: backtest and forward-test engine for BTC/USDT perpetual futures.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], strategies in [`strategies`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod strategies;
pub mod cli;
