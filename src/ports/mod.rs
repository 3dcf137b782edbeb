//! Port traits separating the simulation core from its collaborators.

pub mod candle_source_port;
pub mod config_port;
pub mod data_port;
pub mod event_port;
pub mod report_port;
pub mod strategy_port;
