//! Concrete adapter implementations for ports.

#[cfg(feature = "sqlite")]
pub mod sqlite_state_adapter;
pub mod csv_data_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
pub mod log_alert_adapter;
pub mod replay_adapter;
