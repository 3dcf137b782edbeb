//! Port for writing simulation reports.

use std::path::Path;

use crate::domain::engine::BacktestReport;
use crate::domain::error::PerpsimError;

/// Writes a finished run's trades, equity curve, and summary somewhere
/// durable.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport, output_dir: &Path) -> Result<(), PerpsimError>;
}
