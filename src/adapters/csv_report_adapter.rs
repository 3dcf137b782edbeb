//! CSV run report writer: trades, equity curve, rejections, summary.

use std::fs;
use std::path::Path;

use crate::domain::engine::{BacktestReport, EquityPoint, RejectionRecord};
use crate::domain::error::PerpsimError;
use crate::domain::position::Trade;
use crate::ports::report_port::ReportPort;

/// Writes one directory per run: `trades.csv`, `equity.csv`,
/// `rejections.csv`, and the plain-text `summary.txt`. Empty runs still
/// produce the files, with headers only.
pub struct CsvReportAdapter;

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &BacktestReport, output_dir: &Path) -> Result<(), PerpsimError> {
        fs::create_dir_all(output_dir)?;
        write_trades(&report.trades, &output_dir.join("trades.csv"))?;
        write_equity(&report.equity_curve, &output_dir.join("equity.csv"))?;
        write_rejections(&report.rejections, &output_dir.join("rejections.csv"))?;
        fs::write(output_dir.join("summary.txt"), report.summary())?;
        Ok(())
    }
}

fn persistence(path: &Path, e: impl std::fmt::Display) -> PerpsimError {
    PerpsimError::Persistence {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn write_trades(trades: &[Trade], path: &Path) -> Result<(), PerpsimError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| persistence(path, e))?;
    writer
        .write_record([
            "id",
            "side",
            "entry_price",
            "exit_price",
            "entry_time",
            "exit_time",
            "size",
            "size_usd",
            "pnl",
            "pnl_percent",
            "exit_reason",
        ])
        .map_err(|e| persistence(path, e))?;
    for trade in trades {
        writer
            .write_record([
                trade.id.to_string(),
                trade.side.label().to_string(),
                trade.entry_price.to_string(),
                trade.exit_price.to_string(),
                trade.entry_time.to_rfc3339(),
                trade.exit_time.to_rfc3339(),
                trade.size.to_string(),
                trade.size_usd.to_string(),
                trade.pnl.to_string(),
                trade.pnl_percent.to_string(),
                trade.exit_reason.label().to_string(),
            ])
            .map_err(|e| persistence(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_equity(curve: &[EquityPoint], path: &Path) -> Result<(), PerpsimError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| persistence(path, e))?;
    writer
        .write_record(["timestamp", "equity"])
        .map_err(|e| persistence(path, e))?;
    for point in curve {
        writer
            .write_record([point.timestamp.to_rfc3339(), point.equity.to_string()])
            .map_err(|e| persistence(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_rejections(rejections: &[RejectionRecord], path: &Path) -> Result<(), PerpsimError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| persistence(path, e))?;
    writer
        .write_record(["timestamp", "signal", "reason"])
        .map_err(|e| persistence(path, e))?;
    for record in rejections {
        writer
            .write_record([
                record.timestamp.to_rfc3339(),
                record.signal.label().to_string(),
                record.rejection.to_string(),
            ])
            .map_err(|e| persistence(path, e))?;
    }
    writer.flush()?;
    Ok(())
}
