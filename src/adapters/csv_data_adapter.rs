//! CSV candle store, one file per symbol and timeframe.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::domain::candle::Candle;
use crate::domain::error::PerpsimError;
use crate::domain::timeframe::Timeframe;
use crate::ports::candle_source_port::CandleSource;
use crate::ports::data_port::DataFeed;

/// Reads candles from `{symbol}_{timeframe}.csv` files under a base
/// directory, e.g. `BTCUSDT_1m.csv`. Columns: timestamp (RFC 3339),
/// open, high, low, close, volume, open_interest, cvd.
///
/// Files are parsed once and cached, so the stop/target drill-down can
/// issue many small range queries without touching the filesystem
/// again. Rows are sorted by timestamp after load; range queries are
/// half-open (`start` inclusive, `end` exclusive).
pub struct CsvDataAdapter {
    base_path: PathBuf,
    symbol: String,
    cache: RefCell<HashMap<(String, Timeframe), Rc<Vec<Candle>>>>,
}

impl CsvDataAdapter {
    pub fn new(base_path: PathBuf, symbol: impl Into<String>) -> Self {
        CsvDataAdapter {
            base_path,
            symbol: symbol.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol, timeframe.label()))
    }

    fn series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Rc<Vec<Candle>>, PerpsimError> {
        let key = (symbol.to_string(), timeframe);
        if let Some(series) = self.cache.borrow().get(&key) {
            return Ok(Rc::clone(series));
        }
        let series = Rc::new(self.read_series(symbol, timeframe)?);
        self.cache.borrow_mut().insert(key, Rc::clone(&series));
        Ok(series)
    }

    fn read_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<Candle>, PerpsimError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| PerpsimError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        // Header is line 1, so the first record is line 2.
        for (index, result) in rdr.records().enumerate() {
            let line = index + 2;
            let record = result.map_err(|e| PerpsimError::Data {
                reason: format!("{} line {}: {}", path.display(), line, e),
            })?;

            let timestamp_str = column(&record, 0, "timestamp", &path, line)?;
            let timestamp = DateTime::parse_from_rfc3339(timestamp_str)
                .map_err(|e| PerpsimError::Data {
                    reason: format!(
                        "{} line {}: invalid timestamp value: {}",
                        path.display(),
                        line,
                        e
                    ),
                })?
                .with_timezone(&Utc);

            candles.push(Candle {
                timestamp,
                open: number(&record, 1, "open", &path, line)?,
                high: number(&record, 2, "high", &path, line)?,
                low: number(&record, 3, "low", &path, line)?,
                close: number(&record, 4, "close", &path, line)?,
                volume: number(&record, 5, "volume", &path, line)?,
                open_interest: number(&record, 6, "open_interest", &path, line)?,
                cumulative_volume_delta: number(&record, 7, "cvd", &path, line)?,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

fn column<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &str,
    path: &Path,
    line: usize,
) -> Result<&'r str, PerpsimError> {
    record.get(index).ok_or_else(|| PerpsimError::Data {
        reason: format!("{} line {}: missing {} column", path.display(), line, name),
    })
}

fn number(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    path: &Path,
    line: usize,
) -> Result<f64, PerpsimError> {
    column(record, index, name, path, line)?
        .parse()
        .map_err(|e| PerpsimError::Data {
            reason: format!(
                "{} line {}: invalid {} value: {}",
                path.display(),
                line,
                name,
                e
            ),
        })
}

fn in_range(series: &[Candle], start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Candle> {
    let from = series.partition_point(|c| c.timestamp < start);
    let to = series.partition_point(|c| c.timestamp < end);
    series[from..to].to_vec()
}

impl DataFeed for CsvDataAdapter {
    fn candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, PerpsimError> {
        let series = self.series(symbol, timeframe)?;
        Ok(in_range(&series, start, end))
    }

    fn data_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, PerpsimError> {
        let series = self.series(symbol, timeframe)?;
        match (series.first(), series.last()) {
            (Some(first), Some(last)) => {
                Ok(Some((first.timestamp, last.timestamp, series.len())))
            }
            _ => Ok(None),
        }
    }
}

impl CandleSource for CsvDataAdapter {
    fn fetch(
        &self,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, PerpsimError> {
        let series = self.series(&self.symbol, timeframe)?;
        Ok(in_range(&series, start, end))
    }
}
