//! SQLite run-state sink: live positions and the closed trade log.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::warn;

use chrono::{DateTime, Utc};

use crate::domain::engine::EngineEvent;
use crate::domain::error::PerpsimError;
use crate::domain::position::{Position, PositionId, Trade};
use crate::ports::config_port::ConfigPort;
use crate::ports::event_port::EventSink;

/// Mirrors the ledger into SQLite as the run progresses: one row per
/// open position (deleted on close) and an append-only trade log. A
/// restarted forward session can pick its open positions back up with
/// [`open_positions`].
///
/// Sink failures are logged and swallowed; persistence never stops a
/// run.
///
/// [`open_positions`]: SqliteStateAdapter::open_positions
pub struct SqliteStateAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_error(e: impl std::fmt::Display) -> PerpsimError {
    PerpsimError::Persistence {
        reason: e.to_string(),
    }
}

impl SqliteStateAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PerpsimError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, PerpsimError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(db_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn initialize_schema(&self) -> Result<(), PerpsimError> {
        let conn = self.pool.get().map_err(db_error)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS positions (
                id INTEGER PRIMARY KEY,
                side TEXT NOT NULL,
                entry_price REAL NOT NULL,
                entry_time TEXT NOT NULL,
                size REAL NOT NULL,
                size_usd REAL NOT NULL,
                stop_loss REAL NOT NULL,
                take_profit REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY,
                side TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL NOT NULL,
                entry_time TEXT NOT NULL,
                exit_time TEXT NOT NULL,
                size REAL NOT NULL,
                size_usd REAL NOT NULL,
                pnl REAL NOT NULL,
                pnl_percent REAL NOT NULL,
                exit_reason TEXT NOT NULL
            );",
        )
        .map_err(db_error)?;
        Ok(())
    }

    fn record_open(&self, position: &Position) -> Result<(), PerpsimError> {
        let conn = self.pool.get().map_err(db_error)?;
        conn.execute(
            "INSERT OR REPLACE INTO positions
             (id, side, entry_price, entry_time, size, size_usd, stop_loss, take_profit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                position.id.0,
                position.side.label(),
                position.entry_price,
                position.entry_time.to_rfc3339(),
                position.size,
                position.size_usd,
                position.stop_loss,
                position.take_profit
            ],
        )
        .map_err(db_error)?;
        Ok(())
    }

    fn record_close(&self, trade: &Trade) -> Result<(), PerpsimError> {
        let mut conn = self.pool.get().map_err(db_error)?;
        let tx = conn.transaction().map_err(db_error)?;
        tx.execute(
            "DELETE FROM positions WHERE id = ?1",
            params![trade.id.0],
        )
        .map_err(db_error)?;
        tx.execute(
            "INSERT OR REPLACE INTO trades
             (id, side, entry_price, exit_price, entry_time, exit_time,
              size, size_usd, pnl, pnl_percent, exit_reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                trade.id.0,
                trade.side.label(),
                trade.entry_price,
                trade.exit_price,
                trade.entry_time.to_rfc3339(),
                trade.exit_time.to_rfc3339(),
                trade.size,
                trade.size_usd,
                trade.pnl,
                trade.pnl_percent,
                trade.exit_reason.label()
            ],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        Ok(())
    }

    /// Open positions as last persisted, in id order.
    pub fn open_positions(&self) -> Result<Vec<Position>, PerpsimError> {
        let conn = self.pool.get().map_err(db_error)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, side, entry_price, entry_time, size, size_usd,
                        stop_loss, take_profit
                 FROM positions ORDER BY id",
            )
            .map_err(db_error)?;

        let rows = stmt
            .query_map([], |row| {
                let side_str: String = row.get(1)?;
                let time_str: String = row.get(3)?;
                Ok((
                    row.get::<_, u64>(0)?,
                    side_str,
                    row.get::<_, f64>(2)?,
                    time_str,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, f64>(7)?,
                ))
            })
            .map_err(db_error)?;

        let mut positions = Vec::new();
        for row in rows {
            let (id, side_str, entry_price, time_str, size, size_usd, stop_loss, take_profit) =
                row.map_err(db_error)?;
            let entry_time = parse_time(&time_str)?;
            positions.push(Position {
                id: PositionId(id),
                side: side_str.parse()?,
                entry_price,
                entry_time,
                size,
                size_usd,
                stop_loss,
                take_profit,
            });
        }
        Ok(positions)
    }

    pub fn trade_count(&self) -> Result<usize, PerpsimError> {
        let conn = self.pool.get().map_err(db_error)?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM trades", [], |row| row.get(0))
            .map_err(db_error)?;
        Ok(count as usize)
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, PerpsimError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PerpsimError::Persistence {
            reason: format!("invalid stored timestamp '{value}': {e}"),
        })
}

impl EventSink for SqliteStateAdapter {
    fn publish(&mut self, event: &EngineEvent) {
        let result = match event {
            EngineEvent::PositionOpened(position) => self.record_open(position),
            EngineEvent::PositionClosed(trade) => self.record_close(trade),
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "sqlite state sink write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{ExitReason, Side};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn sample_position(id: u64) -> Position {
        Position {
            id: PositionId(id),
            side: Side::Long,
            entry_price: 100_000.0,
            entry_time: t0(),
            size: 0.05,
            size_usd: 5_000.0,
            stop_loss: 95_000.0,
            take_profit: 105_000.0,
        }
    }

    fn sample_trade(id: u64) -> Trade {
        Trade {
            id: PositionId(id),
            side: Side::Long,
            entry_price: 100_000.0,
            exit_price: 105_000.0,
            entry_time: t0(),
            exit_time: t0(),
            size: 0.05,
            size_usd: 5_000.0,
            pnl: 250.0,
            pnl_percent: 5.0,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn open_position_round_trips() {
        let mut adapter = SqliteStateAdapter::in_memory().unwrap();
        adapter.publish(&EngineEvent::PositionOpened(sample_position(1)));

        let loaded = adapter.open_positions().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, PositionId(1));
        assert_eq!(loaded[0].side, Side::Long);
        assert_eq!(loaded[0].entry_time, t0());
        assert!((loaded[0].stop_loss - 95_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn close_moves_the_row_to_trades() {
        let mut adapter = SqliteStateAdapter::in_memory().unwrap();
        adapter.publish(&EngineEvent::PositionOpened(sample_position(1)));
        adapter.publish(&EngineEvent::PositionClosed(sample_trade(1)));

        assert!(adapter.open_positions().unwrap().is_empty());
        assert_eq!(adapter.trade_count().unwrap(), 1);
    }

    #[test]
    fn positions_come_back_in_id_order() {
        let mut adapter = SqliteStateAdapter::in_memory().unwrap();
        adapter.publish(&EngineEvent::PositionOpened(sample_position(3)));
        adapter.publish(&EngineEvent::PositionOpened(sample_position(1)));
        adapter.publish(&EngineEvent::PositionOpened(sample_position(2)));

        let ids: Vec<u64> = adapter
            .open_positions()
            .unwrap()
            .iter()
            .map(|p| p.id.0)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn from_config_requires_a_path() {
        struct Empty;
        impl ConfigPort for Empty {
            fn get_string(&self, _: &str, _: &str) -> Option<String> {
                None
            }
            fn get_int(&self, _: &str, _: &str, default: i64) -> i64 {
                default
            }
            fn get_double(&self, _: &str, _: &str, default: f64) -> f64 {
                default
            }
            fn get_bool(&self, _: &str, _: &str, default: bool) -> bool {
                default
            }
        }

        let result = SqliteStateAdapter::from_config(&Empty);
        match result {
            Err(PerpsimError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}
