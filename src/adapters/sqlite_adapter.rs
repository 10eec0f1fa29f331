//! SQLite trade store: bar history, trade log and daily calibration records.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::{OhlcvBar, SymbolSeries};
use crate::domain::signal::Side;
use crate::domain::trade::{StrategyParams, TradeRecord};
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::TradeStorePort;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        // WAL lets the CLI read the trade log while the agent is writing it.
        let manager = SqliteConnectionManager::file(&db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA journal_mode = WAL;"));
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| TraderError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| TraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TraderError> {
        self.pool.get().map_err(|e: r2d2::Error| TraderError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ohlcv (
                symbol TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (symbol, timestamp)
            );
            CREATE TABLE IF NOT EXISTS trade_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL NOT NULL,
                reason TEXT NOT NULL,
                order_id TEXT NOT NULL,
                strategy_name TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trade_logs_symbol ON trade_logs(symbol);
            CREATE TABLE IF NOT EXISTS strategy_params (
                date TEXT NOT NULL,
                symbol TEXT NOT NULL,
                k REAL NOT NULL,
                target_price REAL,
                PRIMARY KEY (date, symbol)
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    /// Calibration record for `symbol` on `date`, if one was written.
    pub fn strategy_params(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<StrategyParams>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT k, target_price FROM strategy_params WHERE date = ?1 AND symbol = ?2")
            .map_err(query_error)?;

        let mut rows = stmt
            .query_map(params![date.format(DATE_FORMAT).to_string(), symbol], |row| {
                Ok((row.get::<_, f64>(0)?, row.get::<_, Option<f64>>(1)?))
            })
            .map_err(query_error)?;

        match rows.next() {
            Some(row) => {
                let (k, target_price) = row.map_err(query_error)?;
                Ok(Some(StrategyParams {
                    date,
                    symbol: symbol.to_string(),
                    k,
                    target_price,
                }))
            }
            None => Ok(None),
        }
    }
}

impl TradeStorePort for SqliteAdapter {
    fn append_trade_record(&self, record: &TradeRecord) -> Result<(), TraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trade_logs
                (timestamp, symbol, side, quantity, price, reason, order_id, strategy_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                record.symbol,
                record.side.as_str(),
                record.quantity,
                record.price,
                record.reason,
                record.order_id,
                record.strategy_name
            ],
        )
        .map_err(query_error)?;
        Ok(())
    }

    fn query_recent_history(&self, symbol: &str, n: usize) -> Result<SymbolSeries, TraderError> {
        let conn = self.conn()?;

        let query = "SELECT timestamp, open, high, low, close, volume
                     FROM ohlcv
                     WHERE symbol = ?1
                     ORDER BY timestamp DESC
                     LIMIT ?2";

        let mut stmt = conn.prepare(query).map_err(query_error)?;

        let rows = stmt
            .query_map(params![symbol, n as i64], |row| {
                let ts_str: String = row.get(0)?;
                let timestamp = parse_timestamp(&ts_str)?;
                Ok(OhlcvBar {
                    timestamp,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(query_error)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(query_error)?);
        }
        bars.reverse();

        SymbolSeries::new(symbol, bars)
    }

    fn store_bars(&self, series: &SymbolSeries) -> Result<usize, TraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in series.bars() {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (symbol, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    series.symbol(),
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(series.len())
    }

    fn record_strategy_params(&self, params: &StrategyParams) -> Result<(), TraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO strategy_params (date, symbol, k, target_price)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                params.date.format(DATE_FORMAT).to_string(),
                params.symbol,
                params.k,
                params.target_price
            ],
        )
        .map_err(query_error)?;
        Ok(())
    }

    fn list_trade_records(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<TradeRecord>, TraderError> {
        let conn = self.conn()?;

        let query = "SELECT timestamp, symbol, side, quantity, price, reason, order_id, strategy_name
                     FROM trade_logs
                     WHERE ?1 IS NULL OR symbol = ?1
                     ORDER BY id DESC
                     LIMIT ?2";

        let mut stmt = conn.prepare(query).map_err(query_error)?;

        let rows = stmt
            .query_map(params![symbol, limit as i64], |row| {
                let ts_str: String = row.get(0)?;
                let side_str: String = row.get(2)?;
                let side = Side::parse(&side_str).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        format!("unknown side '{side_str}'").into(),
                    )
                })?;
                Ok(TradeRecord {
                    timestamp: parse_timestamp(&ts_str)?,
                    symbol: row.get(1)?,
                    side,
                    quantity: row.get(3)?,
                    price: row.get(4)?,
                    reason: row.get(5)?,
                    order_id: row.get(6)?,
                    strategy_name: row.get(7)?,
                })
            })
            .map_err(query_error)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_error)?);
        }
        Ok(records)
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            value.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

fn query_error(e: rusqlite::Error) -> TraderError {
    TraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}
