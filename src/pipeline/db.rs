//! SQLite persistence for the audit trail: sealed candles and (optionally)
//! raw ticks.
//!
//! Writes are best-effort and always off the ingestion critical path: the
//! flush loop batches them and logs failures without retrying.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::market::types::{Candle, Tick};

type DbResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Writer for the audit tables.
///
/// Tables written (see `/sql/`):
/// - `candles` - UPSERT on (symbol, timeframe, open_time)
/// - `ticks`   - INSERT (append-only, optional)
#[async_trait]
pub trait MarketDbWriter: Send + Sync {
    /// Upsert a batch of sealed candles.
    async fn write_candles(&self, candles: Vec<Candle>) -> DbResult<()>;

    /// Append a batch of raw ticks.
    async fn write_ticks(&self, ticks: Vec<Tick>) -> DbResult<()>;
}

/// Run schema migrations from the numbered SQL files in `schema_dir`.
///
/// Every file must use `IF NOT EXISTS` clauses so the loader stays
/// idempotent; files execute in name order (01_, 02_, ...). WAL mode is
/// enabled first for concurrent readers.
pub fn run_schema_migrations(conn: &mut Connection, schema_dir: &str) -> DbResult<()> {
    let schema_path = Path::new(schema_dir);

    if !schema_path.exists() {
        return Err(format!("schema directory not found: {}", schema_dir).into());
    }

    conn.pragma_update(None, "journal_mode", "WAL")?;

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    sql_files.sort_by_key(|entry| entry.file_name());

    for entry in sql_files {
        let path = entry.path();
        let sql = fs::read_to_string(&path)?;
        conn.execute_batch(&sql)?;
        log::info!("applied schema file {}", path.display());
    }

    Ok(())
}

/// SQLite implementation of [`MarketDbWriter`].
pub struct SqliteMarketWriter {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMarketWriter {
    /// Open a writer on an existing database. The schema must already be in
    /// place (see [`run_schema_migrations`]).
    pub fn new(db_path: &str) -> DbResult<Self> {
        let conn = Connection::open(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl MarketDbWriter for SqliteMarketWriter {
    async fn write_candles(&self, candles: Vec<Candle>) -> DbResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for candle in &candles {
            tx.execute(
                r#"
                INSERT INTO candles (
                    symbol, timeframe, open_time, open, high, low, close, volume
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(symbol, timeframe, open_time) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume
                "#,
                rusqlite::params![
                    candle.instrument,
                    candle.timeframe.as_str(),
                    candle.open_time,
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.volume,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn write_ticks(&self, ticks: Vec<Tick>) -> DbResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for tick in &ticks {
            tx.execute(
                "INSERT INTO ticks (symbol, bid, ask, volume, timestamp) VALUES (?, ?, ?, ?, ?)",
                rusqlite::params![
                    tick.instrument,
                    tick.bid,
                    tick.ask,
                    tick.volume,
                    tick.timestamp,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::Timeframe;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, SqliteMarketWriter) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();

        let conn = Connection::open(db_path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ticks (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol          TEXT NOT NULL,
                bid             REAL NOT NULL,
                ask             REAL NOT NULL,
                volume          REAL NOT NULL,
                timestamp       INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS candles (
                symbol          TEXT NOT NULL,
                timeframe       TEXT NOT NULL,
                open_time       INTEGER NOT NULL,
                open            REAL NOT NULL,
                high            REAL NOT NULL,
                low             REAL NOT NULL,
                close           REAL NOT NULL,
                volume          REAL NOT NULL,
                UNIQUE(symbol, timeframe, open_time)
            );
            "#,
        )
        .unwrap();
        drop(conn);

        let writer = SqliteMarketWriter::new(db_path).unwrap();
        (temp_file, writer)
    }

    fn make_candle(open_time: i64, close: f64) -> Candle {
        Candle {
            instrument: "EURUSD".to_string(),
            timeframe: Timeframe::M1,
            open_time,
            open: 1.1000,
            high: close.max(1.1000),
            low: close.min(1.1000),
            close,
            volume: 3.0,
        }
    }

    #[tokio::test]
    async fn test_insert_new_candle() {
        let (_temp, writer) = create_test_db();

        writer
            .write_candles(vec![make_candle(60, 1.1010)])
            .await
            .unwrap();

        let conn = writer.conn.lock().unwrap();
        let (tf, close): (String, f64) = conn
            .query_row(
                "SELECT timeframe, close FROM candles WHERE symbol = ? AND open_time = ?",
                rusqlite::params!["EURUSD", 60],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();

        assert_eq!(tf, "M1");
        assert_eq!(close, 1.1010);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_bucket() {
        let (_temp, writer) = create_test_db();

        writer
            .write_candles(vec![make_candle(60, 1.1010)])
            .await
            .unwrap();
        writer
            .write_candles(vec![make_candle(60, 1.1020)])
            .await
            .unwrap();

        let conn = writer.conn.lock().unwrap();
        let (count, close): (i64, f64) = conn
            .query_row(
                "SELECT COUNT(*), MAX(close) FROM candles WHERE symbol = 'EURUSD'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();

        // The uniqueness key keeps one row per bucket
        assert_eq!(count, 1);
        assert_eq!(close, 1.1020);
    }

    #[tokio::test]
    async fn test_write_ticks_appends() {
        let (_temp, writer) = create_test_db();

        let ticks: Vec<Tick> = (0..5)
            .map(|i| Tick {
                instrument: "EURUSD".to_string(),
                bid: 1.1000,
                ask: 1.1002,
                volume: 1.0,
                timestamp: i,
            })
            .collect();

        writer.write_ticks(ticks.clone()).await.unwrap();
        writer.write_ticks(ticks).await.unwrap();

        let conn = writer.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM ticks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 10);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();

        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("01_things.sql"),
            "CREATE TABLE IF NOT EXISTS things (id INTEGER PRIMARY KEY);",
        )
        .unwrap();

        let mut conn = Connection::open(&db_path).unwrap();
        run_schema_migrations(&mut conn, dir.path().to_str().unwrap()).unwrap();
        run_schema_migrations(&mut conn, dir.path().to_str().unwrap()).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM things", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_missing_schema_dir_errors() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(run_schema_migrations(&mut conn, "/no/such/dir").is_err());
    }
}
