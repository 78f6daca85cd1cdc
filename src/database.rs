use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{LotteryError, Result};
use crate::lottery::LotteryType;
use crate::types::{DatabaseInfo, DrawResult, NewSyncLog, SyncLog, SyncStatus, TypeSummary};
use crate::utils::{DATE_FORMAT, format_date};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS draw_results (
    lottery_type    TEXT NOT NULL,
    period          TEXT NOT NULL,
    draw_date       TEXT NOT NULL,
    main_numbers    TEXT NOT NULL,
    drawn_numbers   TEXT NOT NULL,
    special_numbers TEXT NOT NULL,
    prize_pool      TEXT,
    sales_amount    TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    PRIMARY KEY (lottery_type, period)
);

CREATE INDEX IF NOT EXISTS idx_draw_results_date
    ON draw_results (lottery_type, draw_date);

CREATE TABLE IF NOT EXISTS sync_logs (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    lottery_type      TEXT NOT NULL,
    synced_at         TEXT NOT NULL,
    requested_periods INTEGER NOT NULL,
    status            TEXT NOT NULL,
    records_merged    INTEGER NOT NULL DEFAULT 0,
    records_rejected  INTEGER NOT NULL DEFAULT 0,
    error_message     TEXT
);
";

const DRAW_COLUMNS: &str =
    "period, draw_date, main_numbers, drawn_numbers, special_numbers, prize_pool, sales_amount";

/// Local store of draw results and sync history.
///
/// One connection behind a mutex; every method holds the lock for a single
/// statement or a single transaction, so writers for one type are serialized
/// and readers never wait on a network call.
pub struct DrawStore {
    conn: Mutex<Connection>,
}

impl DrawStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!("📁 Opened draw store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        Ok(self.conn.lock().execute_batch(sql)?)
    }

    /// Inserts new periods and backfills missing optional fields of existing
    /// ones. Returns the number of newly inserted periods.
    pub fn upsert(&self, lottery_type: LotteryType, results: &[DrawResult]) -> Result<usize> {
        if let Some(foreign) = results.iter().find(|d| d.lottery_type != lottery_type) {
            return Err(LotteryError::invalid_parameter(
                "results",
                format!(
                    "period {} belongs to {}, not {}",
                    foreign.period, foreign.lottery_type, lottery_type
                ),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        let mut backfilled = 0;

        for draw in results {
            let existing: Option<(Option<String>, Option<String>)> = tx
                .query_row(
                    "SELECT prize_pool, sales_amount FROM draw_results
                     WHERE lottery_type = ?1 AND period = ?2",
                    params![lottery_type.code(), draw.period],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match existing {
                None => {
                    tx.execute(
                        "INSERT INTO draw_results (
                            lottery_type, period, draw_date, main_numbers, drawn_numbers,
                            special_numbers, prize_pool, sales_amount, created_at, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                        params![
                            lottery_type.code(),
                            draw.period,
                            format_date(draw.draw_date),
                            serde_json::to_string(&draw.main_numbers)?,
                            serde_json::to_string(&draw.drawn_numbers)?,
                            serde_json::to_string(&draw.special_numbers)?,
                            draw.prize_pool,
                            draw.sales_amount,
                            now,
                        ],
                    )?;
                    inserted += 1;
                }
                Some((pool, sales)) => {
                    let fill_pool = pool.is_none() && draw.prize_pool.is_some();
                    let fill_sales = sales.is_none() && draw.sales_amount.is_some();
                    if fill_pool || fill_sales {
                        tx.execute(
                            "UPDATE draw_results
                             SET prize_pool = COALESCE(prize_pool, ?3),
                                 sales_amount = COALESCE(sales_amount, ?4),
                                 updated_at = ?5
                             WHERE lottery_type = ?1 AND period = ?2",
                            params![
                                lottery_type.code(),
                                draw.period,
                                draw.prize_pool,
                                draw.sales_amount,
                                now,
                            ],
                        )?;
                        backfilled += 1;
                    }
                }
            }
        }

        tx.commit()?;
        if backfilled > 0 {
            debug!("{}: backfilled optional fields on {} periods", lottery_type, backfilled);
        }
        Ok(inserted)
    }

    pub fn latest(&self, lottery_type: LotteryType) -> Result<Option<DrawResult>> {
        Ok(self.range(lottery_type, 1)?.into_iter().next())
    }

    /// Newest first; returns whatever is available up to `limit`.
    pub fn range(&self, lottery_type: LotteryType, limit: usize) -> Result<Vec<DrawResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DRAW_COLUMNS} FROM draw_results
             WHERE lottery_type = ?1
             ORDER BY draw_date DESC, period DESC
             LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let draws = stmt
            .query_map(params![lottery_type.code(), limit], |row| {
                read_draw(lottery_type, row)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(draws)
    }

    /// Full history, oldest first.
    pub fn history(&self, lottery_type: LotteryType) -> Result<Vec<DrawResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DRAW_COLUMNS} FROM draw_results
             WHERE lottery_type = ?1
             ORDER BY draw_date ASC, period ASC"
        ))?;
        let draws = stmt
            .query_map([lottery_type.code()], |row| read_draw(lottery_type, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(draws)
    }

    pub fn count(&self, lottery_type: LotteryType) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM draw_results WHERE lottery_type = ?1",
            [lottery_type.code()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn append_sync_log(&self, entry: &NewSyncLog) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sync_logs (
                lottery_type, synced_at, requested_periods, status,
                records_merged, records_rejected, error_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.lottery_type.code(),
                entry.synced_at.to_rfc3339(),
                entry.requested_periods as i64,
                entry.status.as_str(),
                entry.records_merged as i64,
                entry.records_rejected as i64,
                entry.error_message,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent entries first.
    pub fn recent_sync_logs(&self, limit: usize) -> Result<Vec<SyncLog>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, lottery_type, synced_at, requested_periods, status,
                    records_merged, records_rejected, error_message
             FROM sync_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let logs = stmt
            .query_map([limit], read_sync_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn database_info(&self, log_limit: usize) -> Result<DatabaseInfo> {
        let mut types = Vec::with_capacity(LotteryType::ALL.len());
        for lottery_type in LotteryType::ALL {
            let records = self.count(lottery_type)?;
            let latest_period = self.latest(lottery_type)?.map(|d| d.period);
            let last_sync: Option<String> = {
                let conn = self.conn.lock();
                conn.query_row(
                    "SELECT MAX(synced_at) FROM sync_logs WHERE lottery_type = ?1",
                    [lottery_type.code()],
                    |row| row.get(0),
                )?
            };
            types.push(TypeSummary {
                lottery_type,
                name: lottery_type.name(),
                records,
                latest_period,
                last_sync: last_sync.as_deref().and_then(parse_timestamp),
            });
        }

        Ok(DatabaseInfo {
            types,
            recent_syncs: self.recent_sync_logs(log_limit)?,
        })
    }
}

fn read_draw(lottery_type: LotteryType, row: &Row<'_>) -> rusqlite::Result<DrawResult> {
    let draw_date: String = row.get(1)?;
    Ok(DrawResult {
        lottery_type,
        period: row.get(0)?,
        draw_date: NaiveDate::parse_from_str(&draw_date, DATE_FORMAT)
            .map_err(|e| conversion_error(1, e))?,
        main_numbers: read_numbers(row, 2)?,
        drawn_numbers: read_numbers(row, 3)?,
        special_numbers: read_numbers(row, 4)?,
        prize_pool: row.get(5)?,
        sales_amount: row.get(6)?,
    })
}

fn read_numbers(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<u8>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn read_sync_log(row: &Row<'_>) -> rusqlite::Result<SyncLog> {
    let code: String = row.get(1)?;
    let synced_at: String = row.get(2)?;
    let status: String = row.get(4)?;
    let requested: i64 = row.get(3)?;
    let merged: i64 = row.get(5)?;
    let rejected: i64 = row.get(6)?;
    Ok(SyncLog {
        id: row.get(0)?,
        lottery_type: code.parse().map_err(|e| conversion_error(1, e))?,
        synced_at: parse_timestamp(&synced_at).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("bad timestamp {synced_at:?}").into(),
            )
        })?,
        requested_periods: requested as usize,
        status: SyncStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown sync status {status:?}").into(),
            )
        })?,
        records_merged: merged as usize,
        records_rejected: rejected as usize,
        error_message: row.get(7)?,
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssq_draw(period: &str, date: &str, pool: Option<&str>) -> DrawResult {
        DrawResult {
            lottery_type: LotteryType::Ssq,
            period: period.to_string(),
            draw_date: NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            main_numbers: vec![1, 5, 9, 17, 23, 33],
            drawn_numbers: vec![9, 1, 33, 5, 23, 17],
            special_numbers: vec![12],
            prize_pool: pool.map(str::to_string),
            sales_amount: None,
        }
    }

    fn sync_entry(lottery_type: LotteryType, status: SyncStatus) -> NewSyncLog {
        NewSyncLog {
            lottery_type,
            synced_at: Utc::now(),
            requested_periods: 10,
            status,
            records_merged: 3,
            records_rejected: 0,
            error_message: None,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = DrawStore::open_in_memory().unwrap();
        let draws = vec![
            ssq_draw("2025001", "2025-01-02", None),
            ssq_draw("2025002", "2025-01-05", None),
        ];

        assert_eq!(store.upsert(LotteryType::Ssq, &draws).unwrap(), 2);
        let before = store.range(LotteryType::Ssq, 10).unwrap();

        assert_eq!(store.upsert(LotteryType::Ssq, &draws).unwrap(), 0);
        assert_eq!(store.range(LotteryType::Ssq, 10).unwrap(), before);
        assert_eq!(store.count(LotteryType::Ssq).unwrap(), 2);
    }

    #[test]
    fn test_round_trip_keeps_drawn_order() {
        let store = DrawStore::open_in_memory().unwrap();
        store
            .upsert(LotteryType::Ssq, &[ssq_draw("2025001", "2025-01-02", Some("100"))])
            .unwrap();
        let latest = store.latest(LotteryType::Ssq).unwrap().unwrap();
        assert_eq!(latest.main_numbers, vec![1, 5, 9, 17, 23, 33]);
        assert_eq!(latest.drawn_numbers, vec![9, 1, 33, 5, 23, 17]);
        assert_eq!(latest.special_numbers, vec![12]);
        assert_eq!(latest.prize_pool.as_deref(), Some("100"));
    }

    #[test]
    fn test_backfill_never_overwrites() {
        let store = DrawStore::open_in_memory().unwrap();
        store
            .upsert(LotteryType::Ssq, &[ssq_draw("2025001", "2025-01-02", None)])
            .unwrap();

        let mut with_amounts = ssq_draw("2025001", "2025-01-02", Some("500"));
        with_amounts.sales_amount = Some("42".to_string());
        assert_eq!(store.upsert(LotteryType::Ssq, &[with_amounts]).unwrap(), 0);

        let stored = store.latest(LotteryType::Ssq).unwrap().unwrap();
        assert_eq!(stored.prize_pool.as_deref(), Some("500"));
        assert_eq!(stored.sales_amount.as_deref(), Some("42"));

        let mut changed = ssq_draw("2025001", "2025-01-02", Some("999"));
        changed.sales_amount = Some("1".to_string());
        store.upsert(LotteryType::Ssq, &[changed]).unwrap();

        let stored = store.latest(LotteryType::Ssq).unwrap().unwrap();
        assert_eq!(stored.prize_pool.as_deref(), Some("500"));
        assert_eq!(stored.sales_amount.as_deref(), Some("42"));
    }

    #[test]
    fn test_range_returns_available_rows_newest_first() {
        let store = DrawStore::open_in_memory().unwrap();
        let draws: Vec<DrawResult> = (1..=7)
            .map(|i| ssq_draw(&format!("202500{i}"), &format!("2025-01-0{i}"), None))
            .collect();
        store.upsert(LotteryType::Ssq, &draws).unwrap();

        let range = store.range(LotteryType::Ssq, 100).unwrap();
        assert_eq!(range.len(), 7);
        assert_eq!(range[0].period, "2025007");
        assert_eq!(range[6].period, "2025001");

        let history = store.history(LotteryType::Ssq).unwrap();
        assert_eq!(history[0].period, "2025001");

        assert!(store.range(LotteryType::Kl8, 100).unwrap().is_empty());
        assert!(store.latest(LotteryType::Kl8).unwrap().is_none());
    }

    #[test]
    fn test_upsert_rejects_foreign_type() {
        let store = DrawStore::open_in_memory().unwrap();
        let err = store
            .upsert(LotteryType::Qlc, &[ssq_draw("2025001", "2025-01-02", None)])
            .unwrap_err();
        assert!(err.is_caller_error());
        assert_eq!(store.count(LotteryType::Qlc).unwrap(), 0);
    }

    #[test]
    fn test_sync_logs_and_database_info() {
        let store = DrawStore::open_in_memory().unwrap();
        store
            .upsert(LotteryType::Ssq, &[ssq_draw("2025001", "2025-01-02", None)])
            .unwrap();
        store
            .append_sync_log(&sync_entry(LotteryType::Ssq, SyncStatus::Success))
            .unwrap();
        let mut failed = sync_entry(LotteryType::Kl8, SyncStatus::Failure);
        failed.error_message = Some("timed out".to_string());
        store.append_sync_log(&failed).unwrap();

        let logs = store.recent_sync_logs(10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].lottery_type, LotteryType::Kl8);
        assert_eq!(logs[0].status, SyncStatus::Failure);
        assert_eq!(logs[0].error_message.as_deref(), Some("timed out"));

        let info = store.database_info(1).unwrap();
        assert_eq!(info.types.len(), 4);
        let ssq = &info.types[0];
        assert_eq!(ssq.records, 1);
        assert_eq!(ssq.latest_period.as_deref(), Some("2025001"));
        assert!(ssq.last_sync.is_some());
        assert!(info.types[1].last_sync.is_none());
        assert_eq!(info.recent_syncs.len(), 1);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lottery.db");
        {
            let store = DrawStore::open(&path).unwrap();
            store
                .upsert(LotteryType::Ssq, &[ssq_draw("2025001", "2025-01-02", None)])
                .unwrap();
        }
        let reopened = DrawStore::open(&path).unwrap();
        assert_eq!(reopened.count(LotteryType::Ssq).unwrap(), 1);
    }

    #[test]
    fn test_unwritable_parent_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = DrawStore::open(blocker.join("lottery.db")).err().unwrap();
        assert!(matches!(err, LotteryError::Io(_)));
        assert!(!err.is_caller_error());
    }
}
