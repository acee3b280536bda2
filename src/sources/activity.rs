//! Platform activity from the internal SQLite store
//!
//! The store is opened read-only and queried on the blocking pool. There is no
//! external fallback: when the store is not configured or a query fails, the
//! adapter serves the static activity default.

use super::{Backend, FetchError, SourceAdapter};
use crate::records::ActivityRecord;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const STORE_TIMEOUT: Duration = Duration::from_secs(5);
const ACTIVE_WINDOW_SECS: i64 = 60 * 60;
const TRANSACTION_WINDOW_SECS: i64 = 24 * 60 * 60;
const TOP_SYMBOL_LIMIT: i64 = 5;

pub fn adapter(db_path: Option<PathBuf>) -> SourceAdapter<ActivityRecord> {
    let store = db_path.map(SqliteActivityStore::new);
    SourceAdapter::new(vec![Box::new(StoreBackend::new(store))])
}

/// Read-only handle on the activity database, connected on first use
#[derive(Clone)]
pub struct SqliteActivityStore {
    path: PathBuf,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteActivityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Open the connection now instead of on the first query
    pub async fn open(&self) -> Result<(), FetchError> {
        let store = self.clone();
        run_blocking(move || store.with_connection(|_| Ok(()))).await
    }

    /// Snapshot of the last hour of sessions and the last day of transactions
    pub async fn snapshot(&self) -> Result<ActivityRecord, FetchError> {
        let store = self.clone();
        let now = Utc::now();
        let now_secs = now.timestamp();

        let (active_users, transactions_24h, total_volume_24h, top_symbols) =
            run_blocking(move || store.with_connection(|conn| query_activity(conn, now_secs)))
                .await?;

        Ok(ActivityRecord {
            active_users,
            transactions_24h,
            total_volume_24h,
            top_symbols,
            timestamp: now,
        })
    }

    /// Drop the connection; repeated calls are no-ops
    pub fn close(&self) -> bool {
        let closed = self
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();

        if closed {
            log::debug!("🔌 Closed activity store {}", self.path.display());
        }
        closed
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        if guard.is_none() {
            let conn = Connection::open_with_flags(
                &self.path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.execute_batch("PRAGMA query_only = ON")?;
            log::debug!("📥 Opened activity store {}", self.path.display());
            *guard = Some(conn);
        }

        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(FetchError::Store("connection unavailable".to_string())),
        }
    }
}

type ActivityCounts = (u64, u64, f64, Vec<String>);

fn query_activity(conn: &Connection, now_secs: i64) -> Result<ActivityCounts, FetchError> {
    let active_since = now_secs - ACTIVE_WINDOW_SECS;
    let tx_since = now_secs - TRANSACTION_WINDOW_SECS;

    let active_users: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT user_id) FROM user_sessions WHERE last_active >= ?1",
        params![active_since],
        |row| row.get(0),
    )?;

    let (transactions, volume): (i64, f64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0.0) FROM transactions WHERE created_at >= ?1",
        params![tx_since],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let mut stmt = conn.prepare(
        "SELECT symbol, COUNT(*) AS trades
         FROM transactions
         WHERE created_at >= ?1
         GROUP BY symbol
         ORDER BY trades DESC, symbol ASC
         LIMIT ?2",
    )?;
    let top_symbols = stmt
        .query_map(params![tx_since, TOP_SYMBOL_LIMIT], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((
        active_users.max(0) as u64,
        transactions.max(0) as u64,
        volume.max(0.0),
        top_symbols,
    ))
}

async fn run_blocking<T, F>(f: F) -> Result<T, FetchError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| FetchError::Store(format!("store task failed: {}", e)))?
}

/// Single-tier backend over the activity store
pub struct StoreBackend {
    store: Option<SqliteActivityStore>,
}

impl StoreBackend {
    pub fn new(store: Option<SqliteActivityStore>) -> Self {
        Self { store }
    }

    fn store(&self) -> Result<&SqliteActivityStore, FetchError> {
        self.store
            .as_ref()
            .ok_or_else(|| FetchError::Unavailable("ACTIVITY_DB_PATH not set".to_string()))
    }
}

#[async_trait]
impl Backend<ActivityRecord> for StoreBackend {
    fn name(&self) -> &str {
        "activity_store"
    }

    fn timeout(&self) -> Duration {
        STORE_TIMEOUT
    }

    async fn fetch(&self, _selector: &str) -> Result<ActivityRecord, FetchError> {
        self.store()?.snapshot().await
    }

    async fn open(&self) -> Result<(), FetchError> {
        match &self.store {
            Some(store) => store.open().await,
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<(), FetchError> {
        if let Some(store) = &self.store {
            store.close();
        }
        Ok(())
    }
}
