use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{trace, warn};

use crate::db::Db;

/// One connection inside an open read transaction.
///
/// The transaction's snapshot is fixed by the first read, which happens in
/// [`SqliteSnapshot::begin`]; it is rolled back when the snapshot is dropped.
pub struct SqliteSnapshot {
    conn: Mutex<Connection>,
    open: Arc<AtomicUsize>,
}

impl SqliteSnapshot {
    pub(crate) fn begin(db: &Db, open: Arc<AtomicUsize>) -> Result<Self, String> {
        let conn = db.open()?;
        conn.execute_batch("BEGIN DEFERRED")
            .map_err(|error| format!("begin read transaction: {error}"))?;
        // A deferred transaction takes its snapshot at the first read.
        conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|error| format!("pin read snapshot: {error}"))?;
        let now_open = open.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(open = now_open, "sqlite snapshot begun");
        Ok(Self {
            conn: Mutex::new(conn),
            open,
        })
    }

    /// Runs `f` against the snapshot's connection. Calls are serialized.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<T> {
        f(&self.conn.lock())
    }
}

impl Drop for SqliteSnapshot {
    fn drop(&mut self) {
        if let Err(error) = self.conn.get_mut().execute_batch("ROLLBACK") {
            warn!(%error, "rollback read transaction");
        }
        let now_open = self.open.fetch_sub(1, Ordering::SeqCst) - 1;
        trace!(open = now_open, "sqlite snapshot released");
    }
}

impl fmt::Debug for SqliteSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteSnapshot").finish_non_exhaustive()
    }
}
