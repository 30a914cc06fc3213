//! Durable n-gram counter store.
//!
//! All writes funnel through a single writer thread fed by a bounded channel:
//! increments are fire-and-forget from the capture path and applied in
//! submission order, so concurrent callers can never lose an update. Reads
//! share the connection behind a mutex and observe the latest committed
//! state. Storage failures are logged and swallowed; losing a counter
//! increment is preferable to destabilizing the live event listener.

use crossbeam_channel::{bounded, Receiver, Sender};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use super::schema;
use super::StoreError;

/// The three independent counter tables, one per n-gram order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgramTable {
    Characters,
    Bigrams,
    Trigrams,
}

impl NgramTable {
    pub const ALL: [NgramTable; 3] = [
        NgramTable::Characters,
        NgramTable::Bigrams,
        NgramTable::Trigrams,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            NgramTable::Characters => "characters",
            NgramTable::Bigrams => "bigrams",
            NgramTable::Trigrams => "trigrams",
        }
    }

    pub fn key_column(self) -> &'static str {
        match self {
            NgramTable::Characters => "char",
            NgramTable::Bigrams => "bigram",
            NgramTable::Trigrams => "trigram",
        }
    }
}

impl std::str::FromStr for NgramTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "characters" | "chars" => Ok(NgramTable::Characters),
            "bigrams" => Ok(NgramTable::Bigrams),
            "trigrams" => Ok(NgramTable::Trigrams),
            other => Err(format!(
                "unknown table '{other}' (expected characters, bigrams, or trigrams)"
            )),
        }
    }
}

/// Pending write operations, drained in order by the writer thread.
enum WriteOp {
    Increment {
        table: NgramTable,
        key: String,
    },
    ClearAll {
        ack: Sender<Result<(), StoreError>>,
    },
    Relocate {
        path: PathBuf,
        ack: Sender<Result<(), StoreError>>,
    },
    /// Barrier: acknowledged once every previously queued op has been applied.
    Flush {
        ack: Sender<()>,
    },
}

/// Capacity of the write queue. Increments beyond this are dropped rather
/// than blocking the capture path.
const WRITE_QUEUE_CAPACITY: usize = 10_000;

/// Handle to the counter database.
///
/// Cheap to share via `Arc`; the capture path only ever enqueues onto the
/// write channel.
pub struct CountStore {
    conn: Arc<Mutex<Connection>>,
    write_tx: Option<Sender<WriteOp>>,
    writer: Option<JoinHandle<()>>,
}

impl CountStore {
    /// Open (or create) the counter database at `path`, creating parent
    /// directories as needed, and start the writer thread.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = open_connection(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        let conn = Arc::new(Mutex::new(conn));
        let (write_tx, write_rx) = bounded(WRITE_QUEUE_CAPACITY);

        let writer_conn = conn.clone();
        let writer = thread::spawn(move || writer_loop(writer_conn, write_rx));

        Self {
            conn,
            write_tx: Some(write_tx),
            writer: Some(writer),
        }
    }

    /// Enqueue an increment for `key` in `table`: insert with count 1 on
    /// first occurrence, otherwise add 1 atomically.
    ///
    /// Fire-and-forget: never blocks and never reports failure to the
    /// caller. Dropped (queue full or writer gone) increments are lost by
    /// design rather than stalling capture.
    pub fn increment(&self, table: NgramTable, key: &str) {
        if let Some(tx) = &self.write_tx {
            let _ = tx.try_send(WriteOp::Increment {
                table,
                key: key.to_owned(),
            });
        }
    }

    /// Top `n` rows of `table` ordered by count descending, key ascending on
    /// ties. Returns an empty vec if the table is empty or unreadable.
    pub fn top_n(&self, table: NgramTable, n: u32) -> Vec<(String, u64)> {
        match self.try_top_n(table, n) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(table = table.table_name(), error = %e, "top-n query failed");
                Vec::new()
            }
        }
    }

    fn try_top_n(&self, table: NgramTable, n: u32) -> Result<Vec<(String, u64)>, StoreError> {
        let conn = self.lock_conn();
        let sql = format!(
            "SELECT {key}, count FROM {table} ORDER BY count DESC, {key} ASC LIMIT ?1",
            key = table.key_column(),
            table = table.table_name(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([n], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Sum of all counts in `table`, or 0 if empty or unreadable.
    pub fn total_count(&self, table: NgramTable) -> u64 {
        let result: Result<i64, StoreError> = (|| {
            let conn = self.lock_conn();
            let sql = format!(
                "SELECT COALESCE(SUM(count), 0) FROM {}",
                table.table_name()
            );
            Ok(conn.query_row(&sql, [], |r| r.get(0))?)
        })();

        match result {
            Ok(total) => total.max(0) as u64,
            Err(e) => {
                tracing::warn!(table = table.table_name(), error = %e, "total count query failed");
                0
            }
        }
    }

    /// Delete every row from all three tables.
    ///
    /// Runs on the writer thread behind an acknowledgement, so increments
    /// queued before the clear land first and reads issued after this
    /// returns observe the post-clear state.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let (ack_tx, ack_rx) = bounded(1);
        self.send(WriteOp::ClearAll { ack: ack_tx })?;
        ack_rx.recv().map_err(|_| StoreError::WriterGone)?
    }

    /// Switch the backing database to `path`, creating the destination
    /// directory hierarchy and schema before any subsequent operation
    /// targets it. Pending writes to the old location are applied there
    /// first; the old file is left as-is.
    pub fn relocate(&self, path: &Path) -> Result<(), StoreError> {
        let (ack_tx, ack_rx) = bounded(1);
        self.send(WriteOp::Relocate {
            path: path.to_owned(),
            ack: ack_tx,
        })?;
        ack_rx.recv().map_err(|_| StoreError::WriterGone)?
    }

    /// Block until every previously enqueued write has been applied.
    pub fn flush(&self) -> Result<(), StoreError> {
        let (ack_tx, ack_rx) = bounded(1);
        self.send(WriteOp::Flush { ack: ack_tx })?;
        ack_rx.recv().map_err(|_| StoreError::WriterGone)
    }

    fn send(&self, op: WriteOp) -> Result<(), StoreError> {
        let tx = self.write_tx.as_ref().ok_or(StoreError::WriterGone)?;
        tx.send(op).map_err(|_| StoreError::WriterGone)
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Poisoning only occurs if a writer panicked mid-operation; the
        // connection itself is still usable for reads.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for CountStore {
    fn drop(&mut self) {
        // Closing the channel lets the writer drain remaining ops and exit.
        self.write_tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

/// Open a connection with pragmas and schema applied, creating parent
/// directories as needed.
fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;
    schema::run_migrations(&conn)?;
    Ok(conn)
}

/// Writer thread: applies queued operations in submission order until the
/// sending side closes.
fn writer_loop(conn: Arc<Mutex<Connection>>, rx: Receiver<WriteOp>) {
    for op in rx.iter() {
        match op {
            WriteOp::Increment { table, key } => {
                if let Err(e) = apply_increment(&conn, table, &key) {
                    // Best-effort durability: log and move on.
                    tracing::warn!(table = table.table_name(), error = %e, "increment failed");
                }
            }
            WriteOp::ClearAll { ack } => {
                let result = apply_clear_all(&conn);
                if let Err(ref e) = result {
                    tracing::warn!(error = %e, "clear failed");
                }
                let _ = ack.send(result);
            }
            WriteOp::Relocate { path, ack } => {
                let result = apply_relocate(&conn, &path);
                match &result {
                    Ok(()) => tracing::info!(path = %path.display(), "counter store relocated"),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "relocate failed"),
                }
                let _ = ack.send(result);
            }
            WriteOp::Flush { ack } => {
                let _ = ack.send(());
            }
        }
    }
}

fn apply_increment(
    conn: &Arc<Mutex<Connection>>,
    table: NgramTable,
    key: &str,
) -> Result<(), StoreError> {
    let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
    let sql = format!(
        "INSERT INTO {table} ({key}, count) VALUES (?1, 1) \
         ON CONFLICT({key}) DO UPDATE SET count = count + 1",
        table = table.table_name(),
        key = table.key_column(),
    );
    conn.execute(&sql, [key])?;
    Ok(())
}

fn apply_clear_all(conn: &Arc<Mutex<Connection>>) -> Result<(), StoreError> {
    let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
    let tx = guard.transaction()?;
    for table in NgramTable::ALL {
        tx.execute(&format!("DELETE FROM {}", table.table_name()), [])?;
    }
    tx.commit()?;
    Ok(())
}

fn apply_relocate(conn: &Arc<Mutex<Connection>>, path: &Path) -> Result<(), StoreError> {
    // Open and migrate the destination before touching the shared handle;
    // on failure the old location stays active.
    let new_conn = open_connection(path)?;
    let mut guard = conn.lock().unwrap_or_else(|e| e.into_inner());
    *guard = new_conn;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_creates_then_adds() {
        let store = CountStore::open_in_memory().unwrap();
        for _ in 0..5 {
            store.increment(NgramTable::Characters, "e");
        }
        store.flush().unwrap();

        let top = store.top_n(NgramTable::Characters, 1);
        assert_eq!(top, vec![("e".to_string(), 5)]);
    }

    #[test]
    fn test_tables_independent() {
        let store = CountStore::open_in_memory().unwrap();
        store.increment(NgramTable::Characters, "a");
        store.increment(NgramTable::Bigrams, "ab");
        store.flush().unwrap();

        assert_eq!(store.total_count(NgramTable::Characters), 1);
        assert_eq!(store.total_count(NgramTable::Bigrams), 1);
        assert_eq!(store.total_count(NgramTable::Trigrams), 0);
    }

    #[test]
    fn test_top_n_orders_and_breaks_ties_deterministically() {
        let store = CountStore::open_in_memory().unwrap();
        for _ in 0..3 {
            store.increment(NgramTable::Characters, "z");
        }
        store.increment(NgramTable::Characters, "b");
        store.increment(NgramTable::Characters, "a");
        store.flush().unwrap();

        let top = store.top_n(NgramTable::Characters, 10);
        assert_eq!(
            top,
            vec![
                ("z".to_string(), 3),
                ("a".to_string(), 1),
                ("b".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_clear_all_empties_every_table() {
        let store = CountStore::open_in_memory().unwrap();
        store.increment(NgramTable::Characters, "a");
        store.increment(NgramTable::Bigrams, "ab");
        store.increment(NgramTable::Trigrams, "abc");
        store.clear_all().unwrap();

        for table in NgramTable::ALL {
            assert!(store.top_n(table, 10).is_empty());
            assert_eq!(store.total_count(table), 0);
        }
    }

    #[test]
    fn test_table_parse() {
        assert_eq!(
            "characters".parse::<NgramTable>().unwrap(),
            NgramTable::Characters
        );
        assert_eq!("bigrams".parse::<NgramTable>().unwrap(), NgramTable::Bigrams);
        assert!("quadgrams".parse::<NgramTable>().is_err());
    }
}
