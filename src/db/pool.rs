//! Fixed-size SQLite connection pool with blocking acquisition.
//!
//! A saturated pool queues callers on a condvar rather than failing
//! fast; connections are returned on guard drop, including unwind
//! paths. `with_tx` gives scoped transactions: commit on success,
//! rollback on any error via rusqlite's drop-rollback.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};

use rusqlite::Connection;

use super::sqlite;
use super::DatabaseError;

#[derive(Clone)]
pub struct DbPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    conns: Mutex<Vec<Connection>>,
    available: Condvar,
}

impl DbPool {
    /// Open `size` connections against `path`. Migrations run once on
    /// the first connection before the pool is usable.
    pub fn open(path: &Path, size: usize) -> Result<Self, DatabaseError> {
        assert!(size > 0, "pool size must be at least 1");
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            conns.push(sqlite::open_database(path)?);
        }
        Ok(DbPool {
            inner: Arc::new(PoolInner {
                conns: Mutex::new(conns),
                available: Condvar::new(),
            }),
        })
    }

    /// Acquire a connection, blocking until one is free.
    pub fn get(&self) -> PooledConn {
        let mut guard = self
            .inner
            .conns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            if let Some(conn) = guard.pop() {
                return PooledConn {
                    conn: Some(conn),
                    pool: Arc::clone(&self.inner),
                };
            }
            guard = self
                .inner
                .available
                .wait(guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

/// A pooled connection; returns itself to the pool on drop.
pub struct PooledConn {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken")
    }
}

impl DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection taken")
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let mut guard = self
                .pool
                .conns
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.push(conn);
            self.pool.available.notify_one();
        }
    }
}

/// Run `f` inside a transaction: commit on `Ok`, rollback on `Err`.
/// The connection is released back to the pool on every exit path.
pub fn with_tx<T, F>(pool: &DbPool, f: F) -> Result<T, DatabaseError>
where
    F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, DatabaseError>,
{
    let mut conn = pool.get();
    let tx = conn.transaction()?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_pool(size: usize) -> (DbPool, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = DbPool::open(&tmp.path().join("test.db"), size).unwrap();
        (pool, tmp)
    }

    #[test]
    fn get_and_return_connection() {
        let (pool, _tmp) = temp_pool(1);
        {
            let conn = pool.get();
            let one: i64 = conn.query_row("SELECT 1", [], |r| r.get(0)).unwrap();
            assert_eq!(one, 1);
        }
        // Returned on drop; a second acquire must not block forever.
        let _again = pool.get();
    }

    #[test]
    fn with_tx_commits_on_ok() {
        let (pool, _tmp) = temp_pool(2);
        with_tx(&pool, |tx| {
            tx.execute("INSERT INTO patient (name) VALUES ('Ana')", [])?;
            Ok(())
        })
        .unwrap();

        let conn = pool.get();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM patient", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn with_tx_rolls_back_on_err() {
        let (pool, _tmp) = temp_pool(2);
        let result: Result<(), DatabaseError> = with_tx(&pool, |tx| {
            tx.execute("INSERT INTO patient (name) VALUES ('Ana')", [])?;
            Err(DatabaseError::NotFound {
                entity_type: "patient".into(),
                id: "x".into(),
            })
        });
        assert!(result.is_err());

        let conn = pool.get();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM patient", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn saturated_pool_waits_for_release() {
        let (pool, _tmp) = temp_pool(1);
        let conn = pool.get();

        let pool2 = pool.clone();
        let waiter = std::thread::spawn(move || {
            let _conn = pool2.get();
        });

        std::thread::sleep(std::time::Duration::from_millis(50));
        drop(conn);
        waiter.join().unwrap();
    }
}
