//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas and apply migrations before handing the
//!   connection to the store.
//! - Ping with bounded Fibonacci backoff before the process serves traffic.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::retry::RetryPolicy;
use super::{DbError, DbResult};
use log::{error, info, warn};
use rusqlite::Connection;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Busy timeout applied when callers do not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_logged("file", DEFAULT_BUSY_TIMEOUT, || Connection::open(path))
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_logged("memory", DEFAULT_BUSY_TIMEOUT, Connection::open_in_memory)
}

/// Opens a database file, pinging it until it answers or `policy` runs out
/// of attempts.
///
/// Only unavailability failures (busy, locked, cannot open, I/O) are retried.
/// Schema and statement failures are returned on the first attempt.
///
/// # Errors
/// - `DbError::RetryExhausted` wrapping the last failure once every attempt
///   has failed.
pub fn open_db_with_retry(
    path: impl AsRef<Path>,
    busy_timeout: Duration,
    policy: &RetryPolicy,
) -> DbResult<Connection> {
    let path = path.as_ref();
    let mut delays = policy.backoff();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let result = open_logged("file", busy_timeout, || Connection::open(path))
            .and_then(|conn| ping(&conn).map(|()| conn));

        let err = match result {
            Ok(conn) => return Ok(conn),
            Err(err) => err,
        };

        if !err.is_unavailable() {
            return Err(err);
        }

        match delays.next() {
            Some(delay) => {
                warn!(
                    "event=db_ping module=db status=retry attempt={} delay_ms={} error={}",
                    attempt,
                    delay.as_millis(),
                    err
                );
                thread::sleep(delay);
            }
            None => {
                error!(
                    "event=db_ping module=db status=error attempts={} error_code=retry_exhausted error={}",
                    attempt, err
                );
                return Err(DbError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
        }
    }
}

fn ping(conn: &Connection) -> DbResult<()> {
    conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))?;
    Ok(())
}

fn open_logged<F>(mode: &str, busy_timeout: Duration, opener: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match opener() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, busy_timeout) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    apply_migrations(conn)?;
    Ok(())
}
