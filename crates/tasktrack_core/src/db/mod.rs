//! SQLite storage bootstrap and schema migrations.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the tracker.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Repositories must not touch data before migrations succeed.
//! - Repository writes accumulate in one pending transaction per connection
//!   until [`commit_pending_write`] flushes them or
//!   [`rollback_pending_write`] drops them.

use log::warn;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Connection was opened without the tracker schema applied.
    SchemaNotReady {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::SchemaNotReady {
                expected_version,
                actual_version,
            } => write!(
                f,
                "database schema version {actual_version} does not match expected {expected_version}; open it with open_db"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::SchemaNotReady { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Opens the pending write transaction unless one is already active.
pub(crate) fn begin_pending_write(conn: &Connection) -> DbResult<()> {
    if conn.is_autocommit() {
        conn.execute_batch("BEGIN IMMEDIATE;")?;
    }
    Ok(())
}

/// Commits the pending write transaction, if any.
///
/// A failed commit (for example a deferred foreign-key violation) rolls the
/// whole batch back so the connection is usable again.
pub fn commit_pending_write(conn: &Connection) -> DbResult<()> {
    if conn.is_autocommit() {
        return Ok(());
    }
    if let Err(err) = conn.execute_batch("COMMIT;") {
        if let Err(rollback_err) = conn.execute_batch("ROLLBACK;") {
            warn!("event=db_commit module=db status=error rollback_error={rollback_err}");
        }
        return Err(err.into());
    }
    Ok(())
}

/// Discards the pending write transaction, if any.
pub fn rollback_pending_write(conn: &Connection) -> DbResult<()> {
    if conn.is_autocommit() {
        return Ok(());
    }
    conn.execute_batch("ROLLBACK;")?;
    Ok(())
}

/// Runs `write` inside a savepoint so a failed item leaves no partial rows
/// in the pending transaction.
pub(crate) fn within_savepoint<R, E>(
    conn: &Connection,
    write: impl FnOnce() -> Result<R, E>,
) -> Result<R, E>
where
    E: From<rusqlite::Error>,
{
    conn.execute_batch("SAVEPOINT pending_item;")?;
    match write() {
        Ok(value) => {
            conn.execute_batch("RELEASE pending_item;")?;
            Ok(value)
        }
        Err(err) => {
            if let Err(undo_err) =
                conn.execute_batch("ROLLBACK TO pending_item; RELEASE pending_item;")
            {
                warn!("event=db_savepoint module=db status=error rollback_error={undo_err}");
            }
            Err(err)
        }
    }
}
