//! Database layer for the clinic service.

mod schema;
mod catalog;
mod patients;
mod sessions;
mod packages;
mod applications;
mod ledger;
mod drafts;

pub use schema::*;
#[allow(unused_imports)]
pub use catalog::*;
#[allow(unused_imports)]
pub use patients::*;
#[allow(unused_imports)]
pub use sessions::*;
#[allow(unused_imports)]
pub use packages::*;
#[allow(unused_imports)]
pub use applications::*;
#[allow(unused_imports)]
pub use ledger::*;
#[allow(unused_imports)]
pub use drafts::*;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::models::quantity_to_milli;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Duplicate value: {0}")]
    Duplicate(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                let detail = message.clone().unwrap_or_else(|| failure.to_string());
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                {
                    DbError::Duplicate(detail)
                } else {
                    DbError::Constraint(detail)
                }
            }
            _ => DbError::Sqlite(e),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write-locking transaction.
    ///
    /// `BEGIN IMMEDIATE` takes the database write lock up front, so a
    /// read-validate-write sequence cannot interleave with another writer on
    /// any connection to the same file. Every `Database` method called while
    /// the returned guard is alive runs inside it; dropping the guard without
    /// `commit()` rolls back.
    pub fn immediate(&self) -> DbResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Open a named savepoint inside the current transaction.
    ///
    /// Dropping the guard without `release()` undoes only what was written
    /// since the savepoint; the enclosing transaction stays open.
    pub fn savepoint(&self, name: &'static str) -> DbResult<Savepoint<'_>> {
        self.conn.execute_batch(&format!("SAVEPOINT {}", name))?;
        Ok(Savepoint {
            conn: &self.conn,
            name,
            released: false,
        })
    }
}

/// Guard for a savepoint opened by [`Database::savepoint`].
pub struct Savepoint<'a> {
    conn: &'a Connection,
    name: &'static str,
    released: bool,
}

impl Savepoint<'_> {
    /// Keep everything written since the savepoint.
    pub fn release(mut self) -> DbResult<()> {
        self.released = true;
        self.conn.execute_batch(&format!("RELEASE {}", self.name))?;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self
            .conn
            .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", self.name))
        {
            tracing::warn!(savepoint = self.name, error = %e, "Savepoint rollback failed");
        }
    }
}

/// Current time as a sortable RFC 3339 UTC timestamp.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a money column stored as decimal text.
pub(crate) fn parse_decimal(column: &str, value: &str) -> DbResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| DbError::Constraint(format!("Invalid decimal in {}: {} ({})", column, value, e)))
}

/// Scale a clinical quantity to the stored thousandths.
pub(crate) fn quantity_column(column: &str, value: f64) -> DbResult<i64> {
    quantity_to_milli(value)
        .ok_or_else(|| DbError::Constraint(format!("Invalid quantity in {}: {}", column, value)))
}

/// Parse a stored RFC 3339 timestamp.
pub(crate) fn parse_timestamp(value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DbError::Constraint(format!("Invalid timestamp {}: {}", value, e)))
}
