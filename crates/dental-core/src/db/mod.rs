//! Document store for the patient service.
//!
//! Each collection is a SQLite table holding a few queryable columns plus the
//! JSON document. Writes that must become visible together go through a
//! [`UnitOfWork`], which wraps one immediate transaction: dropping it without
//! [`UnitOfWork::commit`] rolls every write back.

mod appointments;
mod patients;
mod plans;
mod schema;
mod visits;

pub use schema::*;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Another writer saved the document after it was loaded.
    #[error("Write conflict on {collection} {id}: expected version {expected}")]
    WriteConflict {
        collection: &'static str,
        id: String,
        expected: i64,
    },
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
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Autocommit access for reads and single-document writes.
    pub fn documents(&self) -> Documents<'_> {
        Documents { conn: &self.conn }
    }

    /// Begin a unit of work. The write lock is taken up front so concurrent
    /// read-modify-write cycles on the same patient serialise.
    pub fn unit_of_work(&mut self) -> DbResult<UnitOfWork<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(UnitOfWork { tx })
    }
}

/// One multi-document transaction.
pub struct UnitOfWork<'a> {
    tx: Transaction<'a>,
}

impl<'a> UnitOfWork<'a> {
    pub fn documents(&self) -> Documents<'_> {
        Documents { conn: &self.tx }
    }

    /// Make every write in this unit visible.
    pub fn commit(self) -> DbResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    /// Discard every write in this unit.
    pub fn rollback(self) -> DbResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

/// Collection operations over either a plain connection or a transaction.
#[derive(Clone, Copy)]
pub struct Documents<'c> {
    conn: &'c Connection,
}
