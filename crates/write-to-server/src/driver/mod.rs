//! Database driver seam.
//!
//! The provider talks to the server through two traits so the bulk insert
//! flow does not depend on a particular driver:
//!
//! - [`Connector`]: opens a connection from an ADO connection string
//! - [`BulkConnection`]: transaction control plus the native bulk load
//!
//! [`TiberiusConnector`] is the SQL Server implementation.

mod mssql;

use async_trait::async_trait;

use crate::buffer::BufferSchema;
use crate::core::SqlValue;
use crate::error::Result;

pub use mssql::{MssqlConnection, TiberiusConnector};

/// Open connections for a context.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect using an ADO connection string.
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn BulkConnection>>;
}

/// A single open connection.
///
/// Dropping the connection closes it; an open transaction is rolled back by
/// the server when the connection goes away.
#[async_trait]
pub trait BulkConnection: Send {
    /// Run a SQL batch and discard its results.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Start a transaction that the following batches join.
    async fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction, if any.
    async fn rollback(&mut self) -> Result<()>;

    /// Stream one batch of buffer rows into the schema's table.
    ///
    /// Each row holds one value per writable column, in schema order.
    /// Returns the number of rows written.
    async fn write_batch(&mut self, schema: &BufferSchema, rows: &[Vec<SqlValue<'_>>])
        -> Result<u64>;
}
