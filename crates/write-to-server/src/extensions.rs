//! Bulk insert methods on every [`DbContext`].

use crate::context::DbContext;
use crate::error::Result;
use crate::mapping::Entity;
use crate::provider::{BulkInsertSummary, BulkOperationProvider};

/// Rows per bulk load when the caller does not choose.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Bulk insert entry points, available on any context.
///
/// # Example
///
/// ```rust,no_run
/// use write_to_server::{BulkInsertExt, DbContext, DEFAULT_BATCH_SIZE};
/// # async fn run<C: DbContext, E: write_to_server::Entity>(ctx: &C, rows: &[E])
/// #     -> write_to_server::Result<()> {
/// let summary = ctx.bulk_insert(rows, DEFAULT_BATCH_SIZE).await?;
/// println!("{} rows into {}", summary.rows, summary.table);
/// # Ok(())
/// # }
/// ```
#[allow(async_fn_in_trait)]
pub trait BulkInsertExt: DbContext + Sized {
    /// Insert `entities` in one transaction, `batch_size` rows per bulk load.
    async fn bulk_insert<E: Entity>(
        &self,
        entities: &[E],
        batch_size: usize,
    ) -> Result<BulkInsertSummary> {
        BulkOperationProvider::new(self)?
            .insert(entities, batch_size)
            .await
    }

    /// Insert `entities` without a transaction.
    async fn bulk_insert_no_transaction<E: Entity>(
        &self,
        entities: &[E],
        batch_size: usize,
    ) -> Result<BulkInsertSummary> {
        BulkOperationProvider::new(self)?
            .insert_no_transaction(entities, batch_size)
            .await
    }

    /// Insert `entities` in one transaction using the configured batch size.
    async fn bulk_insert_default<E: Entity>(&self, entities: &[E]) -> Result<BulkInsertSummary> {
        let batch_size = self.settings().bulk.batch_size;
        self.bulk_insert(entities, batch_size).await
    }
}

impl<C: DbContext> BulkInsertExt for C {}
