//! Bulk operation provider.
//!
//! Runs one bulk insert end to end: open a connection, optionally begin a
//! transaction, resolve the context's mapping, build the tabular buffer, and
//! stream it to the server batch by batch. The connection is owned by the
//! call and closed when it returns.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::buffer::create_buffer;
use crate::context::DbContext;
use crate::ddl;
use crate::driver::BulkConnection;
use crate::error::{Error, Result};
use crate::mapping::{Entity, MappingCache};

/// Outcome of a completed bulk insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkInsertSummary {
    /// Destination as `[schema].[table]`.
    pub table: String,

    /// Rows written.
    pub rows: u64,

    /// Bulk loads issued.
    pub batches: usize,
}

/// Bulk insert runner bound to one context.
pub struct BulkOperationProvider<'c, C: DbContext> {
    context: &'c C,
    connection_string: &'c str,
    cache: &'c MappingCache,
}

impl<'c, C: DbContext> BulkOperationProvider<'c, C> {
    /// Bind to `context`, looking up its connection string by context name.
    pub fn new(context: &'c C) -> Result<Self> {
        let connection_string = context.settings().connection_string(context.name())?;
        Ok(Self {
            context,
            connection_string,
            cache: MappingCache::global(),
        })
    }

    /// Resolve mappings through `cache` instead of the process-wide one.
    pub fn with_cache(mut self, cache: &'c MappingCache) -> Self {
        self.cache = cache;
        self
    }

    /// Insert `entities` inside one transaction.
    ///
    /// Rows are sent in bulk loads of `batch_size` rows (`0` sends everything
    /// in one load). Any failure after the transaction began rolls it back
    /// and is returned as [`Error::Aborted`] wrapping the cause.
    pub async fn insert<E: Entity>(
        &self,
        entities: &[E],
        batch_size: usize,
    ) -> Result<BulkInsertSummary> {
        let started = Instant::now();
        let mut conn = self.connect().await?;
        conn.begin_transaction().await?;

        let mut table = E::entity_name().to_string();
        let result = async {
            let summary = self
                .transfer(conn.as_mut(), entities, batch_size, &mut table)
                .await?;
            conn.commit().await?;
            Ok::<_, Error>(summary)
        }
        .await;

        match result {
            Ok(summary) => {
                info!(
                    "Committed {} rows into {} in {} batches ({:?})",
                    summary.rows,
                    summary.table,
                    summary.batches,
                    started.elapsed()
                );
                Ok(summary)
            }
            Err(source) => {
                let rolled_back = match conn.rollback().await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Rollback of bulk insert into {} failed: {}", table, e);
                        false
                    }
                };
                Err(Error::Aborted {
                    table,
                    rolled_back,
                    source: Box::new(source),
                })
            }
        }
    }

    /// Insert `entities` without a transaction.
    ///
    /// Errors are returned as they occur; batches already written stay.
    pub async fn insert_no_transaction<E: Entity>(
        &self,
        entities: &[E],
        batch_size: usize,
    ) -> Result<BulkInsertSummary> {
        let started = Instant::now();
        let mut conn = self.connect().await?;
        let mut table = E::entity_name().to_string();
        let summary = self
            .transfer(conn.as_mut(), entities, batch_size, &mut table)
            .await?;

        info!(
            "Inserted {} rows into {} in {} batches ({:?})",
            summary.rows,
            summary.table,
            summary.batches,
            started.elapsed()
        );
        Ok(summary)
    }

    /// Create the table mapped for `E` unless it already exists.
    pub async fn ensure_table<E: Entity>(&self) -> Result<()> {
        let mapping = self.cache.resolve(self.context)?;
        let table = mapping.table::<E>()?;
        let sql = ddl::create_table_if_not_exists_sql(table)?;

        let mut conn = self.connect().await?;
        conn.execute(&sql).await?;
        debug!("Ensured table {}", table.qualified_name());
        Ok(())
    }

    async fn connect(&self) -> Result<Box<dyn BulkConnection>> {
        debug!("Connecting for context {}", self.context.name());
        self.context
            .connector()
            .connect(self.connection_string)
            .await
    }

    async fn transfer<E: Entity>(
        &self,
        conn: &mut dyn BulkConnection,
        entities: &[E],
        batch_size: usize,
        table: &mut String,
    ) -> Result<BulkInsertSummary> {
        let mapping = self.cache.resolve(self.context)?;
        let table_mapping = mapping.table::<E>()?;
        *table = table_mapping.qualified_name();

        let buffer = create_buffer(table_mapping, entities)?;
        let chunk_size = if batch_size == 0 {
            buffer.len().max(1)
        } else {
            batch_size
        };

        let mut rows = 0u64;
        let mut batches = 0usize;
        for batch in buffer.rows().chunks(chunk_size) {
            let written = conn.write_batch(buffer.schema(), batch).await?;
            batches += 1;
            rows += written;
            debug!("{}: batch {} wrote {} rows", table, batches, written);
        }

        Ok(BulkInsertSummary {
            table: table.clone(),
            rows,
            batches,
        })
    }
}
