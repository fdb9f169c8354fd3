//! # write-to-server
//!
//! Bulk insert for mapped entities into SQL Server.
//!
//! A [`DbContext`] registers a [`TableMapping`] per entity type. Bulk inserts
//! build an in-memory tabular buffer matching that mapping and stream it to
//! the server through the TDS bulk-load channel:
//!
//! - **Mapping cache**: each context type's model is described once and
//!   reused for the life of the process
//! - **Tabular buffer**: one row per entity, checked against column types,
//!   nullability, max lengths and primary keys before anything is sent
//! - **Transactions**: all batches of a call commit or roll back together
//!
//! ## Example
//!
//! ```rust,no_run
//! use write_to_server::{
//!     BulkInsertExt, ColumnMapping, DbContext, Entity, ModelBuilder, Property, Settings,
//!     SqlType, SqlValue, TableMapping,
//! };
//!
//! struct Person {
//!     id: i32,
//!     name: Option<String>,
//! }
//!
//! impl Entity for Person {
//!     fn properties() -> &'static [Property<Self>] {
//!         const PROPERTIES: &[Property<Person>] = &[
//!             Property::required("Id", SqlType::I32, |p| SqlValue::I32(p.id)),
//!             Property::optional("Name", SqlType::String, |p| {
//!                 SqlValue::nullable(p.name.as_deref(), SqlType::String)
//!             }),
//!         ];
//!         PROPERTIES
//!     }
//! }
//!
//! struct AppContext {
//!     settings: Settings,
//! }
//!
//! impl DbContext for AppContext {
//!     fn settings(&self) -> &Settings {
//!         &self.settings
//!     }
//!
//!     fn on_model_creating(&self, model: &mut ModelBuilder) {
//!         model.entity::<Person>(
//!             TableMapping::new("dbo", "People")
//!                 .column(ColumnMapping::new("Id").identity().primary_key())
//!                 .column(ColumnMapping::new("Name").max_length(100)),
//!         );
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> write_to_server::Result<()> {
//!     let ctx = AppContext {
//!         settings: Settings::load("config.yaml")?,
//!     };
//!     let people = vec![Person { id: 0, name: Some("Ann".into()) }];
//!     let summary = ctx.bulk_insert(&people, 1000).await?;
//!     println!("Inserted {} rows", summary.rows);
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod context;
pub mod core;
pub mod ddl;
pub mod driver;
pub mod error;
pub mod extensions;
pub mod mapping;
pub mod provider;

// Re-exports for convenient access
pub use buffer::{create_buffer, BufferColumn, BufferSchema, TabularBuffer};
pub use config::{BulkSettings, Settings};
pub use context::DbContext;
pub use crate::core::{SqlType, SqlValue};
pub use driver::{BulkConnection, Connector, TiberiusConnector};
pub use error::{Error, Result};
pub use extensions::{BulkInsertExt, DEFAULT_BATCH_SIZE};
pub use mapping::{
    ColumnMapping, DbMapping, Entity, MappingCache, ModelBuilder, Property, TableMapping,
};
pub use provider::{BulkInsertSummary, BulkOperationProvider};
