//! In-memory stand-in for SQL Server used by the integration tests.
//!
//! Tables accept bulk loads, assign identity values, and hold uncommitted
//! rows per connection until commit.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use write_to_server::{
    BufferSchema, BulkConnection, ColumnMapping, Connector, DbContext, Entity, Error,
    ModelBuilder, Property, Result, Settings, SqlType, SqlValue, TableMapping,
};

pub const TEST_CONNECTION_STRING: &str =
    "Server=tcp:localhost,1433;Database=test;User Id=sa;Password=secret";

/// A stored row: column name to value, identity columns included.
pub type StoredRow = BTreeMap<String, SqlValue<'static>>;

#[derive(Debug, Default)]
struct ServerState {
    tables: HashMap<String, Vec<StoredRow>>,
    identities: HashMap<String, i64>,
    connections: usize,
    commits: usize,
    rollbacks: usize,
    executed: Vec<String>,
    fail_on_batch: Option<usize>,
}

/// Shared in-memory server; clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th bulk load (1-based) of every later connection.
    pub fn fail_on_batch(&self, n: usize) {
        self.state.lock().unwrap().fail_on_batch = Some(n);
    }

    /// Committed rows of `table` (`[schema].[table]`).
    pub fn rows(&self, table: &str) -> Vec<StoredRow> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state.lock().unwrap().rollbacks
    }

    /// SQL batches run through `execute`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }
}

#[async_trait]
impl Connector for MemoryServer {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn BulkConnection>> {
        if !connection_string.contains("Server=") {
            return Err(Error::Config("connection string has no Server".into()));
        }
        let mut state = self.state.lock().unwrap();
        state.connections += 1;
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
            fail_on_batch: state.fail_on_batch,
            batches: 0,
            pending: None,
        }))
    }
}

struct MemoryConnection {
    state: Arc<Mutex<ServerState>>,
    fail_on_batch: Option<usize>,
    batches: usize,
    pending: Option<Vec<(String, StoredRow)>>,
}

#[async_trait]
impl BulkConnection for MemoryConnection {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.state.lock().unwrap().executed.push(sql.to_string());
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.pending = Some(Vec::new());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| Error::transfer("", "commit without a transaction"))?;
        let mut state = self.state.lock().unwrap();
        for (table, row) in pending {
            state.tables.entry(table).or_default().push(row);
        }
        state.commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.pending.take().is_some() {
            self.state.lock().unwrap().rollbacks += 1;
        }
        Ok(())
    }

    async fn write_batch(
        &mut self,
        schema: &BufferSchema,
        rows: &[Vec<SqlValue<'_>>],
    ) -> Result<u64> {
        self.batches += 1;
        if self.fail_on_batch == Some(self.batches) {
            return Err(Error::transfer(
                schema.qualified_name.clone(),
                format!("injected failure on batch {}", self.batches),
            ));
        }

        let mut state = self.state.lock().unwrap();
        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = StoredRow::new();
            for column in schema.columns.iter().filter(|c| c.auto_increment) {
                let next = state
                    .identities
                    .entry(format!("{}.{}", schema.qualified_name, column.name))
                    .or_insert(0);
                *next += 1;
                let id = match column.data_type {
                    SqlType::I32 => SqlValue::I32(*next as i32),
                    _ => SqlValue::I64(*next),
                };
                values.insert(column.name.clone(), id);
            }
            for (column, value) in schema.writable_columns().zip(row) {
                values.insert(column.name.clone(), value.clone().into_owned());
            }
            stored.push((schema.qualified_name.clone(), values));
        }

        let count = stored.len() as u64;
        match self.pending.as_mut() {
            Some(pending) => pending.extend(stored),
            None => {
                for (table, row) in stored {
                    state.tables.entry(table).or_default().push(row);
                }
            }
        }
        Ok(count)
    }
}

/// Entity with an identity key, a nullable name and a required email.
#[derive(Debug, Clone)]
pub struct Person {
    pub id: i32,
    pub name: Option<String>,
    pub email: String,
}

impl Person {
    pub fn new(name: Option<&str>, email: &str) -> Self {
        Self {
            id: 0,
            name: name.map(str::to_string),
            email: email.to_string(),
        }
    }
}

impl Entity for Person {
    fn properties() -> &'static [Property<Self>] {
        const PROPERTIES: &[Property<Person>] = &[
            Property::required("Id", SqlType::I32, |p| SqlValue::I32(p.id)),
            Property::optional("Name", SqlType::String, |p| {
                SqlValue::nullable(p.name.as_deref(), SqlType::String)
            }),
            Property::required("Email", SqlType::String, |p| SqlValue::from(&p.email)),
        ];
        PROPERTIES
    }
}

pub const PEOPLE_TABLE: &str = "[dbo].[People]";

pub fn people_mapping() -> TableMapping {
    TableMapping::new("dbo", "People")
        .column(ColumnMapping::new("Id").identity().primary_key())
        .column(ColumnMapping::new("Name").max_length(10))
        .column(ColumnMapping::new("Email").max_length(50))
}

/// Context backed by a [`MemoryServer`].
pub struct TestContext {
    pub settings: Settings,
    pub server: MemoryServer,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            settings: Settings::default()
                .with_connection_string("TestContext", TEST_CONNECTION_STRING),
            server: MemoryServer::new(),
        }
    }
}

impl DbContext for TestContext {
    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn connector(&self) -> &dyn Connector {
        &self.server
    }

    fn on_model_creating(&self, model: &mut ModelBuilder) {
        model.entity::<Person>(people_mapping());
    }
}

pub fn people(n: usize) -> Vec<Person> {
    (0..n)
        .map(|i| {
            let name = format!("p{}", i);
            Person::new(
                if i % 2 == 0 { Some(name.as_str()) } else { None },
                &format!("p{}@example.com", i),
            )
        })
        .collect()
}
