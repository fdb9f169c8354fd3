//! Table and column mappings for entity types.
//!
//! A [`DbContext`](crate::DbContext) registers one [`TableMapping`] per
//! entity type through a [`ModelBuilder`]. Registration matches every column
//! against the entity's static [`Property`] table, fixing the column's value
//! type and accessor once. The resulting [`DbMapping`] is cached per context
//! type by [`MappingCache`].

pub mod cache;
pub mod entity;

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use crate::core::{SqlType, SqlValue};
use crate::error::{Error, Result};

pub use cache::MappingCache;
pub use entity::{Entity, Property, PropertyReader};

/// How one entity property maps to one table column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    /// Entity property name.
    pub property_name: String,

    /// Column name in the table (defaults to the property name).
    pub column_name: String,

    /// Property value type, set when the table mapping is registered.
    pub data_type: Option<SqlType>,

    /// Whether the property is an `Option<T>`, set at registration.
    pub optional: bool,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Maximum length for string/binary columns (`None` for max).
    pub max_length: Option<usize>,

    /// Column default value.
    pub default_value: Option<SqlValue<'static>>,

    /// Whether the server assigns the column's value.
    pub is_identity: bool,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,

    property_index: Option<usize>,
}

impl ColumnMapping {
    /// Map `property` to a column of the same name.
    pub fn new(property: impl Into<String>) -> Self {
        let property_name = property.into();
        Self {
            column_name: property_name.clone(),
            property_name,
            data_type: None,
            optional: false,
            nullable: false,
            max_length: None,
            default_value: None,
            is_identity: false,
            is_primary_key: false,
            property_index: None,
        }
    }

    /// Use a different column name.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column_name = name.into();
        self
    }

    /// Allow NULL in the column.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Limit string/binary values to `len` characters or bytes.
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Set the column default.
    pub fn default_value(mut self, value: impl Into<SqlValue<'static>>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Mark as a server-assigned identity column.
    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }

    /// Mark as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// Index of the backing property in the entity's property table.
    pub(crate) fn property_index(&self) -> Option<usize> {
        self.property_index
    }
}

/// Table metadata for one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMapping {
    /// Schema name.
    pub schema_name: String,

    /// Table name.
    pub table_name: String,

    /// Column mappings in table order.
    pub columns: Vec<ColumnMapping>,

    entity: Option<(TypeId, &'static str)>,
}

impl TableMapping {
    /// Start a mapping for `schema.table`.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema_name: schema.into(),
            table_name: table.into(),
            columns: Vec::new(),
            entity: None,
        }
    }

    /// Append a column mapping.
    pub fn column(mut self, column: ColumnMapping) -> Self {
        self.columns.push(column);
        self
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }

    /// Bracket-quoted `[schema].[table]` for use in SQL.
    pub fn qualified_name(&self) -> String {
        crate::ddl::qualify_table(&self.schema_name, &self.table_name)
    }

    /// Primary key columns in table order.
    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        self.columns.iter().any(|c| c.is_primary_key)
    }

    /// Short name of the entity type this mapping was registered for.
    pub fn entity_name(&self) -> Option<&'static str> {
        self.entity.map(|(_, name)| name)
    }

    /// Whether this mapping was registered for entity type `E`.
    pub fn is_for<E: Entity>(&self) -> bool {
        matches!(self.entity, Some((id, _)) if id == TypeId::of::<E>())
    }

    /// Match every column against `E`'s property table.
    ///
    /// Fails when a column names a property `E` does not declare, or when two
    /// columns share a name.
    pub fn resolve<E: Entity>(mut self) -> Result<Self> {
        let properties = E::properties();
        let table = self.full_name();
        let mut seen = HashSet::new();

        for column in &mut self.columns {
            if !seen.insert(column.column_name.to_lowercase()) {
                return Err(Error::mapping(format!(
                    "Duplicate column {} in mapping for {}",
                    column.column_name, table
                )));
            }

            let (index, property) = properties
                .iter()
                .enumerate()
                .find(|(_, p)| p.name == column.property_name)
                .ok_or_else(|| {
                    Error::mapping(format!(
                        "Property {} not found on entity {}",
                        column.property_name,
                        E::entity_name()
                    ))
                })?;

            column.data_type = Some(property.sql_type);
            column.optional = property.optional;
            column.property_index = Some(index);

            if let Some(default) = &column.default_value {
                if !default.is_null() && default.sql_type() != property.sql_type {
                    return Err(Error::mapping(format!(
                        "Default for column {} is {:?}, property {} is {:?}",
                        column.column_name,
                        default.sql_type(),
                        property.name,
                        property.sql_type
                    )));
                }
            }
        }

        self.entity = Some((TypeId::of::<E>(), E::entity_name()));
        Ok(self)
    }
}

/// Collects table mappings while a context describes its model.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    tables: HashMap<TypeId, TableMapping>,
    errors: Vec<Error>,
}

impl ModelBuilder {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the table mapping for entity type `E`.
    ///
    /// A mapping that does not match `E`'s properties is reported when the
    /// model is built. Registering `E` twice replaces the earlier mapping.
    pub fn entity<E: Entity>(&mut self, table: TableMapping) -> &mut Self {
        match table.resolve::<E>() {
            Ok(resolved) => {
                self.tables.insert(TypeId::of::<E>(), resolved);
            }
            Err(e) => self.errors.push(e),
        }
        self
    }

    /// Finish the model, returning the first registration error if any.
    pub fn build(mut self) -> Result<DbMapping> {
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }
        Ok(DbMapping {
            tables: self.tables,
        })
    }
}

/// All table mappings of one context type, keyed by entity type.
#[derive(Debug, Default)]
pub struct DbMapping {
    tables: HashMap<TypeId, TableMapping>,
}

impl DbMapping {
    /// Describe `context`'s model.
    pub fn build<C: crate::DbContext + ?Sized>(context: &C) -> Result<Self> {
        let mut model = ModelBuilder::new();
        context.on_model_creating(&mut model);
        let mapping = model.build()?;
        tracing::debug!(
            "Built mapping for context {}: {} tables",
            context.name(),
            mapping.len()
        );
        Ok(mapping)
    }

    /// Table mapping for entity type `E`.
    pub fn table<E: Entity>(&self) -> Result<&TableMapping> {
        self.tables.get(&TypeId::of::<E>()).ok_or_else(|| {
            Error::mapping(format!("Entity {} is not mapped", E::entity_name()))
        })
    }

    /// Number of mapped entity types.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no entity types are mapped.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
