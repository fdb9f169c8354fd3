//! Tabular buffer construction.
//!
//! A [`TabularBuffer`] mirrors the destination table: a schema of
//! [`BufferColumn`]s derived from a [`TableMapping`], and one row per entity.
//! Rows hold a value for every writable (non-identity) column, in schema
//! order, which is the column order the server expects in a bulk load.
//!
//! Values are checked as they are appended: NULL only where the column
//! allows it, the declared type, the max length, and primary key uniqueness
//! across the buffer.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{SqlType, SqlValue};
use crate::error::{Error, Result};
use crate::mapping::{ColumnMapping, Entity, TableMapping};

/// Column definition of a tabular buffer.
#[derive(Debug, Clone, Serialize)]
pub struct BufferColumn {
    /// Column name in the destination table.
    pub name: String,

    /// Value type (the unwrapped type for `Option<T>` properties).
    pub data_type: SqlType,

    /// Whether NULL is accepted.
    pub allow_null: bool,

    /// Maximum length for string/binary values.
    pub max_length: Option<usize>,

    /// Server-assigned identity; never populated.
    pub auto_increment: bool,

    /// Values must be unique.
    pub unique: bool,

    /// Part of the buffer's key constraint.
    pub is_key: bool,

    /// Column default (rendered), for non-identity columns.
    pub default_value: Option<String>,

    #[serde(skip)]
    property_index: usize,
}

impl BufferColumn {
    /// Whether rows carry a value for this column.
    pub fn is_writable(&self) -> bool {
        !self.auto_increment
    }
}

/// Ordered column definitions plus key constraint.
#[derive(Debug, Clone, Serialize)]
pub struct BufferSchema {
    /// Destination as `schema.table`.
    pub table_name: String,

    /// Destination as `[schema].[table]`.
    pub qualified_name: String,

    /// All buffer columns, identity columns included.
    pub columns: Vec<BufferColumn>,

    /// Positions in `columns` of the primary key columns.
    pub primary_key: Vec<usize>,

    /// Positions in `columns` of the columns rows carry values for.
    #[serde(skip)]
    writable: Vec<usize>,
}

impl BufferSchema {
    /// Derive the schema of `mapping`'s table.
    ///
    /// Primary key columns never allow NULL, whatever the property type.
    /// Identity columns of type `int`/`bigint` become auto-increment columns;
    /// identity columns of any other type are left out of the buffer.
    pub fn from_mapping(mapping: &TableMapping) -> Result<Self> {
        let mut columns = Vec::with_capacity(mapping.columns.len());
        let mut primary_key = Vec::new();

        for column in &mapping.columns {
            let (data_type, property_index) = resolved(mapping, column)?;

            if column.is_identity && !data_type.is_auto_increment_capable() {
                warn!(
                    "{}: identity column {} of type {:?} is not int/bigint, leaving it out of the buffer",
                    mapping.full_name(),
                    column.column_name,
                    data_type
                );
                continue;
            }

            let allow_null = !column.is_primary_key && (column.optional || column.nullable);

            if column.is_primary_key {
                primary_key.push(columns.len());
            }

            columns.push(BufferColumn {
                name: column.column_name.clone(),
                data_type,
                allow_null,
                max_length: if data_type.has_length() {
                    column.max_length
                } else {
                    None
                },
                auto_increment: column.is_identity,
                unique: column.is_identity,
                is_key: column.is_primary_key,
                default_value: if column.is_identity {
                    None
                } else {
                    column.default_value.as_ref().map(|v| v.to_string())
                },
                property_index,
            });
        }

        let writable = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_writable())
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            table_name: mapping.full_name(),
            qualified_name: mapping.qualified_name(),
            columns,
            primary_key,
            writable,
        })
    }

    /// Columns rows carry values for, in row order.
    pub fn writable_columns(&self) -> impl Iterator<Item = &BufferColumn> {
        self.writable.iter().map(move |&i| &self.columns[i])
    }

    /// Names of the writable columns, in row order.
    pub fn writable_column_names(&self) -> Vec<String> {
        self.writable_columns().map(|c| c.name.clone()).collect()
    }

    /// Find a column by name.
    pub fn column(&self, name: &str) -> Option<&BufferColumn> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

fn resolved(mapping: &TableMapping, column: &ColumnMapping) -> Result<(SqlType, usize)> {
    match (column.data_type, column.property_index()) {
        (Some(t), Some(i)) => Ok((t, i)),
        _ => Err(Error::mapping(format!(
            "Column {} of {} is not resolved against an entity type",
            column.column_name,
            mapping.full_name()
        ))),
    }
}

/// In-memory rows for one bulk load, borrowing from the source entities.
#[derive(Debug)]
pub struct TabularBuffer<'a> {
    schema: BufferSchema,
    rows: Vec<Vec<SqlValue<'a>>>,
    keys: HashSet<Vec<String>>,
    key_columns: Vec<usize>,
}

impl<'a> TabularBuffer<'a> {
    /// Create an empty buffer.
    pub fn new(schema: BufferSchema) -> Self {
        // Identity key columns are unique by construction; check the rest.
        let key_columns = schema
            .writable
            .iter()
            .enumerate()
            .filter(|(_, col)| schema.columns[**col].is_key)
            .map(|(pos, _)| pos)
            .collect();

        Self {
            schema,
            rows: Vec::new(),
            keys: HashSet::new(),
            key_columns,
        }
    }

    /// Buffer schema.
    pub fn schema(&self) -> &BufferSchema {
        &self.schema
    }

    /// Buffered rows, one value per writable column.
    pub fn rows(&self) -> &[Vec<SqlValue<'a>>] {
        &self.rows
    }

    /// Number of buffered rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are buffered.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append one row read from `entity`.
    pub fn push<E: Entity>(&mut self, entity: &'a E) -> Result<()> {
        let properties = E::properties();
        let mut row = Vec::with_capacity(self.schema.writable.len());

        for &col in &self.schema.writable {
            let column = &self.schema.columns[col];
            let property = properties.get(column.property_index).ok_or_else(|| {
                Error::mapping(format!(
                    "Column {} has no property on entity {}",
                    column.name,
                    E::entity_name()
                ))
            })?;

            let value = (property.read)(entity);
            check_value(column, &value)?;
            row.push(value);
        }

        if !self.key_columns.is_empty() {
            let key: Vec<String> = self.key_columns.iter().map(|&i| row[i].to_string()).collect();
            if self.keys.contains(&key) {
                return Err(Error::DuplicateKey {
                    table: self.schema.table_name.clone(),
                    key: format!("({})", key.join(", ")),
                });
            }
            self.keys.insert(key);
        }

        self.rows.push(row);
        Ok(())
    }
}

fn check_value(column: &BufferColumn, value: &SqlValue<'_>) -> Result<()> {
    if value.is_null() {
        if !column.allow_null {
            return Err(Error::NullViolation {
                column: column.name.clone(),
            });
        }
        return Ok(());
    }

    let actual = value.sql_type();
    if actual != column.data_type {
        return Err(Error::TypeMismatch {
            column: column.name.clone(),
            expected: column.data_type,
            actual,
        });
    }

    if let (Some(max_length), Some(len)) = (column.max_length, value.data_len()) {
        if len > max_length {
            return Err(Error::ValueTooLong {
                column: column.name.clone(),
                max_length,
                actual: len,
            });
        }
    }

    Ok(())
}

/// Build a buffer holding one row per entity.
pub fn create_buffer<'a, E, I>(mapping: &TableMapping, entities: I) -> Result<TabularBuffer<'a>>
where
    E: Entity,
    I: IntoIterator<Item = &'a E>,
{
    if !mapping.is_for::<E>() {
        return Err(Error::mapping(format!(
            "Mapping for {} was not registered for entity {}",
            mapping.full_name(),
            E::entity_name()
        )));
    }

    let mut buffer = TabularBuffer::new(BufferSchema::from_mapping(mapping)?);
    for entity in entities {
        buffer.push(entity)?;
    }

    debug!(
        "Buffered {} rows for {} ({} writable columns)",
        buffer.len(),
        buffer.schema.table_name,
        buffer.schema.writable.len()
    );
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::mapping::{ColumnMapping, Property};

    #[derive(Debug)]
    struct Person {
        id: i32,
        name: Option<String>,
        email: String,
        born: Option<NaiveDate>,
    }

    impl Entity for Person {
        fn properties() -> &'static [Property<Self>] {
            const PROPERTIES: &[Property<Person>] = &[
                Property::required("Id", SqlType::I32, |p| SqlValue::I32(p.id)),
                Property::optional("Name", SqlType::String, |p| {
                    SqlValue::nullable(p.name.as_deref(), SqlType::String)
                }),
                Property::required("Email", SqlType::String, |p| SqlValue::from(&p.email)),
                Property::optional("Born", SqlType::Date, |p| {
                    SqlValue::nullable(p.born, SqlType::Date)
                }),
            ];
            PROPERTIES
        }
    }

    fn people_mapping() -> TableMapping {
        TableMapping::new("dbo", "People")
            .column(ColumnMapping::new("Id").identity().primary_key())
            .column(ColumnMapping::new("Name").max_length(5))
            .column(ColumnMapping::new("Email").column("EmailAddress").max_length(40))
            .column(ColumnMapping::new("Born").column("BirthDate"))
            .resolve::<Person>()
            .unwrap()
    }

    fn person(id: i32, name: Option<&str>, email: &str) -> Person {
        Person {
            id,
            name: name.map(str::to_string),
            email: email.to_string(),
            born: NaiveDate::from_ymd_opt(1990, 1, 2),
        }
    }

    #[test]
    fn test_schema_from_mapping() {
        let schema = BufferSchema::from_mapping(&people_mapping()).unwrap();

        assert_eq!(schema.table_name, "dbo.People");
        assert_eq!(schema.qualified_name, "[dbo].[People]");
        assert_eq!(schema.columns.len(), 4);
        assert_eq!(schema.primary_key, vec![0]);

        let id = schema.column("Id").unwrap();
        assert!(id.auto_increment);
        assert!(id.unique);
        assert!(!id.is_writable());

        // Option<String> allows NULL even though the mapping does not.
        let name = schema.column("Name").unwrap();
        assert!(name.allow_null);
        assert_eq!(name.data_type, SqlType::String);
        assert_eq!(name.max_length, Some(5));

        let email = schema.column("EmailAddress").unwrap();
        assert!(!email.allow_null);

        assert_eq!(
            schema.writable_column_names(),
            vec!["Name", "EmailAddress", "BirthDate"]
        );
    }

    #[test]
    fn test_rows_skip_identity_and_match_input_count() {
        let people = vec![
            person(0, Some("Ann"), "ann@example.com"),
            person(0, None, "bob@example.com"),
            person(0, Some("Cy"), "cy@example.com"),
        ];

        let buffer = create_buffer(&people_mapping(), &people).unwrap();

        assert_eq!(buffer.len(), people.len());
        for row in buffer.rows() {
            assert_eq!(row.len(), 3);
            assert!(row.iter().all(|v| v.sql_type() != SqlType::I32));
        }
        assert_eq!(buffer.rows()[1][0], SqlValue::Null(SqlType::String));
        assert_eq!(buffer.rows()[0][1], SqlValue::from("ann@example.com"));
    }

    #[test]
    fn test_null_in_required_column() {
        let mapping = TableMapping::new("dbo", "People")
            .column(ColumnMapping::new("Born"))
            .resolve::<Person>()
            .unwrap();
        let mut p = person(1, None, "x@example.com");
        p.born = None;

        // Born is Option<NaiveDate>, so NULL is accepted regardless.
        assert!(create_buffer(&mapping, [&p]).is_ok());

        let mapping = TableMapping::new("dbo", "People")
            .column(ColumnMapping::new("Email"))
            .resolve::<Person>()
            .unwrap();
        let schema = BufferSchema::from_mapping(&mapping).unwrap();
        let err = check_value(&schema.columns[0], &SqlValue::Null(SqlType::String)).unwrap_err();
        assert!(matches!(err, Error::NullViolation { column } if column == "Email"));
    }

    #[test]
    fn test_value_too_long_fails() {
        let people = vec![person(0, Some("Bartholomew"), "b@example.com")];
        let err = create_buffer(&people_mapping(), &people).unwrap_err();
        assert!(matches!(
            err,
            Error::ValueTooLong { column, max_length: 5, actual: 11 } if column == "Name"
        ));
    }

    #[test]
    fn test_duplicate_key_detected() {
        let mapping = TableMapping::new("dbo", "People")
            .column(ColumnMapping::new("Email").primary_key())
            .column(ColumnMapping::new("Name").nullable())
            .resolve::<Person>()
            .unwrap();
        let people = vec![
            person(0, Some("A"), "same@example.com"),
            person(0, Some("B"), "same@example.com"),
        ];

        let err = create_buffer(&mapping, &people).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
    }

    #[test]
    fn test_optional_key_rejects_null() {
        let mapping = TableMapping::new("dbo", "People")
            .column(ColumnMapping::new("Name").primary_key().max_length(20))
            .column(ColumnMapping::new("Email"))
            .resolve::<Person>()
            .unwrap();

        let schema = BufferSchema::from_mapping(&mapping).unwrap();
        assert!(!schema.column("Name").unwrap().allow_null);

        let people = vec![
            person(0, Some("A"), "a@example.com"),
            person(0, None, "b@example.com"),
            person(0, None, "c@example.com"),
        ];
        let err = create_buffer(&mapping, &people).unwrap_err();
        assert!(matches!(err, Error::NullViolation { column } if column == "Name"));
    }

    #[test]
    fn test_identity_key_not_checked_for_duplicates() {
        let people = vec![
            person(7, Some("A"), "a@example.com"),
            person(7, Some("B"), "b@example.com"),
        ];
        assert_eq!(create_buffer(&people_mapping(), &people).unwrap().len(), 2);
    }

    #[test]
    fn test_non_integer_identity_left_out() {
        struct Token {
            id: uuid::Uuid,
            value: String,
        }

        impl Entity for Token {
            fn properties() -> &'static [Property<Self>] {
                const PROPERTIES: &[Property<Token>] = &[
                    Property::required("Id", SqlType::Uuid, |t| SqlValue::Uuid(t.id)),
                    Property::required("Value", SqlType::String, |t| SqlValue::from(&t.value)),
                ];
                PROPERTIES
            }
        }

        let mapping = TableMapping::new("dbo", "Tokens")
            .column(ColumnMapping::new("Id").identity().primary_key())
            .column(ColumnMapping::new("Value"))
            .resolve::<Token>()
            .unwrap();
        let tokens = [Token {
            id: uuid::Uuid::nil(),
            value: "t".to_string(),
        }];

        let buffer = create_buffer(&mapping, &tokens).unwrap();
        assert_eq!(buffer.schema().columns.len(), 1);
        assert!(buffer.schema().primary_key.is_empty());
        assert_eq!(buffer.rows()[0], vec![SqlValue::from("t")]);
    }

    #[test]
    fn test_type_mismatch() {
        let column = BufferColumn {
            name: "Age".to_string(),
            data_type: SqlType::I32,
            allow_null: false,
            max_length: None,
            auto_increment: false,
            unique: false,
            is_key: false,
            default_value: None,
            property_index: 0,
        };
        let err = check_value(&column, &SqlValue::I64(3)).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch { expected: SqlType::I32, actual: SqlType::I64, .. }
        ));
    }

    #[test]
    fn test_mapping_for_other_entity_rejected() {
        struct Other;
        impl Entity for Other {
            fn properties() -> &'static [Property<Self>] {
                &[]
            }
        }

        let others = [Other];
        let err = create_buffer(&people_mapping(), &others).unwrap_err();
        assert!(matches!(err, Error::Mapping(_)));
    }

    #[test]
    fn test_unresolved_mapping_rejected() {
        let mapping = TableMapping::new("dbo", "People").column(ColumnMapping::new("Id"));
        assert!(BufferSchema::from_mapping(&mapping).is_err());
    }
}
