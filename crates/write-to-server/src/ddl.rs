//! SQL Server identifiers and table DDL.

use crate::core::{SqlType, SqlValue};
use crate::error::{Error, Result};
use crate::mapping::TableMapping;

/// Longest `nvarchar` that fits a 900-byte clustered index key.
const MAX_KEY_LENGTH: usize = 450;

/// Quote an MSSQL identifier with brackets.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Quote `schema.table` as `[schema].[table]`.
pub fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// SQL Server column type for a value type.
///
/// Strings map to `nvarchar`, binary to `varbinary`; both use `(max)` when
/// no length is mapped or the length exceeds the in-row limit.
pub fn mssql_type(sql_type: SqlType, max_length: Option<usize>) -> String {
    match sql_type {
        SqlType::Bool => "bit".into(),
        SqlType::I16 => "smallint".into(),
        SqlType::I32 => "int".into(),
        SqlType::I64 => "bigint".into(),
        SqlType::F32 => "real".into(),
        SqlType::F64 => "float".into(),
        SqlType::String => match max_length {
            Some(len) if len > 0 && len <= 4000 => format!("nvarchar({})", len),
            _ => "nvarchar(max)".into(),
        },
        SqlType::Bytes => match max_length {
            Some(len) if len > 0 && len <= 8000 => format!("varbinary({})", len),
            _ => "varbinary(max)".into(),
        },
        SqlType::Uuid => "uniqueidentifier".into(),
        SqlType::Decimal => "decimal(18, 4)".into(),
        SqlType::DateTime => "datetime2".into(),
        SqlType::DateTimeOffset => "datetimeoffset".into(),
        SqlType::Date => "date".into(),
        SqlType::Time => "time".into(),
    }
}

/// Render a value as a T-SQL literal.
pub fn sql_literal(value: &SqlValue<'_>) -> String {
    match value {
        SqlValue::Null(_) => "NULL".into(),
        SqlValue::Bool(b) => if *b { "1" } else { "0" }.into(),
        SqlValue::Text(s) => format!("N'{}'", s.replace('\'', "''")),
        SqlValue::Bytes(_) | SqlValue::I16(_) | SqlValue::I32(_) | SqlValue::I64(_) => {
            value.to_string()
        }
        SqlValue::F32(_) | SqlValue::F64(_) | SqlValue::Decimal(_) => value.to_string(),
        SqlValue::Uuid(u) => format!("'{}'", u),
        SqlValue::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%dT%H:%M:%S%.f")),
        SqlValue::DateTimeOffset(dto) => format!("'{}'", dto.format("%Y-%m-%dT%H:%M:%S%.f%:z")),
        SqlValue::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        SqlValue::Time(t) => format!("'{}'", t.format("%H:%M:%S%.f")),
    }
}

/// Build the `CREATE TABLE` statement for a resolved mapping.
///
/// Identity columns get `IDENTITY(1,1)`; primary key columns form a
/// clustered `PK_<schema>_<table>` constraint and must not map to a `(max)`
/// type.
pub fn create_table_sql(mapping: &TableMapping) -> Result<String> {
    if mapping.columns.is_empty() {
        return Err(Error::mapping(format!(
            "Cannot create {} without columns",
            mapping.full_name()
        )));
    }

    let mut col_defs = Vec::with_capacity(mapping.columns.len());
    for c in &mapping.columns {
        let data_type = c.data_type.ok_or_else(|| {
            Error::mapping(format!(
                "Column {} of {} is not resolved against an entity type",
                c.column_name,
                mapping.full_name()
            ))
        })?;

        let column_type = mssql_type(data_type, c.max_length);
        if c.is_primary_key && column_type.ends_with("(max)") {
            return Err(Error::mapping(format!(
                "Key column {} of {} needs a max length (at most {} for {})",
                c.column_name,
                mapping.full_name(),
                MAX_KEY_LENGTH,
                column_type
            )));
        }

        let mut def = format!("{} {}", quote_ident(&c.column_name), column_type);
        if c.is_identity {
            def.push_str(" IDENTITY(1,1)");
        }
        let nullable = !c.is_identity && !c.is_primary_key && (c.nullable || c.optional);
        def.push_str(if nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = c.default_value.as_ref().filter(|_| !c.is_identity) {
            def.push_str(&format!(" DEFAULT {}", sql_literal(default)));
        }
        col_defs.push(def);
    }

    let pk_constraint = if !mapping.has_pk() {
        String::new()
    } else {
        let pk_cols: Vec<String> = mapping
            .primary_key()
            .map(|c| quote_ident(&c.column_name))
            .collect();
        let pk_name = format!("PK_{}_{}", mapping.schema_name, mapping.table_name);
        format!(
            ",\n    CONSTRAINT {} PRIMARY KEY CLUSTERED ({})",
            quote_ident(&pk_name),
            pk_cols.join(", ")
        )
    };

    Ok(format!(
        "CREATE TABLE {} (\n    {}{}\n)",
        mapping.qualified_name(),
        col_defs.join(",\n    "),
        pk_constraint
    ))
}

/// `CREATE TABLE` guarded by an existence check.
pub fn create_table_if_not_exists_sql(mapping: &TableMapping) -> Result<String> {
    Ok(format!(
        "IF OBJECT_ID(N'{}', N'U') IS NULL\n{}",
        mapping.qualified_name().replace('\'', "''"),
        create_table_sql(mapping)?
    ))
}
