//! SQL Server driver built on Tiberius.
//!
//! Rows are streamed with the TDS bulk load (`INSERT BULK`), one bulk load
//! per batch. Tiberius reads the destination's column metadata first and
//! only expects values for updateable columns, so identity columns are left
//! to the server.

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tiberius::{Client, ColumnData, Config, ToSql, TokenRow};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use super::{BulkConnection, Connector};
use crate::buffer::BufferSchema;
use crate::core::{SqlType, SqlValue};
use crate::ddl::quote_ident;
use crate::error::{Error, Result};

/// Maximum string length (in bytes) for TDS bulk insert.
const BULK_INSERT_STRING_LIMIT: usize = 65535;

/// Parameters per statement in the INSERT fallback (server limit is 2100).
const MAX_PARAMS_PER_STATEMENT: usize = 2000;

const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

type MssqlClient = Client<Compat<TcpStream>>;

/// Opens Tiberius connections from ADO connection strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiberiusConnector;

#[async_trait]
impl Connector for TiberiusConnector {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn BulkConnection>> {
        let config = Config::from_ado_string(connection_string)?;
        let addr = config.get_addr();
        let client = connect_client(config).await?;
        info!("Connected to SQL Server at {}", addr);
        Ok(Box::new(MssqlConnection {
            client,
            in_transaction: false,
        }))
    }
}

async fn open_tcp(addr: &str) -> Result<TcpStream> {
    let tcp = TcpStream::connect(addr).await?;
    tcp.set_nodelay(true).ok();

    let std_tcp = tcp.into_std()?;
    let socket = socket2::Socket::from(std_tcp);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(TCP_KEEPALIVE_INTERVAL)
        .with_interval(TCP_KEEPALIVE_INTERVAL);
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keepalive on SQL Server connection: {}", e);
    }

    let std_tcp: std::net::TcpStream = socket.into();
    std_tcp.set_nonblocking(true)?;
    Ok(TcpStream::from_std(std_tcp)?)
}

async fn connect_client(config: Config) -> Result<MssqlClient> {
    let tcp = open_tcp(&config.get_addr()).await?;
    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        // Azure SQL gateways answer with a redirect to the actual node.
        Err(tiberius::error::Error::Routing { host, port }) => {
            debug!("Redirected to {}:{}", host, port);
            let mut config = config;
            config.host(&host);
            config.port(port);
            let tcp = open_tcp(&config.get_addr()).await?;
            Ok(Client::connect(config, tcp.compat_write()).await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// An open SQL Server connection.
pub struct MssqlConnection {
    client: MssqlClient,
    in_transaction: bool,
}

impl MssqlConnection {
    /// Check if a row has strings exceeding bulk insert limit.
    fn row_has_oversized_strings(row: &[SqlValue<'_>]) -> bool {
        row.iter().any(|value| match value {
            SqlValue::Text(s) => s.encode_utf16().count() * 2 > BULK_INSERT_STRING_LIMIT,
            _ => false,
        })
    }

    async fn bulk_load(&mut self, table: &str, rows: &[&[SqlValue<'_>]]) -> Result<u64> {
        let mut bulk_load = self
            .client
            .bulk_insert(table)
            .await
            .map_err(|e| Error::transfer(table, format!("bulk insert init: {}", e)))?;

        for row in rows {
            let mut token_row = TokenRow::new();
            for value in row.iter() {
                token_row.push(sql_value_to_column_data(value)?);
            }
            bulk_load
                .send(token_row)
                .await
                .map_err(|e| Error::transfer(table, format!("bulk insert send: {}", e)))?;
        }

        let result = bulk_load
            .finalize()
            .await
            .map_err(|e| Error::transfer(table, format!("bulk insert finalize: {}", e)))?;

        debug!(
            "Bulk inserted {} rows into {} (reported: {})",
            rows.len(),
            table,
            result.total()
        );
        Ok(rows.len() as u64)
    }

    async fn insert_rows_fallback(
        &mut self,
        table: &str,
        cols: &[String],
        rows: &[&[SqlValue<'_>]],
    ) -> Result<u64> {
        let col_str = cols
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let cols_per_row = cols.len();

        if cols_per_row == 0 {
            return Err(Error::transfer(table, "Cannot insert with zero columns"));
        }

        let max_rows_per_statement = (MAX_PARAMS_PER_STATEMENT / cols_per_row).clamp(1, 1000);
        let mut total_inserted = 0u64;

        for chunk in rows.chunks(max_rows_per_statement) {
            let mut value_groups = Vec::with_capacity(chunk.len());
            let mut param_idx = 1;
            for _ in chunk {
                let placeholders: Vec<String> = (0..cols_per_row)
                    .map(|_| {
                        let p = format!("@P{}", param_idx);
                        param_idx += 1;
                        p
                    })
                    .collect();
                value_groups.push(format!("({})", placeholders.join(", ")));
            }

            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                table,
                col_str,
                value_groups.join(", ")
            );

            let params: Vec<Box<dyn ToSql>> = chunk
                .iter()
                .flat_map(|row| row.iter().map(sql_value_to_sql_param))
                .collect();
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

            self.client
                .execute(sql.as_str(), &param_refs)
                .await
                .map_err(|e| Error::transfer(table, format!("batched INSERT: {}", e)))?;

            total_inserted += chunk.len() as u64;
        }

        Ok(total_inserted)
    }
}

#[async_trait]
impl BulkConnection for MssqlConnection {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    // Transaction statements go out as plain SQL batches: inside an RPC
    // (sp_executesql) the server rejects them with a transaction count
    // mismatch.
    async fn begin_transaction(&mut self) -> Result<()> {
        self.execute("BEGIN TRANSACTION").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.execute("COMMIT TRANSACTION").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.execute("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }

    async fn write_batch(
        &mut self,
        schema: &BufferSchema,
        rows: &[Vec<SqlValue<'_>>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let table = schema.qualified_name.as_str();

        // Tiberius cannot bulk-load strings past 64 KiB; those rows go
        // through parameterized INSERTs on the same connection. Runs are
        // written in input order so identities follow the rows.
        let mut cols = None;
        let mut total = 0u64;
        for (oversized, run) in split_runs(rows) {
            if oversized {
                debug!(
                    "Falling back to INSERT for {} rows with oversized strings in {}",
                    run.len(),
                    table
                );
                let cols = cols.get_or_insert_with(|| schema.writable_column_names());
                total += self.insert_rows_fallback(table, cols, &run).await?;
            } else {
                total += self.bulk_load(table, &run).await?;
            }
        }

        Ok(total)
    }
}

/// Consecutive runs of rows, flagged `true` when they hold oversized strings.
fn split_runs<'r, 'a>(rows: &'r [Vec<SqlValue<'a>>]) -> Vec<(bool, Vec<&'r [SqlValue<'a>]>)> {
    let mut runs: Vec<(bool, Vec<&'r [SqlValue<'a>]>)> = Vec::new();
    for row in rows {
        let oversized = MssqlConnection::row_has_oversized_strings(row);
        match runs.last_mut() {
            Some((flag, run)) if *flag == oversized => run.push(row.as_slice()),
            _ => runs.push((oversized, vec![row.as_slice()])),
        }
    }
    runs
}

fn sql_value_to_sql_param(value: &SqlValue<'_>) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null(t) => null_param(*t),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::I16(i) => Box::new(*i),
        SqlValue::I32(i) => Box::new(*i),
        SqlValue::I64(i) => Box::new(*i),
        SqlValue::F32(f) => Box::new(*f),
        SqlValue::F64(f) => Box::new(*f),
        SqlValue::Text(s) => Box::new(s.to_string()),
        SqlValue::Bytes(b) => Box::new(b.to_vec()),
        SqlValue::Uuid(u) => Box::new(*u),
        SqlValue::Decimal(d) => Box::new(*d),
        SqlValue::DateTime(dt) => Box::new(*dt),
        SqlValue::DateTimeOffset(dto) => Box::new(*dto),
        SqlValue::Date(d) => Box::new(*d),
        SqlValue::Time(t) => Box::new(*t),
    }
}

fn null_param(sql_type: SqlType) -> Box<dyn ToSql> {
    match sql_type {
        SqlType::Bool => Box::new(Option::<bool>::None),
        SqlType::I16 => Box::new(Option::<i16>::None),
        SqlType::I32 => Box::new(Option::<i32>::None),
        SqlType::I64 => Box::new(Option::<i64>::None),
        SqlType::F32 => Box::new(Option::<f32>::None),
        SqlType::F64 => Box::new(Option::<f64>::None),
        SqlType::Bytes => Box::new(Option::<Vec<u8>>::None),
        SqlType::Uuid => Box::new(Option::<uuid::Uuid>::None),
        SqlType::Decimal => Box::new(Option::<rust_decimal::Decimal>::None),
        SqlType::DateTime => Box::new(Option::<NaiveDateTime>::None),
        SqlType::Date => Box::new(Option::<NaiveDate>::None),
        SqlType::Time => Box::new(Option::<NaiveTime>::None),
        SqlType::String => Box::new(Option::<String>::None),
        SqlType::DateTimeOffset => Box::new(Option::<chrono::DateTime<chrono::FixedOffset>>::None),
    }
}

fn days_since_year_one(date: NaiveDate) -> Result<u32> {
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1)
        .ok_or_else(|| Error::InvalidValue("TDS date epoch".into()))?;
    u32::try_from((date - epoch).num_days())
        .map_err(|_| Error::InvalidValue(format!("date {} is before 0001-01-01", date)))
}

fn tds_time(time: NaiveTime) -> tiberius::time::Time {
    let nanos =
        time.num_seconds_from_midnight() as u64 * 1_000_000_000 + time.nanosecond() as u64;
    tiberius::time::Time::new(nanos / 100, 7)
}

fn tds_datetime2(dt: NaiveDateTime) -> Result<tiberius::time::DateTime2> {
    let date = tiberius::time::Date::new(days_since_year_one(dt.date())?);
    Ok(tiberius::time::DateTime2::new(date, tds_time(dt.time())))
}

fn sql_value_to_column_data(value: &SqlValue<'_>) -> Result<ColumnData<'static>> {
    let data = match value {
        SqlValue::Null(null_type) => match null_type {
            SqlType::Bool => ColumnData::Bit(None),
            SqlType::I16 => ColumnData::I16(None),
            SqlType::I32 => ColumnData::I32(None),
            SqlType::I64 => ColumnData::I64(None),
            SqlType::F32 => ColumnData::F32(None),
            SqlType::F64 => ColumnData::F64(None),
            SqlType::String => ColumnData::String(None),
            SqlType::Bytes => ColumnData::Binary(None),
            SqlType::Uuid => ColumnData::Guid(None),
            SqlType::Decimal => ColumnData::Numeric(None),
            SqlType::DateTime => ColumnData::DateTime2(None),
            SqlType::DateTimeOffset => ColumnData::DateTimeOffset(None),
            SqlType::Date => ColumnData::Date(None),
            SqlType::Time => ColumnData::Time(None),
        },
        SqlValue::Bool(b) => ColumnData::Bit(Some(*b)),
        SqlValue::I16(i) => ColumnData::I16(Some(*i)),
        SqlValue::I32(i) => ColumnData::I32(Some(*i)),
        SqlValue::I64(i) => ColumnData::I64(Some(*i)),
        SqlValue::F32(f) => ColumnData::F32(Some(*f)),
        SqlValue::F64(f) => ColumnData::F64(Some(*f)),
        SqlValue::Text(s) => ColumnData::String(Some(Cow::Owned(s.to_string()))),
        SqlValue::Bytes(b) => ColumnData::Binary(Some(Cow::Owned(b.to_vec()))),
        SqlValue::Uuid(u) => ColumnData::Guid(Some(*u)),
        SqlValue::Decimal(d) => ColumnData::Numeric(Some(
            tiberius::numeric::Numeric::new_with_scale(d.mantissa(), d.scale() as u8),
        )),
        SqlValue::DateTime(dt) => ColumnData::DateTime2(Some(tds_datetime2(*dt)?)),
        SqlValue::DateTimeOffset(dto) => {
            let datetime2 = tds_datetime2(dto.naive_utc())?;
            let offset_minutes = (dto.offset().local_minus_utc() / 60) as i16;
            ColumnData::DateTimeOffset(Some(tiberius::time::DateTimeOffset::new(
                datetime2,
                offset_minutes,
            )))
        }
        SqlValue::Date(d) => {
            ColumnData::Date(Some(tiberius::time::Date::new(days_since_year_one(*d)?)))
        }
        SqlValue::Time(t) => ColumnData::Time(Some(tds_time(*t))),
    };
    Ok(data)
}
