//! Error types for bulk insert operations.

use thiserror::Error;

/// Exit code for configuration errors (missing connection string, bad YAML).
pub const EXIT_CONFIG_ERROR: u8 = 1;

/// Exit code for driver and connection errors.
pub const EXIT_DATABASE_ERROR: u8 = 2;

/// Exit code for mapping and buffer construction errors.
pub const EXIT_DATA_ERROR: u8 = 3;

/// Exit code for failed or aborted transfers.
pub const EXIT_TRANSFER_ERROR: u8 = 4;

/// Exit code for IO errors (file not found, permissions).
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for bulk insert operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (invalid YAML, missing connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Driver error from the SQL Server connection
    #[error("Database error: {0}")]
    Database(#[from] tiberius::error::Error),

    /// Entity mapping is missing or inconsistent with the entity's properties
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// A property produced a value of a different type than its column
    #[error("Column {column}: expected {expected:?} value, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: crate::core::SqlType,
        actual: crate::core::SqlType,
    },

    /// NULL written into a column that does not allow it
    #[error("Column {column} does not allow NULL")]
    NullViolation { column: String },

    /// String or binary value longer than the mapped max length
    #[error("Column {column}: value length {actual} exceeds max length {max_length}")]
    ValueTooLong {
        column: String,
        max_length: usize,
        actual: usize,
    },

    /// A value the server cannot represent (e.g. a date before year 1)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Two buffered rows share the same primary key
    #[error("Duplicate primary key {key} for table {table}")]
    DuplicateKey { table: String, key: String },

    /// Bulk load failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// A transactional insert failed; the cause is kept as the source.
    #[error("Bulk insert into {table} aborted (rolled back: {rolled_back})")]
    Aborted {
        table: String,
        rolled_back: bool,
        #[source]
        source: Box<Error>,
    },

    /// IO error (file operations, sockets)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Mapping error
    pub fn mapping(message: impl Into<String>) -> Self {
        Error::Mapping(message.into())
    }

    /// The error that started it all, looking through `Aborted` wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Aborted { source, .. } => source.root(),
            other => other,
        }
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) | Error::Yaml(_) | Error::Json(_) => EXIT_CONFIG_ERROR,
            Error::Database(_) => EXIT_DATABASE_ERROR,
            Error::Mapping(_)
            | Error::TypeMismatch { .. }
            | Error::NullViolation { .. }
            | Error::ValueTooLong { .. }
            | Error::InvalidValue(_)
            | Error::DuplicateKey { .. } => EXIT_DATA_ERROR,
            Error::Transfer { .. } | Error::Aborted { .. } => EXIT_TRANSFER_ERROR,
            Error::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for bulk insert operations.
pub type Result<T> = std::result::Result<T, Error>;
