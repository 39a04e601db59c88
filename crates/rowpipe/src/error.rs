//! Error types for the ETL library.

use std::sync::Arc;

use thiserror::Error;

/// Main error type for ETL operations.
///
/// Every variant is fatal to the job that raised it. The job runner stops the
/// whole run on the first error instead of skipping to the next job.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQL Server connection or query error
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// PostgreSQL connection or query error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Two columns of one result set normalize to the same name
    #[error("Column {column} appeared twice in this result set")]
    DuplicateColumn { column: String },

    /// The driver-reported type of a column has no canonical value type
    #[error("Cannot resolve type '{native_type}' of column {column}")]
    TypeResolution { column: String, native_type: String },

    /// A value does not fit the type recorded for its column
    #[error("Column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    /// A write statement references a column the record does not have
    #[error("Write statement parameter {name} has no matching column")]
    UnboundParameter { name: String },

    /// Malformed write statement
    #[error("Invalid write statement: {0}")]
    Statement(String),

    /// Source driver failure outside any one job
    #[error("Source error: {0}")]
    Source(String),

    /// Extraction failed for a job
    #[error("Extract failed for job {job}: {source}")]
    Extract {
        job: String,
        #[source]
        source: Arc<EtlError>,
    },

    /// Batch write failed for a job
    #[error("Load failed for job {job} (batch {batch}): {message}")]
    Load {
        job: String,
        batch: usize,
        message: String,
    },

    /// The other end of the row channel went away
    #[error("Row channel closed: {0}")]
    ChannelClosed(String),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Run cancelled")]
    Cancelled,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EtlError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        EtlError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Attach the failing job to an extraction error
    pub fn extract(job: impl Into<String>, source: EtlError) -> Self {
        EtlError::Extract {
            job: job.into(),
            source: Arc::new(source),
        }
    }

    /// Create a Load error
    pub fn load(job: impl Into<String>, batch: usize, message: impl ToString) -> Self {
        EtlError::Load {
            job: job.into(),
            batch,
            message: message.to_string(),
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            EtlError::Config(_) | EtlError::Yaml(_) => 2,
            EtlError::Cancelled => 130,
            _ => 1,
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

/// Result type alias for ETL operations.
pub type Result<T> = std::result::Result<T, EtlError>;
