//! Error types for the schema export library.

use thiserror::Error;

/// Process exit codes reported by the CLI for each error category.
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_CONNECTION_ERROR: u8 = 2;
pub const EXIT_DATABASE_MISSING: u8 = 3;
pub const EXIT_EXPORT_FAILED: u8 = 4;
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rename or content rule pattern failed to compile
    #[error("Invalid rule pattern '{pattern}'")]
    RulePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// SQL Server connection or query error
    #[error("Server error: {0}")]
    Server(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Requested database does not exist on the server
    #[error("Database {0} is absent")]
    DatabaseNotFound(String),

    /// Object vanished between enumeration and scripting
    #[error("Object {0} not found")]
    ObjectNotFound(String),

    /// Object exists but cannot be scripted as text
    #[error("Object {object} cannot be scripted: {reason}")]
    Unscriptable { object: String, reason: String },

    /// Every worker of a database failed to open a session
    #[error("No worker could connect to database {database}: {message}")]
    NoWorkers { database: String, message: String },

    /// One or more databases failed to export
    #[error("Export failed for: {0}")]
    ExportFailed(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Export was cancelled (SIGINT, etc.)
    #[error("Export cancelled")]
    Cancelled,
}

impl ExportError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        ExportError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an Unscriptable error
    pub fn unscriptable(object: impl Into<String>, reason: impl Into<String>) -> Self {
        ExportError::Unscriptable {
            object: object.into(),
            reason: reason.into(),
        }
    }

    /// Map the error category to a process exit code.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::Config(_)
            | ExportError::RulePattern { .. }
            | ExportError::Yaml(_)
            | ExportError::Json(_) => EXIT_CONFIG_ERROR,
            ExportError::Server(_) | ExportError::Pool { .. } | ExportError::NoWorkers { .. } => {
                EXIT_CONNECTION_ERROR
            }
            ExportError::DatabaseNotFound(_) => EXIT_DATABASE_MISSING,
            ExportError::ObjectNotFound(_)
            | ExportError::Unscriptable { .. }
            | ExportError::ExportFailed(_)
            | ExportError::Cancelled => EXIT_EXPORT_FAILED,
            ExportError::Io(_) => EXIT_IO_ERROR,
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

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
