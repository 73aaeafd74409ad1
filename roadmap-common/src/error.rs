//! Common error types for the roadmap scoring and sync engine
//!
//! Row- and initiative-level variants (`UnresolvedColumn`, `MissingIdentifier`,
//! `MissingParameter`, `UnknownFramework`, `InvalidValue`, `NotFound`) are caught at
//! orchestrator loop boundaries and recorded. `StoreUnavailable`, `TransportUnavailable`
//! and `Config` are fatal to the current pass and propagate to the caller.

use thiserror::Error;

/// Common result type for roadmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the roadmap crates
#[derive(Error, Debug)]
pub enum Error {
    /// Header present in the grid but not recognized
    #[error("Unresolved column: {0}")]
    UnresolvedColumn(String),

    /// Row has no usable initiative key
    #[error("Missing identifier in row {row}")]
    MissingIdentifier { row: usize },

    /// Required scoring input absent and no default configured
    #[error("Missing parameter {parameter} for framework {framework}")]
    MissingParameter {
        framework: String,
        parameter: String,
    },

    /// Framework identifier not in the registry
    #[error("Unknown framework: {0}")]
    UnknownFramework(String),

    /// Cell text that cannot be read as a finite number
    #[error("Invalid value {value:?} for field {field}")]
    InvalidValue { field: String, value: String },

    /// Requested initiative not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence layer failure (wraps sqlx::Error)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// Tabular transport failure (workbook I/O, remote sheet API)
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short machine-readable label for reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnresolvedColumn(_) => "unresolved_column",
            Error::MissingIdentifier { .. } => "missing_identifier",
            Error::MissingParameter { .. } => "missing_parameter",
            Error::UnknownFramework(_) => "unknown_framework",
            Error::InvalidValue { .. } => "invalid_value",
            Error::NotFound(_) => "not_found",
            Error::StoreUnavailable(_) => "store_unavailable",
            Error::TransportUnavailable(_) => "transport_unavailable",
            Error::Config(_) => "config",
            Error::InvalidInput(_) => "invalid_input",
            Error::Io(_) => "io",
        }
    }

    /// Whether the error must abort the surrounding pass
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_)
                | Error::TransportUnavailable(_)
                | Error::Config(_)
                | Error::Io(_)
        )
    }
}
