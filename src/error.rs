//! Error types for the assessment pipeline
//!
//! Errors are split by blast radius: `FormatError` aborts a whole session,
//! `SizingError`/`PricingError` are recorded against a single VM while the
//! batch continues, and `ConfigError` is raised once at load time so a bad
//! catalog can never surface mid-pipeline.

use thiserror::Error;

/// Common result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for caller-facing operations
#[derive(Error, Debug)]
pub enum Error {
    /// Inventory archive or schema unreadable (fatal to the session)
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Catalog or pipeline configuration invalid (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Report rendering failed
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Requested session, artifact, or format not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request is well-formed but not valid in the session's current state
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal pipeline error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Archive-level parse failure. Any of these aborts the whole session;
/// individual bad rows degrade to warnings instead (see the inventory
/// parser).
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("archive is not a readable ZIP file: {0}")]
    UnreadableArchive(String),

    #[error("archive size {actual} bytes is outside the accepted range {min}..={max}")]
    SizeOutOfBounds { actual: u64, min: u64, max: u64 },

    #[error("required sheet matching '{0}' not found in archive")]
    MissingSheet(&'static str),

    #[error("sheet '{sheet}' could not be read: {reason}")]
    UnreadableSheet { sheet: String, reason: String },

    #[error("sheet '{sheet}' has no header row")]
    EmptySheet { sheet: String },

    #[error("sheet '{sheet}' is missing the mandatory '{column}' column")]
    MissingColumn { sheet: String, column: &'static str },

    #[error("inventory contains no VM rows")]
    NoRecords,
}

/// Per-VM sizing failure. Recorded against the VM's row; the batch
/// continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SizingError {
    #[error("no catalog shape fits {ocpus} OCPUs / {memory_gib} GiB memory")]
    NoShapeFits { ocpus: u32, memory_gib: u64 },

    #[error("record is not sizable: {0}")]
    InvalidRecord(String),
}

/// Per-VM pricing failure. Recorded against the VM's row; the batch
/// continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    #[error("no compute rate for shape '{0}'")]
    MissingShapeRate(String),

    #[error("no storage rate for tier '{0}'")]
    MissingStorageRate(String),

    #[error("no license rate for class '{0}'")]
    MissingLicenseRate(String),
}

/// Catalog or configuration validation failure, raised at load time only
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {section}: {reason}")]
    Invalid {
        section: &'static str,
        reason: String,
    },
}

impl ConfigError {
    /// Shorthand for a validation failure in a named config section
    pub fn invalid(section: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            section,
            reason: reason.into(),
        }
    }
}

/// Report rendering failure
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("delimited-text error: {0}")]
    Delimited(#[from] csv::Error),

    #[error("structured-data error: {0}")]
    Structured(#[from] serde_json::Error),

    #[error("report buffer error: {0}")]
    Buffer(String),
}
