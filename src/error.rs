use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Directory '{}' not found", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Error accessing directory '{}': {source}", .path.display())]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No CSV files found in '{}'", .0.display())]
    NoCsvFilesFound(PathBuf),

    #[error("Failed to read file {file}: {source}")]
    FileParse {
        file: String,
        #[source]
        source: Box<EtlError>,
    },

    #[error("No columns to parse from file")]
    NoColumns,

    #[error("No valid sales tables loaded")]
    NoValidData,

    #[error("Master file missing - '{}'", .path.display())]
    MasterFileMissing { path: PathBuf },

    #[error("Column '{column}' holds non-numeric value '{value}'")]
    AggregationType { column: String, value: String },

    #[error("Column '{column}' missing from {table}")]
    JoinKeyMissing { column: String, table: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EtlError {
    /// Conditions that stop the run but are reported as warnings rather than errors.
    pub fn is_warning(&self) -> bool {
        matches!(self, EtlError::NoCsvFilesFound(_))
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
