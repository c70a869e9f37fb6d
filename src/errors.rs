use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse JSON configuration in {path}: {source}")]
    JsonParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Configuration file not found at {path}")]
    NotFound { path: PathBuf },
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Missing input for table '{table}': {detail}")]
    InputGap { table: String, detail: String },
    #[error("Unknown regression type '{regression_type}' for {context}")]
    UnknownRegressionType {
        regression_type: String,
        context: String,
    },
    #[error("Schema mismatch for table '{table}': Missing columns: {missing:?}, Extra columns: {extra:?}, Mistyped columns: {mistyped:?}")]
    SchemaMismatch {
        table: String,
        missing: Vec<String>,
        extra: Vec<String>,
        mistyped: Vec<String>,
    },
    #[error("Invalid value in table '{table}', column '{column}': {message}")]
    InvalidValue {
        table: String,
        column: String,
        message: String,
    },
    #[error("Unknown calculated table '{0}'")]
    UnknownTable(String),
    #[error("Invalid override for table '{table}': {message}")]
    InvalidOverride { table: String, message: String },
    #[error("Scenario '{0}' is not part of this project")]
    UnknownScenario(String),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Unsupported file format for {path}")]
    UnsupportedFormat { path: PathBuf },
    #[error("Refusing to overwrite existing file {path}")]
    AlreadyExists { path: PathBuf },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("DataFrame operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl ProjectionError {
    pub fn input_gap(table: &str, detail: impl Into<String>) -> Self {
        Self::InputGap {
            table: table.to_string(),
            detail: detail.into(),
        }
    }

    pub fn invalid_value(table: &str, column: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            table: table.to_string(),
            column: column.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
