use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Source '{source_id}' references column '{column}' which is not in the table")]
    UnknownColumn { source_id: String, column: String },

    #[error("Source '{source_id}' keeps column '{column}' without a declared type")]
    UndeclaredColumn { source_id: String, column: String },

    #[error("Cannot coerce value '{value}' in column '{column}' (row {row}) to {expected}")]
    TypeCoercion {
        column: String,
        row: usize,
        value: String,
        expected: String,
    },

    #[error("Value '{value}' in column '{column}' is not covered by its remap rule")]
    UnmappedCategory { column: String, value: String },

    #[error("Country lookup maps raw key '{raw_key}' to both {first} and {second}")]
    AmbiguousCountry {
        raw_key: String,
        first: String,
        second: String,
    },

    #[error("Country lookup gives canonical code '{code}' two names: '{first}' and '{second}'")]
    ConflictingCanonicalName {
        code: String,
        first: String,
        second: String,
    },

    #[error("Duplicate join key '{key}' in table '{table}'")]
    DuplicateJoinKey { table: String, key: String },

    #[error("Column '{column}' appears in both '{left}' and '{right}'")]
    ColumnCollision {
        column: String,
        left: String,
        right: String,
    },

    #[error("Analysis table has unbucketed columns: {columns:?}")]
    UnbucketedColumns { columns: Vec<String> },

    #[error("Feature catalog columns missing from analysis table: {columns:?}")]
    MissingFeatureColumns { columns: Vec<String> },

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
