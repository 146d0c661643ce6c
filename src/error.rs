use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file structure: {0}")]
    Structural(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{count} row(s) failed validation (strict mode)")]
    RowsRejected { count: usize },

    #[error("{0}")]
    Other(String),
}

/// Problems found while loading settings or a ruleset. Always fatal, and
/// always raised before any transaction is touched.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("rule {index}: pattern is empty")]
    EmptyPattern { index: usize },

    #[error("rule {index}: category is empty")]
    EmptyCategory { index: usize },

    #[error("rule {index}: invalid regex '{pattern}': {message}")]
    InvalidPattern {
        index: usize,
        pattern: String,
        message: String,
    },

    #[error("rule {index} duplicates rule {first} ('{pattern}'), precedence is ambiguous")]
    DuplicateRule {
        index: usize,
        first: usize,
        pattern: String,
    },

    #[error("rule {index}: unknown category '{category}'")]
    UnknownCategory { index: usize, category: String },

    #[error("no date formats configured")]
    NoDateFormats,

    #[error("invalid date format '{0}'")]
    InvalidDateFormat(String),

    #[error("cannot read {path}: {message}")]
    Unreadable { path: String, message: String },
}

pub type Result<T> = std::result::Result<T, TallyError>;
