use thiserror::Error;

/// Structural problems in an input feed. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{source_name}:{line}: invalid date '{value}'")]
    InvalidDate {
        source_name: String,
        line: u64,
        value: String,
    },

    #[error("{source_name}:{line}: invalid time '{value}'")]
    InvalidTime {
        source_name: String,
        line: u64,
        value: String,
    },

    #[error("{source_name}:{line}: {message}")]
    InvalidRow {
        source_name: String,
        line: u64,
        message: String,
    },
}
