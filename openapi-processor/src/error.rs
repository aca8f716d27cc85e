use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Failures that abort a processing run.
///
/// Everything that goes wrong per resource, action, role or mapping is
/// collected in the run report instead.
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("OpenAPI spec not found: {0}")]
    SpecNotFound(String),

    #[error("Failed to fetch OpenAPI spec: {0}")]
    Fetch(String),

    #[error("Failed to parse OpenAPI spec: {0}")]
    Parse(String),

    #[error("Invalid OpenAPI document: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ProcessorError {
    fn from(err: reqwest::Error) -> Self {
        ProcessorError::Fetch(err.to_string())
    }
}
