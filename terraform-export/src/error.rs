use permit_api::ApiError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to list {collection}: {source}")]
    Fetch {
        collection: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("Condition set '{key}' cannot be exported: {reason}")]
    InvalidConditionSet { key: String, reason: String },
}
