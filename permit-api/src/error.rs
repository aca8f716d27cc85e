use thiserror::Error;

/// Errors returned by the Permit REST API client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Permit API returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Client configuration error: {0}")]
    Config(String),
}

/// Marker the Permit API puts in duplicate-entity messages
const ALREADY_EXISTS_MARKER: &str = "already exists";

impl ApiError {
    /// HTTP status code, when the failure came from an HTTP response
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The human readable part of the error
    pub fn message(&self) -> &str {
        match self {
            ApiError::Http { message, .. } => message,
            ApiError::Transport(message)
            | ApiError::Decode(message)
            | ApiError::Config(message) => message,
        }
    }

    /// Whether the remote entity already exists.
    ///
    /// A 409 status is authoritative. The message is only sniffed when the
    /// failure carries no status code at all.
    pub fn is_conflict(&self) -> bool {
        match self.status() {
            Some(status) => status == 409,
            None => self
                .message()
                .to_lowercase()
                .contains(ALREADY_EXISTS_MARKER),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Get error code for the error type
    pub fn error_code(&self) -> &str {
        match self {
            ApiError::Http { status: 409, .. } => "CONFLICT",
            ApiError::Http { status: 404, .. } => "NOT_FOUND",
            ApiError::Http { status: 401, .. } | ApiError::Http { status: 403, .. } => {
                "UNAUTHORIZED"
            }
            ApiError::Http { .. } => "HTTP_ERROR",
            ApiError::Transport(_) => "TRANSPORT_ERROR",
            ApiError::Decode(_) => "DECODE_ERROR",
            ApiError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ApiError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_decode() => ApiError::Decode(err.to_string()),
            None => ApiError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_from_status() {
        let err = ApiError::Http {
            status: 409,
            message: "DUPLICATE_ENTITY".to_string(),
        };
        assert!(err.is_conflict());
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[test]
    fn test_status_wins_over_message() {
        // A validation failure that happens to mention the marker is not a conflict
        let err = ApiError::Http {
            status: 422,
            message: "field already exists in payload".to_string(),
        };
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_conflict_falls_back_to_message_without_status() {
        let err = ApiError::Transport("Resource Already Exists".to_string());
        assert!(err.is_conflict());

        let err = ApiError::Transport("connection reset".to_string());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_not_found() {
        let err = ApiError::Http {
            status: 404,
            message: "missing".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert_eq!(err.status(), Some(404));
        assert_eq!(ApiError::Decode("x".into()).status(), None);
    }
}
