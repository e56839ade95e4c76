/// All errors produced by drivefs-core.
#[derive(Debug, thiserror::Error)]
pub enum DriveFsError {
    #[error("'{value}' is not a valid value for '{name}'")]
    InvalidArgument { name: &'static str, value: String },

    #[error("ambiguous path {path}: {matches} entries named '{segment}'")]
    AmbiguousPath {
        path: String,
        segment: String,
        matches: usize,
    },

    #[error("no drive identity on link: {path}")]
    MissingIdentity { path: String },

    #[error("directory not empty: {path}")]
    DirectoryNotEmpty { path: String },

    #[error("not found: {path}")]
    NotFound { path: String },

    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    #[error("not a file: {path}")]
    NotAFile { path: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("drive API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriveFsError {
    /// Errors raised by the transport or the remote service, as opposed to
    /// errors in the caller's request or the drive's naming.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Api { .. } | Self::Http(_) | Self::Json(_) | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DriveFsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_message() {
        let err = DriveFsError::InvalidArgument {
            name: "api_key",
            value: "  ".into(),
        };
        assert_eq!(err.to_string(), "'  ' is not a valid value for 'api_key'");
    }

    #[test]
    fn remote_classification() {
        let api = DriveFsError::Api {
            status: 503,
            message: "backend error".into(),
        };
        assert!(api.is_remote());

        let ambiguous = DriveFsError::AmbiguousPath {
            path: "a/b".into(),
            segment: "b".into(),
            matches: 2,
        };
        assert!(!ambiguous.is_remote());
        assert!(!DriveFsError::NotFound { path: "x".into() }.is_remote());
    }
}
