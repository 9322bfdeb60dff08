use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by object storage backends.
#[derive(Error, Diagnostic, Debug)]
pub enum StorageError {
    #[error("{action} failed for {key:?}: {message}")]
    #[diagnostic(
        code(yumsync_storage::request),
        help("Check the bucket name, region and credentials")
    )]
    Request {
        action: &'static str,
        key: String,
        message: String,
    },

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(yumsync_storage::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },
}

/// A specialized Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::Request {
            action: "put",
            key: "repodata/repomd.xml".to_string(),
            message: "access denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "put failed for \"repodata/repomd.xml\": access denied"
        );
    }
}
