//! Error types for upstream repository access and metadata parsing.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while talking to an upstream repository over HTTP.
#[derive(Error, Diagnostic, Debug)]
pub enum FetchError {
    #[error(transparent)]
    #[diagnostic(
        code(yumsync_core::http),
        help("Check your network connection and the repository URL")
    )]
    Http(#[from] reqwest::Error),

    #[error("Request failed: {url} [{status}]")]
    #[diagnostic(
        code(yumsync_core::http_status),
        help("Verify the repository URL is correct and accessible")
    )]
    Status { url: String, status: u16 },

    #[error("Response for {url} exceeds {limit} bytes")]
    #[diagnostic(code(yumsync_core::response_too_large))]
    ResponseTooLarge { url: String, limit: u64 },

    #[error("Invalid URL: {0}")]
    #[diagnostic(
        code(yumsync_core::invalid_url),
        help("Ensure the URL is valid and properly formatted")
    )]
    InvalidUrl(String),

    #[error("Error while {action}: {source}")]
    #[diagnostic(code(yumsync_core::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },
}

/// Errors raised while decoding repository metadata documents.
#[derive(Error, Diagnostic, Debug)]
pub enum ParseError {
    #[error(transparent)]
    #[diagnostic(
        code(yumsync_core::xml),
        help("The repository metadata may be corrupted or truncated")
    )]
    Xml(#[from] quick_xml::Error),

    #[error(transparent)]
    #[diagnostic(code(yumsync_core::xml_attr))]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error(transparent)]
    #[diagnostic(code(yumsync_core::xml_escape))]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error("Failed to start decompression: {0}")]
    #[diagnostic(
        code(yumsync_core::decompress),
        help("The index file may be corrupted")
    )]
    Decompress(#[source] std::io::Error),

    #[error("Section {0:?} not found in repomd.xml")]
    #[diagnostic(
        code(yumsync_core::missing_section),
        help("The repository index does not describe this metadata file")
    )]
    MissingSection(String),

    #[error("Required element {element:?} is missing")]
    #[diagnostic(code(yumsync_core::missing_element))]
    MissingElement { element: &'static str },

    #[error("Element {element:?} is missing attribute {attribute:?}")]
    #[diagnostic(code(yumsync_core::missing_attribute))]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Invalid size value {value:?}")]
    #[diagnostic(code(yumsync_core::invalid_size))]
    InvalidSize { value: String },

    #[error("Duplicate package path {0:?}")]
    #[diagnostic(
        code(yumsync_core::duplicate_path),
        help("The primary index lists the same location twice")
    )]
    DuplicatePath(String),
}

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T, FetchError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T, FetchError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            FetchError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::Status {
            url: "https://example.com/repomd.xml".to_string(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "Request failed: https://example.com/repomd.xml [404]"
        );

        let err = ParseError::MissingSection("primary".to_string());
        assert_eq!(err.to_string(), "Section \"primary\" not found in repomd.xml");

        let err = ParseError::MissingAttribute {
            element: "location",
            attribute: "href",
        };
        assert_eq!(
            err.to_string(),
            "Element \"location\" is missing attribute \"href\""
        );
    }
}
