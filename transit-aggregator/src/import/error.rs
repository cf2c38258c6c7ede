//! Import error types.

use std::path::PathBuf;

use crate::dataset::{DataSetFormat, HookError};
use crate::events::PublishError;
use crate::store::StoreError;

/// Errors while downloading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Source answered with a non-success status
    #[error("source returned status {status}")]
    Status { status: u16 },

    /// Source rejected our credentials
    #[error("unauthorized by source")]
    Unauthorized,

    /// The download hook couldn't prepare the request
    #[error("download hook failed: {0}")]
    Hook(#[from] HookError),

    /// Reading a local source failed
    #[error("failed to read {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

/// Errors while unpacking a downloaded bundle.
#[derive(Debug, thiserror::Error)]
pub enum UnpackError {
    #[error("gzip decode failed: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("zip archive unreadable: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("zip entry {name} unreadable: {error}")]
    ZipEntry {
        name: String,
        #[source]
        error: std::io::Error,
    },
}

/// Errors from a parser.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The payload isn't valid for the format
    #[error("malformed payload: {message}")]
    Malformed { message: String },

    /// The parser can't handle this format
    #[error("unsupported format {0:?}")]
    UnsupportedFormat(DataSetFormat),
}

/// Errors that abort one dataset's import.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Unpack(#[from] UnpackError),

    /// No parser registered for the dataset's format
    #[error("no parser registered for format {0:?}")]
    NoParser(DataSetFormat),

    #[error("store rejected entities: {0}")]
    Store(#[from] StoreError),

    #[error("failed to publish to realtime queue: {0}")]
    Publish(#[from] PublishError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FetchError::Status { status: 503 };
        assert_eq!(err.to_string(), "source returned status 503");

        let err = ImportError::NoParser(DataSetFormat::Naptan);
        assert_eq!(err.to_string(), "no parser registered for format Naptan");

        let err = FetchError::Io {
            path: PathBuf::from("/data/feed.json"),
            error: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.to_string(), "failed to read /data/feed.json: missing");

        let err = ImportError::from(FetchError::Unauthorized);
        assert_eq!(err.to_string(), "unauthorized by source");
    }
}
