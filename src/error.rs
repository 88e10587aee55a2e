use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in index operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error with context.
    #[error("I/O error at {path}: {context} ({source})")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        context: String,
    },

    /// Invalid argument provided.
    #[error("invalid argument for field '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    /// Search or reconstruct requested before the graph was built.
    #[error("the index has not been built yet")]
    NotBuilt,

    /// A search batch was cancelled through the interruption flag.
    #[error("search was interrupted")]
    Interrupted,

    /// Malformed or truncated dataset file.
    #[error("invalid dataset file {path}: {message}")]
    Dataset { path: PathBuf, message: String },
}

impl Error {
    /// Create an I/O error with context.
    pub fn io_err(
        path: impl Into<PathBuf>,
        context: impl Into<String>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        move |e: std::io::Error| Error::Io {
            source: e,
            path: path.into(),
            context: context.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_arg(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a dataset format error.
    pub fn dataset(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Dataset {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;
