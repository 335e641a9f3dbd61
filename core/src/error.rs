use slide_client::ClientError;
use std::path::PathBuf;
use thiserror::Error;

/// Context documents offered by the user that could not be taken in.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Only {expected} files are accepted for context: {name}")]
    UnsupportedFileKind { name: String, expected: &'static str },

    #[error("Drop {expected} files only")]
    NoAcceptableFiles { expected: &'static str },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of a generation submission. The first four are raised before
/// anything is sent.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("A prompt is required")]
    MissingPrompt,

    #[error("Template .pptx is required for generation")]
    MissingTemplate,

    #[error("Template must be a {expected} file: {name}")]
    UnsupportedFileKind { name: String, expected: &'static str },

    #[error("Failed to read template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Request(#[from] ClientError),
}

impl GenerationError {
    /// True for failures caught on the client before any network call.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, GenerationError::Request(_))
    }
}

/// The response arrived but file references could not be read from it.
/// Recorded on the workflow; never fails a submission.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Could not read file references from the response: {reason}")]
pub struct ResponseParseDegradation {
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error(transparent)]
    Request(#[from] ClientError),

    #[error("Only {expected} files can be imported: {name}")]
    UnsupportedFileKind { name: String, expected: &'static str },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
