//! Error types for the codemod engine.
//!
//! None of these escape the transform runner: they are folded into
//! [`TransformOutcome::Failed`](crate::codemod::TransformOutcome) together with
//! a copy-paste snippet. Direct per-role functions return them as-is.

use thiserror::Error;

/// Errors raised while parsing, locating anchors or splicing edits
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodemodError {
    /// The file is not syntactically valid for its grammar
    #[error("Could not parse {path}: {message}")]
    Parse { path: String, message: String },

    /// A required structural location does not exist in the file
    #[error("Could not find {0}")]
    AnchorNotFound(String),

    /// The anchor exists but in a form we refuse to guess about
    #[error("Unsupported shape for {anchor}: {detail}")]
    AmbiguousShape { anchor: String, detail: String },

    /// A hook we would install is already defined with user logic
    #[error("The `{0}` hook already exists, refusing to overwrite it")]
    HookAlreadyExists(String),

    /// A batch of edits would have produced invalid syntax
    #[error("Edit rejected: {0}")]
    InvalidEdit(String),

    /// No grammar for this file extension
    #[error("Unsupported file type: {0}")]
    UnsupportedLanguage(String),

    /// Invalid options handed over by the wizard
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while reading or writing the target file
    #[error("I/O error: {0}")]
    Io(String),
}

impl CodemodError {
    pub fn not_found(anchor: impl Into<String>) -> Self {
        CodemodError::AnchorNotFound(anchor.into())
    }

    pub fn ambiguous(anchor: impl Into<String>, detail: impl Into<String>) -> Self {
        CodemodError::AmbiguousShape {
            anchor: anchor.into(),
            detail: detail.into(),
        }
    }

    /// Anchor problems are the ones a tailored fallback snippet can fix by hand
    pub fn is_anchor_error(&self) -> bool {
        matches!(
            self,
            CodemodError::AnchorNotFound(_) | CodemodError::AmbiguousShape { .. }
        )
    }
}

impl From<std::io::Error> for CodemodError {
    fn from(err: std::io::Error) -> Self {
        CodemodError::Io(err.to_string())
    }
}

/// Result type alias for CodemodError
pub type Result<T> = std::result::Result<T, CodemodError>;
