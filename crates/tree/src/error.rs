use thiserror::Error;

pub type Result<T> = std::result::Result<T, TreeError>;

/// Conditions the tree engine reports instead of failing.
///
/// The builder and mutator never return these to abort an operation: they are
/// carried inside [`crate::MutationOutcome::Skipped`] or logged, and the
/// offending input is left out of the tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// File is not writable or does not live under the workspace root
    #[error("Invalid input {path}: {reason}")]
    InvalidInput { path: String, reason: String },

    /// Dependency coordinates could not be read from an external file path
    #[error("Unresolved external path: {0}")]
    UnresolvedExternalPath(String),

    /// Selected element could not be found in the live source
    #[error("Render miss in {file}: {element}")]
    RenderMiss { file: String, element: String },

    /// Graph or tree document could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl TreeError {
    pub fn invalid_input(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn render_miss(file: impl Into<String>, element: impl Into<String>) -> Self {
        Self::RenderMiss {
            file: file.into(),
            element: element.into(),
        }
    }
}

impl From<serde_json::Error> for TreeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
