use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfdiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvalError),

    #[error("Output error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, ConfdiffError>;

/// Failures raised while turning a source into a value tree.
///
/// These are fatal for a run; the differencer is never handed a tree that
/// failed to evaluate.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} input: {message}")]
    Parse { format: String, message: String },

    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("Invalid directive: {0}")]
    InvalidDirective(String),

    #[error("Invalid attribute path: {0}")]
    InvalidPath(String),

    #[error("Attribute path not found: {0}")]
    MissingAttribute(String),
}
