//! Error types for decoding and encoding XML node trees.

use thiserror::Error;

/// Result type alias for quarto-xml-tree operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding or encoding node trees.
#[derive(Debug, Error)]
pub enum Error {
    /// The tokenizer rejected the input.
    #[error("XML syntax error at byte {position}: {source}")]
    Syntax {
        #[source]
        source: quick_xml::Error,
        /// Byte offset where the error occurred.
        position: u64,
    },

    /// I/O failure in a token source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A token that cannot start a node, such as a stray end tag.
    #[error("unexpected XML token {token}")]
    UnexpectedToken { token: String },

    /// Element nesting went past the configured limit.
    #[error("element nesting exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },

    /// A processing instruction without a target cannot be written.
    #[error("cannot encode processing instruction with empty target")]
    EmptyPiTarget,

    /// An element without a local name cannot be written.
    #[error("cannot encode Elem with empty name")]
    EmptyElementName,

    /// Content that would change meaning when written as XML text, such as
    /// a comment containing `--`.
    #[error("cannot encode {kind}: {reason}")]
    InvalidContent {
        kind: &'static str,
        reason: &'static str,
    },

    /// Malformed JSON form of a node tree.
    #[error(transparent)]
    Json(#[from] JsonError),
}

/// Errors specific to the JSON form of node trees.
#[derive(Debug, Error)]
pub enum JsonError {
    /// A node object without a `type` field.
    #[error("required field \"type\" is missing in {raw}")]
    MissingType {
        /// The offending JSON object, re-serialized.
        raw: String,
    },

    /// A node object whose `type` is not one of the known discriminators.
    #[error("unrecognized node type {value:?}")]
    UnknownType { value: String },

    /// Fields that don't match the shape for their discriminator, or input
    /// that isn't valid JSON at all.
    #[error("JSON error: {0}")]
    Shape(#[from] serde_json::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(JsonError::Shape(err))
    }
}
