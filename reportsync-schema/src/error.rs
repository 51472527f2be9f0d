//! Error types for reportsync-schema.

use thiserror::Error;

/// Errors raised while compiling path strings into a [`crate::Schema`].
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("empty field path")]
    EmptyPath,

    #[error("field path '{path}' has an empty segment")]
    EmptySegment { path: String },

    #[error("field path '{path}': `[]` must follow a field name")]
    DanglingArrayMarker { path: String },

    #[error("field path '{path}': a nested `[]` may only end the path")]
    NestedArrayMarker { path: String },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}
