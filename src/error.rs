//! Error types.
//!
//! Only programmer misuse surfaces as an error: malformed or overlapping field
//! paths, and failed conversions between form values and typed host data.
//! Stale bindings, coercion failures, validation failures and access after
//! teardown are all absorbed where they happen.

use thiserror::Error;

/// A field path that cannot be used to address the state trees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("field path is empty")]
    Empty,
    #[error("field path `{0}` contains an empty segment")]
    EmptySegment(String),
    #[error("field path `{0}` has an unbalanced bracket")]
    UnbalancedBracket(String),
    /// Two registered fields would address the same subtree.
    #[error("field path `{path}` overlaps the registered field `{existing}`")]
    Overlaps { path: String, existing: String },
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("failed to convert form values: {0}")]
    Convert(#[from] serde_json::Error),
}
