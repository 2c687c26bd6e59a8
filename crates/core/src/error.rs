use crate::types::ValueKey;

/// A malformed introspection payload. Parsing is all-or-nothing, so any
/// of these discards the whole schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("Introspection payload must be a JSON object")]
    NotAnObject,

    #[error("Missing required field '{field}' at {path}")]
    MissingField { path: String, field: &'static str },

    #[error("Field '{field}' at {path} must be {expected}")]
    InvalidField {
        path: String,
        field: &'static str,
        expected: &'static str,
    },

    #[error("Duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("Malformed introspection JSON: {0}")]
    Json(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The key does not belong to the currently loaded schema.
    #[error("Unknown input: {0}")]
    UnknownInput(ValueKey),

    /// Header/widget inputs are never edited.
    #[error("Input {0} is not editable")]
    NotEditable(ValueKey),

    /// A flattened `node.input` key could not be split.
    #[error("Malformed input key '{0}', expected '<node>.<input>'")]
    MalformedKey(String),
}
