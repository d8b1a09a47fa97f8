//! Error types for schema snapshots and row decoding

/// Errors raised while reading definitions or decoding stored rows
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Definition JSON could not be parsed
    #[error("invalid definition: {0}")]
    InvalidDefinition(#[source] serde_json::Error),

    /// Row has no `id` key
    #[error("record has no id")]
    MissingId,

    /// Row `id` is neither an integer nor a string
    #[error("record id has unsupported shape: {0}")]
    InvalidId(String),

    /// A serialized attribute could not be decoded
    #[error("malformed value for '{attribute}': {source}")]
    MalformedValue {
        /// Attribute holding the serialized value
        attribute: String,
        /// Decoder failure
        #[source]
        source: serde_json::Error,
    },

    /// Localization membership list has an unexpected shape
    #[error("malformed localizations: {0}")]
    MalformedLocalizations(String),
}

impl SchemaError {
    /// Create malformed value error for attribute
    pub fn malformed_value(attribute: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedValue {
            attribute: attribute.into(),
            source,
        }
    }
}
