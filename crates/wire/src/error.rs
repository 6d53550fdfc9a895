//! Error types for entity serialization and deserialization.

use helios_entity::DataError;
use thiserror::Error;

/// Errors raised by the wire codecs.
#[derive(Error, Debug)]
pub enum SerdeError {
    /// JSON serialization or deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML serialization or deserialization error
    #[cfg(feature = "xml")]
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// IO error during serialization/deserialization
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A decoded value did not fit the entity it was written into.
    #[error(transparent)]
    Data(#[from] DataError),

    /// The input is structurally invalid for the expected entity shape.
    #[error("malformed wire format: {message}")]
    MalformedWireFormat { message: String },

    /// A multi-kind candidate type has no usable discriminator default.
    #[error("type `{type_name}` has no non-null default for discriminator `{discriminator}`")]
    MissingDiscriminatorField {
        type_name: &'static str,
        discriminator: String,
    },

    /// Two multi-kind candidate types share a discriminator value.
    #[error("kind `{kind}` is registered by both `{first}` and `{second}`")]
    DuplicateKind {
        kind: String,
        first: &'static str,
        second: &'static str,
    },

    /// A feed entry carried a discriminator value with no registered type.
    #[error("unrecognized kind {kind:?} for entry {position}")]
    UnrecognizedKind {
        /// The discriminator value, `None` when the entry had none.
        kind: Option<String>,
        /// Zero-based index of the entry within the feed.
        position: usize,
    },

    /// A partial update would need a structured or collection field diff.
    #[error("field `{field}` changed but structured and collection fields cannot be diffed")]
    UnsupportedDiff { field: String },

    /// The content type does not select any codec.
    #[error("unsupported content type `{content_type}`")]
    UnsupportedContentType { content_type: String },

    /// Custom error message
    #[error("{0}")]
    Custom(String),
}

impl SerdeError {
    pub fn malformed(message: impl Into<String>) -> Self {
        SerdeError::MalformedWireFormat {
            message: message.into(),
        }
    }

    /// Returns true for structural input failures: explicit wire-format
    /// mismatches, JSON syntax/shape errors, XML syntax errors and content
    /// types no codec reads.
    pub fn is_malformed_wire_format(&self) -> bool {
        match self {
            SerdeError::MalformedWireFormat { .. } | SerdeError::UnsupportedContentType { .. } => true,
            SerdeError::Json(err) => !err.is_io(),
            #[cfg(feature = "xml")]
            SerdeError::Xml(err) => !matches!(err, quick_xml::Error::Io(_)),
            _ => false,
        }
    }
}

impl From<String> for SerdeError {
    fn from(msg: String) -> Self {
        SerdeError::Custom(msg)
    }
}

impl From<&str> for SerdeError {
    fn from(msg: &str) -> Self {
        SerdeError::Custom(msg.to_string())
    }
}

impl serde::ser::Error for SerdeError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        SerdeError::Custom(msg.to_string())
    }
}

impl serde::de::Error for SerdeError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        SerdeError::malformed(msg.to_string())
    }
}

/// Result type alias for wire operations
pub type Result<T> = std::result::Result<T, SerdeError>;
