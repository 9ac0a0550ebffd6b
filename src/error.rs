//! Error types for the generator

use thiserror::Error;

/// Result type for generator operations
pub type Result<T> = std::result::Result<T, GenerateError>;

/// Maximum number of `$ref` links the resolver will follow in a chain.
pub const MAX_REF_CHAIN: usize = 32;

/// Fatal generator errors. Any of these aborts the whole run; no output
/// files are written.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("cannot load schema {uri}: {reason}")]
    Load { uri: String, reason: String },

    #[error("cannot resolve $ref {reference} from {base}: {reason}")]
    Ref {
        reference: String,
        base: String,
        reason: String,
    },

    #[error("$ref chain starting at {reference} exceeds {limit} links")]
    RefChainTooDeep { reference: String, limit: usize },

    #[error("allOf branches disagree on {keyword} at {pointer}: {left} vs {right}")]
    ConflictingConstraints {
        pointer: String,
        keyword: String,
        left: String,
        right: String,
    },

    #[error("default value for {field} does not match type {expected}: {actual}")]
    DefaultTypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported schema keyword {keyword:?} at {pointer}")]
    UnsupportedSchema { pointer: String, keyword: String },

    #[error("override forces two declarations to share the name {name} in package {package}")]
    NamingCollision { package: String, name: String },

    #[error("invalid pattern {pattern:?} at {pointer}: {source}")]
    InvalidPattern {
        pointer: String,
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal generator error: {0}")]
    Internal(String),
}

/// A tolerable diagnostic collected during generation and reported after
/// successful emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Location of the offending node (document URI plus pointer)
    pub location: String,
    /// Human-readable description
    pub message: String,
}

impl Warning {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.location.is_empty() {
            write!(f, "warning: {}", self.message)
        } else {
            write!(f, "warning: {}: {}", self.location, self.message)
        }
    }
}
