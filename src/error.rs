//! Error handling for the block logic engine
//!
//! Load-time configuration problems and illegal graph edits are reported
//! through [`CircuitError`]. Transient signal states (`AvailableLater`,
//! `Garbage`) are *not* errors; see [`crate::logic::ValueResult`].

use crate::id::MarkerId;
use crate::types::PrimitiveKind;
use thiserror::Error;

/// Main error type for block logic operations
#[derive(Error, Debug)]
pub enum CircuitError {
    /// An authoring config type string that the primitive registry does not know
    #[error("Unknown config type: {0}")]
    UnknownConfigType(String),

    /// A port whose default kind is not one of its accepted kinds
    #[error("Port {block}.{port}: default kind {kind} is not an accepted kind")]
    DefaultKindNotAccepted {
        block: String,
        port: String,
        kind: PrimitiveKind,
    },

    /// A block type id missing from the catalog
    #[error("Unknown block type: {0}")]
    UnknownBlockType(String),

    /// A block uuid that is not placed
    #[error("Unknown block: {0}")]
    UnknownBlock(String),

    /// A marker handle that does not exist (or whose block was removed)
    #[error("Unknown marker: {0:?}")]
    UnknownMarker(MarkerId),

    /// A port name the block definition does not declare
    #[error("Unknown port {port} on block {block}")]
    UnknownPort { block: String, port: String },

    /// A block uuid that is already placed
    #[error("Block already placed: {0}")]
    DuplicateBlock(String),

    /// A value whose kind the port does not currently accept
    #[error("Port {port} does not accept kind {kind}")]
    KindNotAvailable { port: String, kind: PrimitiveKind },

    /// A write to a port that is backed by another block's output
    #[error("Port {0} is wired and cannot be set directly")]
    ReadOnlyPort(String),

    /// An input marker that already has an upstream wire
    #[error("Input {0} is already connected")]
    AlreadyConnected(String),

    /// A wire between markers with disjoint candidate kinds
    #[error("Cannot connect {from} to {to}: no common kind")]
    IncompatibleKinds { from: String, to: String },

    /// A disconnect on an input that has no wire
    #[error("Input {0} is not connected")]
    NotConnected(String),

    /// A wire whose endpoints are not output -> input
    #[error("Wires must go from an output to an input: {0}")]
    InvalidDirection(String),

    /// Errors related to catalog loading
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CircuitError>,
    },
}

impl CircuitError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CircuitError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for CircuitError {
    fn from(err: serde_json::Error) -> Self {
        CircuitError::Serialization(err.to_string())
    }
}

/// Result type alias for block logic operations
pub type Result<T> = std::result::Result<T, CircuitError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CircuitError::UnknownConfigType("motorSpeed".to_string());
        assert_eq!(err.to_string(), "Unknown config type: motorSpeed");
    }

    #[test]
    fn test_error_with_context() {
        let err = CircuitError::UnknownBlockType("laser".to_string());
        let with_ctx = err.with_context("Failed to place block");
        assert!(with_ctx.to_string().contains("Failed to place block"));
        assert!(with_ctx.to_string().contains("laser"));
    }

    #[test]
    fn test_default_kind_error() {
        let err = CircuitError::DefaultKindNotAccepted {
            block: "and".to_string(),
            port: "value1".to_string(),
            kind: PrimitiveKind::Number,
        };
        assert!(err.to_string().contains("and.value1"));
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn test_result_ext_context() {
        let res: Result<()> = Err(CircuitError::NotConnected("c.value".to_string()));
        let err = res.context("disconnect").unwrap_err();
        assert!(matches!(err, CircuitError::WithContext { .. }));
    }
}
