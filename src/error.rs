//! Error types for eudamed-xml
//!
//! This module defines all error types used throughout the library.
//! Structural and schema errors are fatal for a run; field validation
//! errors are collected per field and reported alongside the data.

use std::fmt;
use thiserror::Error;

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for eudamed-xml operations
#[derive(Error, Debug)]
pub enum Error {
    /// Schema source missing or unparsable
    #[error("schema load error: {0}")]
    SchemaLoad(String),

    /// Checksum input has a length outside the accepted range
    #[error("invalid length {length} (must be {min}-{max})")]
    InvalidLength {
        /// Actual input length
        length: usize,
        /// Minimum accepted length
        min: usize,
        /// Maximum accepted length
        max: usize,
    },

    /// Checksum input contains a character outside the encodable set
    #[error("invalid character {character:?} at position {position}")]
    InvalidCharacter {
        /// The offending character
        character: char,
        /// Zero-based position in the input
        position: usize,
    },

    /// A captured value violates its simple type constraints
    #[error("field validation error: {0}")]
    FieldValidation(#[from] FieldValidationError),

    /// Expected substructure absent from the loaded schema or document
    #[error("structure mismatch: {0}")]
    StructureMismatch(String),

    /// Identifier source collaborator failure (message kept verbatim)
    #[error("{0}")]
    ExternalSource(String),

    /// Namespace error (unknown or ambiguous element name)
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Resource loading error
    #[error("resource error: {0}")]
    Resource(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// XML parsing or writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// A captured scalar that fails its schema simple-type constraints
#[derive(Debug, Clone, PartialEq)]
pub struct FieldValidationError {
    /// Error message
    pub message: String,
    /// Path of the field that failed validation
    pub path: Option<String>,
    /// The rejected value
    pub value: Option<String>,
    /// Constraint that was violated
    pub reason: Option<String>,
}

impl FieldValidationError {
    /// Create a new field validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            value: None,
            reason: None,
        }
    }

    /// Set the path where validation failed
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the rejected value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for FieldValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref reason) = self.reason {
            write!(f, "\n\nReason: {}", reason)?;
        }

        if let Some(ref path) = self.path {
            write!(f, "\n\nPath: {}", path)?;
        }

        if let Some(ref value) = self.value {
            write!(f, "\n\nValue: {:?}", value)?;
        }

        Ok(())
    }
}

impl std::error::Error for FieldValidationError {}
