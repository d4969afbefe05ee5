//! Resource loading utilities
//!
//! This module handles reading and writing of schemas, documents and
//! configuration files with size limits applied.

use crate::error::{Error, Result};
use crate::limits::Limits;
use std::fs;
use std::path::Path;

/// Resource loader for schemas, documents and configuration files
#[derive(Debug, Clone, Default)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Get the limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Load a resource as a string
    pub fn load(&self, path: &Path) -> Result<String> {
        let metadata = fs::metadata(path).map_err(|e| {
            Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
        })?;
        self.limits.check_file_size(metadata.len() as usize)?;

        fs::read_to_string(path).map_err(|e| {
            Error::Resource(format!("Failed to read file '{}': {}", path.display(), e))
        })
    }

    /// Load a resource as a string if it exists
    pub fn load_optional(&self, path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }
        self.load(path).map(Some)
    }

    /// Write a new resource, creating parent directories as needed
    pub fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, contents).map_err(|e| {
            Error::Resource(format!("Failed to write file '{}': {}", path.display(), e))
        })
    }
}
