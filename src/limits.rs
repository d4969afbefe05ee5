//! Limits and constraints for schema loading and form walking
//!
//! This module defines limits that protect against resource exhaustion:
//! oversized input files, deep include chains, recursive type definitions
//! and runaway repeated-element expansion.

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum size in bytes of any XML, schema or configuration file
    pub max_file_size: usize,

    /// Maximum include/import nesting depth
    pub max_schema_depth: usize,

    /// Maximum nesting of type definitions expanded into the schema model
    pub max_type_depth: usize,

    /// Maximum depth of the form walk
    pub max_walk_depth: usize,

    /// Maximum number of instances of a single repeated element
    pub max_instances: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024, // 100 MB
            max_schema_depth: 100,
            max_type_depth: 64,
            max_walk_depth: 256,
            max_instances: 1000,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10 MB
            max_schema_depth: 20,
            max_type_depth: 32,
            max_walk_depth: 64,
            max_instances: 100,
        }
    }

    /// Check if a file size is within limits
    pub fn check_file_size(&self, size: usize) -> Result<()> {
        if size > self.max_file_size {
            Err(Error::LimitExceeded(format!(
                "file size {} exceeds maximum {}",
                size, self.max_file_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if an include/import depth is within limits
    pub fn check_schema_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_schema_depth {
            Err(Error::LimitExceeded(format!(
                "schema include depth {} exceeds maximum {}",
                depth, self.max_schema_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a type expansion depth is within limits
    pub fn check_type_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_type_depth {
            Err(Error::LimitExceeded(format!(
                "type nesting depth {} exceeds maximum {}",
                depth, self.max_type_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a form walk depth is within limits
    pub fn check_walk_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_walk_depth {
            Err(Error::LimitExceeded(format!(
                "form depth {} exceeds maximum {}",
                depth, self.max_walk_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a repeated element instance count is within limits
    pub fn check_instances(&self, count: usize) -> Result<()> {
        if count > self.max_instances {
            Err(Error::LimitExceeded(format!(
                "{} instances exceed maximum {}",
                count, self.max_instances
            )))
        } else {
            Ok(())
        }
    }
}
