//! Per-run build report
//!
//! The walk records every value it resolves and every advisory validation
//! failure here, instead of in shared state.

use crate::error::FieldValidationError;
use crate::paths::FieldPath;
use serde::Serialize;

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueOrigin {
    /// Supplied by the value-capture collaborator
    Captured,
    /// Configured default for a visible field
    Default,
    /// Configured default carried through for a hidden field
    HiddenDefault,
}

/// One resolved simple field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRecord {
    /// Field path
    pub path: FieldPath,
    /// Display label
    pub label: String,
    /// Resolved value
    pub value: String,
    /// Source of the value
    pub origin: ValueOrigin,
}

/// Records and field errors accumulated during one walk
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    records: Vec<ExportRecord>,
    field_errors: Vec<FieldValidationError>,
}

impl BuildReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved value
    pub fn record(&mut self, path: &FieldPath, label: &str, value: &str, origin: ValueOrigin) {
        self.records.push(ExportRecord {
            path: path.clone(),
            label: label.to_string(),
            value: value.to_string(),
            origin,
        });
    }

    /// Record a field validation failure
    pub fn add_error(&mut self, error: FieldValidationError) {
        log::warn!("{}", error);
        self.field_errors.push(error);
    }

    /// Resolved values in walk order
    pub fn records(&self) -> &[ExportRecord] {
        &self.records
    }

    /// Field validation failures in walk order
    pub fn field_errors(&self) -> &[FieldValidationError] {
        &self.field_errors
    }

    /// Check for validation failures
    pub fn has_errors(&self) -> bool {
        !self.field_errors.is_empty()
    }

    /// Value recorded for a path, if any
    pub fn value_of(&self, path: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|r| r.path.as_str() == path)
            .map(|r| r.value.as_str())
    }

    /// Append another report
    pub fn merge(&mut self, other: BuildReport) {
        self.records.extend(other.records);
        self.field_errors.extend(other.field_errors);
    }
}
