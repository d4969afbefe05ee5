//! Simple type constraining facets
//!
//! The facets a simple type accumulates along its restriction chain, and
//! the advisory validation of captured values against them.

use crate::error::{Error, FieldValidationError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").unwrap());
static DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$").unwrap());
static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]{4,}-[0-9]{2}-[0-9]{2}(Z|[+-][0-9]{2}:[0-9]{2})?$").unwrap());

/// Built-in types whose lexical space is a signed or unsigned integer
const INTEGER_TYPES: &[&str] = &[
    "integer",
    "int",
    "long",
    "short",
    "byte",
    "nonNegativeInteger",
    "positiveInteger",
    "nonPositiveInteger",
    "negativeInteger",
    "unsignedLong",
    "unsignedInt",
    "unsignedShort",
    "unsignedByte",
];

/// How a value-capture collaborator should present a simple field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Single selection from the enumeration
    Select,
    /// Multiple selection from the enumeration, space-joined
    MultiSelect,
    /// `true` / `false` toggle
    Boolean,
    /// Free text, optionally length-capped
    Text,
}

/// Pattern facet using regular expressions.
///
/// XSD patterns match the whole value, so the compiled expression is anchored.
#[derive(Debug, Clone)]
pub struct PatternFacet {
    /// Pattern as written in the schema
    pub pattern: String,
    /// Compiled, anchored regex
    regex: Regex,
}

impl PatternFacet {
    /// Create a new pattern facet
    pub fn new(pattern: &str) -> Result<Self> {
        let translated = pattern
            .replace(r"\i", "[A-Za-z_:]")
            .replace(r"\c", r"[-._:A-Za-z0-9]");
        let regex = Regex::new(&format!("^(?:{})$", translated)).map_err(|e| {
            Error::SchemaLoad(format!("Invalid pattern '{}': {}", pattern, e))
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Check whether a value matches this pattern
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Facets of a simple type
#[derive(Debug, Clone, Default)]
pub struct SimpleFacets {
    /// Local name of the XSD built-in type at the root of the restriction chain
    pub primitive: Option<String>,
    /// Allowed values, in schema order (empty = unconstrained)
    pub enumeration: Vec<String>,
    /// Pattern facets per derivation step; a value must match one pattern of every step
    pub pattern_steps: Vec<Vec<PatternFacet>>,
    /// Exact length
    pub length: Option<usize>,
    /// Minimum length
    pub min_length: Option<usize>,
    /// Maximum length
    pub max_length: Option<usize>,
    /// Space-separated list type
    pub is_list: bool,
}

impl SimpleFacets {
    /// Facets of an XSD built-in type
    pub fn builtin(name: &str) -> Self {
        Self {
            primitive: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Add the enumeration of a restriction step.
    ///
    /// A step with its own enumeration replaces the inherited one.
    pub fn with_enumeration(mut self, values: Vec<String>) -> Self {
        if !values.is_empty() {
            self.enumeration = values;
        }
        self
    }

    /// Add the patterns of one restriction step
    pub fn with_patterns(mut self, patterns: Vec<PatternFacet>) -> Self {
        if !patterns.is_empty() {
            self.pattern_steps.push(patterns);
        }
        self
    }

    /// Check whether the type is boolean
    pub fn is_boolean(&self) -> bool {
        self.primitive.as_deref() == Some("boolean")
    }

    /// Check whether any pattern applies
    pub fn has_patterns(&self) -> bool {
        !self.pattern_steps.is_empty()
    }

    /// Widget kind for the value-capture collaborator
    pub fn input_kind(&self) -> InputKind {
        if !self.enumeration.is_empty() {
            if self.is_list {
                InputKind::MultiSelect
            } else {
                InputKind::Select
            }
        } else if self.is_boolean() {
            InputKind::Boolean
        } else {
            InputKind::Text
        }
    }

    /// Maximum number of characters for a free-text field
    pub fn max_chars(&self) -> Option<usize> {
        if self.is_list {
            return None;
        }
        self.length.or(self.max_length)
    }

    /// Human-readable constraint summary, e.g. `Min Length: 1 | Max Length: 20`
    pub fn constraint_summary(&self) -> String {
        let mut constraints = Vec::new();
        if let Some(length) = self.length {
            constraints.push(format!("Length: {}", length));
        }
        if let Some(min) = self.min_length {
            constraints.push(format!("Min Length: {}", min));
        }
        if let Some(max) = self.max_length {
            constraints.push(format!("Max Length: {}", max));
        }
        if self.has_patterns() {
            constraints.push("Pattern required".to_string());
        }
        if self.is_list {
            constraints.push("Space-separated list".to_string());
        }
        constraints.join(" | ")
    }

    /// Validate a value against these facets
    pub fn validate(&self, value: &str) -> std::result::Result<(), FieldValidationError> {
        if self.is_list {
            let items: Vec<&str> = value.split_whitespace().collect();
            self.check_length(items.len(), value, "items")?;
            for item in items {
                self.check_item(item)?;
            }
            Ok(())
        } else {
            self.check_length(value.chars().count(), value, "characters")?;
            self.check_item(value)
        }
    }

    fn check_length(
        &self,
        len: usize,
        value: &str,
        unit: &str,
    ) -> std::result::Result<(), FieldValidationError> {
        if let Some(length) = self.length {
            if len != length {
                return Err(FieldValidationError::new(format!(
                    "Length must be exactly {} {}",
                    length, unit
                ))
                .with_reason(format!("Actual length: {}", len))
                .with_value(value));
            }
        }
        if let Some(min) = self.min_length {
            if len < min {
                return Err(FieldValidationError::new(format!(
                    "Length must be at least {} {}",
                    min, unit
                ))
                .with_reason(format!("Actual length: {}", len))
                .with_value(value));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(FieldValidationError::new(format!(
                    "Length must be at most {} {}",
                    max, unit
                ))
                .with_reason(format!("Actual length: {}", len))
                .with_value(value));
            }
        }
        Ok(())
    }

    fn check_item(&self, item: &str) -> std::result::Result<(), FieldValidationError> {
        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| e == item) {
            return Err(FieldValidationError::new("Value is not in the enumeration")
                .with_reason(format!("Allowed values: {}", self.enumeration.join(", ")))
                .with_value(item));
        }

        for step in &self.pattern_steps {
            if !step.iter().any(|p| p.is_match(item)) {
                let patterns: Vec<&str> = step.iter().map(|p| p.pattern.as_str()).collect();
                return Err(FieldValidationError::new(format!(
                    "Value does not match pattern '{}'",
                    patterns.join("' or '")
                ))
                .with_value(item));
            }
        }

        self.check_lexical(item)
    }

    fn check_lexical(&self, item: &str) -> std::result::Result<(), FieldValidationError> {
        let Some(primitive) = self.primitive.as_deref() else {
            return Ok(());
        };
        let valid = match primitive {
            "boolean" => matches!(item, "true" | "false" | "1" | "0"),
            "decimal" => DECIMAL.is_match(item),
            "date" => DATE.is_match(item),
            name if INTEGER_TYPES.contains(&name) => INTEGER.is_match(item),
            _ => true,
        };
        if valid {
            Ok(())
        } else {
            Err(
                FieldValidationError::new(format!("Value is not a valid xs:{}", primitive))
                    .with_value(item),
            )
        }
    }
}
