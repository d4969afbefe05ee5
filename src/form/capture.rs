//! Value capture
//!
//! The form builder does not decide values itself. For every visible simple
//! field it hands a [`FieldPrompt`] to a [`ValueCapture`] implementation, which
//! may be an interactive front end, a values file ([`MapCapture`]) or nothing
//! but the configured defaults ([`DefaultsOnly`]).

use crate::error::Result;
use crate::paths::{normalize, FieldPath};
use crate::schema::{InputKind, SchemaNode};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Everything a front end needs to ask for one simple field
#[derive(Debug, Clone)]
pub struct FieldPrompt {
    /// Path of the field
    pub path: FieldPath,
    /// Display label (local element name)
    pub label: String,
    /// Qualified element name in Clark notation
    pub qualified_name: String,
    /// `Namespace: ...` line plus the constraint summary
    pub help: String,
    /// Constraint summary such as `Min Length: 1 | Max Length: 20`
    pub constraints: String,
    /// Schema documentation
    pub documentation: Option<String>,
    /// Allowed values; an optional field starts with an empty entry
    pub options: Vec<String>,
    /// Resolved default
    pub default: Option<String>,
    /// Maximum characters for free text
    pub max_chars: Option<usize>,
    /// Widget kind
    pub input_kind: InputKind,
    /// Whether the schema requires the field
    pub required: bool,
}

impl FieldPrompt {
    /// Describe a simple schema node at `path`
    pub fn for_node(node: &SchemaNode, path: &FieldPath, default: Option<&str>) -> Self {
        let required = node.occurs.is_mandatory();
        let (constraints, options, max_chars, input_kind) = match node.facets() {
            Some(facets) => {
                let input_kind = facets.input_kind();
                let mut options = facets.enumeration.clone();
                if !required && input_kind == InputKind::Select {
                    options.insert(0, String::new());
                }
                (
                    facets.constraint_summary(),
                    options,
                    facets.max_chars(),
                    input_kind,
                )
            }
            None => (String::new(), Vec::new(), None, InputKind::Text),
        };

        let qualified_name = node.name.clark();
        let mut help = format!("Namespace: {}", qualified_name);
        if !constraints.is_empty() {
            help.push_str("\nConstraints: ");
            help.push_str(&constraints);
        }

        Self {
            path: path.clone(),
            label: node.local_name().to_string(),
            qualified_name,
            help,
            constraints,
            documentation: node.documentation.clone(),
            options,
            default: default.map(str::to_string),
            max_chars,
            input_kind,
            required,
        }
    }
}

/// Supplies values, choice selections and instance counts during a walk
pub trait ValueCapture {
    /// Value for a simple field; `None` leaves the default in place
    fn capture(&mut self, prompt: &FieldPrompt) -> Option<String>;

    /// Branch of a mandatory choice at `path`, as an index into `options`
    fn choose_branch(&mut self, _path: &FieldPath, _options: &[String]) -> Option<usize> {
        None
    }

    /// Number of instances of a repeated element, given the configured suggestion
    fn instance_count(&mut self, _path: &FieldPath, suggested: usize) -> usize {
        suggested
    }
}

/// Capture that never supplies anything, so only defaults are used
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultsOnly;

impl ValueCapture for DefaultsOnly {
    fn capture(&mut self, _prompt: &FieldPrompt) -> Option<String> {
        None
    }
}

/// Values, branch choices and instance counts keyed by field path.
///
/// Lookups try the exact path first, then the normalized one, so
/// `MDRDevice/MDRUDIDIData/referenceNumber` answers for every instance. Can be
/// read from JSON:
///
/// ```json
/// {
///   "values": { "MDRDevice/MDRBasicUDI/riskClass": "CLASS_IIA" },
///   "choices": { "MDRDevice/MDRBasicUDI/deviceKind": "deviceType" },
///   "counts": { "MDRDevice/MDRUDIDIData": 2 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapCapture {
    /// Field values
    pub values: IndexMap<String, String>,
    /// Selected branch local name per choice path
    pub choices: IndexMap<String, String>,
    /// Instance count per repeated element path
    pub counts: IndexMap<String, usize>,
}

impl MapCapture {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a capture from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add a value
    pub fn with_value(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(path.into(), value.into());
        self
    }

    /// Add a choice selection
    pub fn with_choice(mut self, path: impl Into<String>, branch: impl Into<String>) -> Self {
        self.choices.insert(path.into(), branch.into());
        self
    }

    /// Add an instance count
    pub fn with_count(mut self, path: impl Into<String>, count: usize) -> Self {
        self.counts.insert(path.into(), count);
        self
    }
}

fn lookup<'a, V>(map: &'a IndexMap<String, V>, path: &FieldPath) -> Option<&'a V> {
    map.get(path.as_str())
        .or_else(|| map.get(&normalize(path.as_str())))
}

impl ValueCapture for MapCapture {
    fn capture(&mut self, prompt: &FieldPrompt) -> Option<String> {
        lookup(&self.values, &prompt.path).cloned()
    }

    fn choose_branch(&mut self, path: &FieldPath, options: &[String]) -> Option<usize> {
        let branch = lookup(&self.choices, path)?;
        options.iter().position(|option| option == branch)
    }

    fn instance_count(&mut self, path: &FieldPath, suggested: usize) -> usize {
        lookup(&self.counts, path).copied().unwrap_or(suggested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::QName;
    use crate::schema::{NodeKind, Occurs, PatternFacet, SimpleFacets};

    fn risk_class(occurs: Occurs) -> SchemaNode {
        let facets = SimpleFacets::builtin("string")
            .with_enumeration(vec!["CLASS_I".to_string(), "CLASS_IIA".to_string()]);
        SchemaNode::new(
            QName::namespaced("urn:basic", "riskClass"),
            NodeKind::Simple(facets),
        )
        .with_occurs(occurs)
        .with_documentation("Risk class of the device")
    }

    #[test]
    fn test_prompt_for_required_select() {
        let path = FieldPath::new("MDRDevice/MDRBasicUDI/riskClass");
        let prompt = FieldPrompt::for_node(&risk_class(Occurs::once()), &path, Some("CLASS_I"));

        assert_eq!(prompt.label, "riskClass");
        assert_eq!(prompt.help, "Namespace: {urn:basic}riskClass");
        assert_eq!(prompt.options, vec!["CLASS_I", "CLASS_IIA"]);
        assert_eq!(prompt.default.as_deref(), Some("CLASS_I"));
        assert_eq!(prompt.input_kind, InputKind::Select);
        assert_eq!(prompt.documentation.as_deref(), Some("Risk class of the device"));
        assert!(prompt.required);
    }

    #[test]
    fn test_prompt_for_optional_select_has_empty_option() {
        let path = FieldPath::new("A/riskClass");
        let prompt = FieldPrompt::for_node(&risk_class(Occurs::optional()), &path, None);
        assert_eq!(prompt.options, vec!["", "CLASS_I", "CLASS_IIA"]);
    }

    #[test]
    fn test_prompt_help_lists_constraints() {
        let facets = SimpleFacets {
            min_length: Some(1),
            max_length: Some(20),
            ..SimpleFacets::builtin("string")
        }
        .with_patterns(vec![PatternFacet::new("[A-Z]+").unwrap()]);
        let node = SchemaNode::new(QName::local("model"), NodeKind::Simple(facets));
        let prompt = FieldPrompt::for_node(&node, &FieldPath::new("model"), None);

        assert_eq!(
            prompt.help,
            "Namespace: model\nConstraints: Min Length: 1 | Max Length: 20 | Pattern required"
        );
        assert_eq!(prompt.max_chars, Some(20));
        assert_eq!(prompt.input_kind, InputKind::Text);
    }

    #[test]
    fn test_map_capture_lookup() {
        let mut capture = MapCapture::new()
            .with_value("R/Item/Code", "generic")
            .with_value("R/Item[1]/Code", "second")
            .with_choice("R/Choice", "B")
            .with_count("R/Item", 3);

        let node = SchemaNode::new(QName::local("Code"), NodeKind::Simple(SimpleFacets::default()));
        let first = FieldPrompt::for_node(&node, &FieldPath::new("R/Item[0]/Code"), None);
        let second = FieldPrompt::for_node(&node, &FieldPath::new("R/Item[1]/Code"), None);
        assert_eq!(capture.capture(&first).as_deref(), Some("generic"));
        assert_eq!(capture.capture(&second).as_deref(), Some("second"));

        let options = vec!["A".to_string(), "B".to_string()];
        assert_eq!(capture.choose_branch(&FieldPath::new("R/Choice"), &options), Some(1));
        assert_eq!(capture.choose_branch(&FieldPath::new("R/Other"), &options), None);
        assert_eq!(capture.instance_count(&FieldPath::new("R/Item"), 1), 3);
        assert_eq!(capture.instance_count(&FieldPath::new("R/Other"), 1), 1);
    }

    #[test]
    fn test_map_capture_from_json() {
        let capture = MapCapture::from_json_str(
            r#"{"values": {"A/B": "x"}, "counts": {"A/C": 2}}"#,
        )
        .unwrap();
        assert_eq!(capture.values.get("A/B").map(String::as_str), Some("x"));
        assert!(capture.choices.is_empty());
        assert_eq!(capture.counts.get("A/C"), Some(&2));
    }

    #[test]
    fn test_defaults_only() {
        let node = SchemaNode::new(QName::local("Code"), NodeKind::Simple(SimpleFacets::default()));
        let prompt = FieldPrompt::for_node(&node, &FieldPath::new("Code"), Some("A"));
        assert_eq!(DefaultsOnly.capture(&prompt), None);
        assert_eq!(DefaultsOnly.instance_count(&FieldPath::new("X"), 2), 2);
    }
}
