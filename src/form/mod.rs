//! Schema-driven form collection
//!
//! The [`FormTreeBuilder`] walks a schema element and asks a [`ValueCapture`]
//! collaborator for the value of every visible simple field. The result is a
//! [`FormTree`]: nested maps keyed by qualified element name, lists for
//! repeated elements, and strings at the leaves.

mod builder;
mod capture;
mod report;

pub use builder::FormTreeBuilder;
pub use capture::{DefaultsOnly, FieldPrompt, MapCapture, ValueCapture};
pub use report::{BuildReport, ExportRecord, ValueOrigin};

use crate::error::{Error, Result};
use crate::namespaces::local_part;
use crate::paths::{split_index, SEPARATOR};
use crate::schema::SchemaNode;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Collected form data
///
/// Omitted fields have no entry at all; a mapping never holds a null value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormTree {
    /// Text content of a simple element
    Scalar(String),
    /// Child elements keyed by qualified name, in schema order
    Map(IndexMap<String, FormTree>),
    /// Instances of a repeated element
    List(Vec<FormTree>),
}

/// Index at which a new entry for `name` keeps `map` in the order of `parent`'s particles
fn schema_position(parent: &SchemaNode, map: &IndexMap<String, FormTree>, name: &str) -> usize {
    let siblings: Vec<&str> = parent
        .content()
        .map(|group| group.elements().into_iter().map(SchemaNode::local_name).collect())
        .unwrap_or_default();
    let Some(rank) = siblings.iter().position(|s| *s == name) else {
        return map.len();
    };
    map.keys()
        .take_while(|key| {
            siblings
                .iter()
                .position(|s| *s == local_part(key))
                .map_or(true, |r| r < rank)
        })
        .count()
}

impl FormTree {
    /// Create a scalar
    pub fn scalar(value: impl Into<String>) -> Self {
        FormTree::Scalar(value.into())
    }

    /// Create an empty mapping
    pub fn map() -> Self {
        FormTree::Map(IndexMap::new())
    }

    /// Builder form of inserting a mapping entry; ignored for non-maps
    pub fn with_entry(mut self, key: impl Into<String>, value: FormTree) -> Self {
        if let FormTree::Map(map) = &mut self {
            map.insert(key.into(), value);
        }
        self
    }

    /// The scalar value, if this is a leaf
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FormTree::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// The mapping, if this is a composite
    pub fn as_map(&self) -> Option<&IndexMap<String, FormTree>> {
        match self {
            FormTree::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The instances, if this is a list
    pub fn as_list(&self) -> Option<&[FormTree]> {
        match self {
            FormTree::List(items) => Some(items),
            _ => None,
        }
    }

    /// Mapping entry by exact key or by local name
    pub fn get(&self, name: &str) -> Option<&FormTree> {
        let map = self.as_map()?;
        map.get(name)
            .or_else(|| map.iter().find(|(k, _)| local_part(k) == name).map(|(_, v)| v))
    }

    /// Look up a node by slash-separated path, e.g. `MDRUDIDIData[1]/identifier/DICode`.
    ///
    /// Segments match keys exactly or by local name. A segment without an index
    /// addresses the first instance of a list.
    pub fn get_path(&self, path: &str) -> Option<&FormTree> {
        let mut current = self;
        for segment in path.split(SEPARATOR).filter(|s| !s.is_empty()) {
            let (name, index) = split_index(segment);
            current = current.get(name)?;
            current = match (current, index) {
                (FormTree::List(items), i) => items.get(i.unwrap_or(0))?,
                (node, None | Some(0)) => node,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Replace the scalar at `path`.
    ///
    /// Every segment must already exist. Indexing past the end of a list, or
    /// walking through a scalar, is an error.
    pub fn set_path(&mut self, path: &str, value: impl Into<String>) -> Result<()> {
        self.set_path_with(None, path, value.into())
    }

    /// Set the scalar at `path`, creating missing entries from `schema`.
    ///
    /// `schema` is the element this tree was collected for. Created entries are
    /// keyed by the qualified name of the matching child particle; a segment
    /// the schema does not declare is a [`Error::StructureMismatch`].
    pub fn set_path_in(
        &mut self,
        schema: &SchemaNode,
        path: &str,
        value: impl Into<String>,
    ) -> Result<()> {
        self.set_path_with(Some(schema), path, value.into())
    }

    fn set_path_with(&mut self, schema: Option<&SchemaNode>, path: &str, value: String) -> Result<()> {
        let segments: Vec<&str> = path.split(SEPARATOR).filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Err(Error::StructureMismatch("Cannot set an empty path".to_string()));
        }

        let mut current = self;
        let mut node = schema;
        for segment in &segments {
            let (name, index) = split_index(segment);
            let FormTree::Map(map) = current else {
                return Err(Error::StructureMismatch(format!(
                    "Cannot set '{}': '{}' is not inside a mapping",
                    path, segment
                )));
            };
            let particle = node.and_then(|n| n.find_child(name));

            let existing = map
                .keys()
                .find(|k| *k == name || local_part(k) == name)
                .cloned();
            let key = match (existing, particle) {
                (Some(key), _) => key,
                (None, Some(particle)) if index.unwrap_or(0) == 0 => {
                    let key = particle.name.clark();
                    let position = node.map_or(map.len(), |n| schema_position(n, map, name));
                    map.shift_insert(position, key.clone(), FormTree::map());
                    key
                }
                (None, Some(_)) => {
                    return Err(Error::StructureMismatch(format!(
                        "Cannot set '{}': no instance {} of '{}'",
                        path,
                        index.unwrap_or(0),
                        name
                    )))
                }
                (None, None) => {
                    return Err(Error::StructureMismatch(format!(
                        "Cannot set '{}': no element '{}'",
                        path, name
                    )))
                }
            };
            node = particle;

            let entry = map
                .get_mut(&key)
                .ok_or_else(|| Error::StructureMismatch(format!("Cannot set '{}'", path)))?;
            current = match entry {
                FormTree::List(items) => {
                    let i = index.unwrap_or(0);
                    let len = items.len();
                    items.get_mut(i).ok_or_else(|| {
                        Error::StructureMismatch(format!(
                            "Cannot set '{}': '{}' has {} instances",
                            path, name, len
                        ))
                    })?
                }
                single if index.unwrap_or(0) == 0 => single,
                _ => {
                    return Err(Error::StructureMismatch(format!(
                        "Cannot set '{}': '{}' is not repeated",
                        path, name
                    )))
                }
            };
        }

        *current = FormTree::Scalar(value);
        Ok(())
    }

    /// Convert JSON into a tree, pruning nulls and empty containers.
    ///
    /// Numbers and booleans become their textual form. Returns `None` when
    /// nothing is left.
    pub fn from_json_value(value: Value) -> Option<FormTree> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(FormTree::Scalar(s)),
            Value::Bool(b) => Some(FormTree::Scalar(b.to_string())),
            Value::Number(n) => Some(FormTree::Scalar(n.to_string())),
            Value::Array(items) => {
                let items: Vec<FormTree> =
                    items.into_iter().filter_map(FormTree::from_json_value).collect();
                (!items.is_empty()).then_some(FormTree::List(items))
            }
            Value::Object(object) => {
                let map: IndexMap<String, FormTree> = object
                    .into_iter()
                    .filter_map(|(k, v)| FormTree::from_json_value(v).map(|v| (k, v)))
                    .collect();
                (!map.is_empty()).then_some(FormTree::Map(map))
            }
        }
    }

    /// Parse a JSON document into a tree
    pub fn from_json_str(json: &str) -> Result<Option<FormTree>> {
        let value: Value = serde_json::from_str(json)?;
        Ok(FormTree::from_json_value(value))
    }

    /// Serialize the tree as JSON
    pub fn to_json_string(&self, pretty: bool) -> Result<String> {
        Ok(if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn device_tree() -> FormTree {
        let udi = |code: &str| {
            FormTree::map().with_entry(
                "{urn:udidi}identifier",
                FormTree::map().with_entry("{urn:common}DICode", FormTree::scalar(code)),
            )
        };
        FormTree::map()
            .with_entry(
                "{urn:device}MDRBasicUDI",
                FormTree::map().with_entry("{urn:basic}model", FormTree::scalar("Test")),
            )
            .with_entry(
                "{urn:device}MDRUDIDIData",
                FormTree::List(vec![udi("0001"), udi("0002")]),
            )
    }

    #[test]
    fn test_get_path() {
        let tree = device_tree();
        assert_eq!(
            tree.get_path("MDRBasicUDI/model").and_then(FormTree::as_scalar),
            Some("Test")
        );
        assert_eq!(
            tree.get_path("MDRUDIDIData[1]/identifier/DICode")
                .and_then(FormTree::as_scalar),
            Some("0002")
        );
        assert_eq!(
            tree.get_path("MDRUDIDIData/identifier/DICode")
                .and_then(FormTree::as_scalar),
            Some("0001")
        );
        assert!(tree.get_path("MDRUDIDIData[2]").is_none());
        assert!(tree.get_path("MDRBasicUDI[1]").is_none());
    }

    #[test]
    fn test_set_path_replaces_existing() {
        let mut tree = device_tree();
        tree.set_path("MDRUDIDIData[1]/identifier/DICode", "9999").unwrap();
        assert_eq!(
            tree.get_path("MDRUDIDIData[1]/identifier/DICode")
                .and_then(FormTree::as_scalar),
            Some("9999")
        );
        let codes = tree.get("MDRUDIDIData").and_then(FormTree::as_list).unwrap();
        assert_eq!(
            codes[1].get_path("identifier").unwrap().as_map().unwrap().keys().next().unwrap(),
            "{urn:common}DICode"
        );
    }

    fn basic_udi_schema() -> SchemaNode {
        use crate::namespaces::QName;
        use crate::schema::{ContentGroup, ModelType, NodeKind, Occurs, Particle, SimpleFacets};

        let code = SchemaNode::new(
            QName::namespaced("urn:common", "DICode"),
            NodeKind::Simple(SimpleFacets::default()),
        );
        let identifier = SchemaNode::complex(
            QName::namespaced("urn:basic", "identifier"),
            ContentGroup::new(ModelType::Sequence, Occurs::once())
                .with_particle(Particle::Element(code)),
        );
        let basic = SchemaNode::complex(
            QName::namespaced("urn:device", "MDRBasicUDI"),
            ContentGroup::new(ModelType::Sequence, Occurs::once())
                .with_particle(Particle::Element(identifier)),
        );
        SchemaNode::complex(
            QName::namespaced("urn:device", "MDRDevice"),
            ContentGroup::new(ModelType::Sequence, Occurs::once())
                .with_particle(Particle::Element(basic)),
        )
    }

    #[test]
    fn test_set_path_in_creates_qualified_entries() {
        let schema = basic_udi_schema();
        let mut tree = device_tree();
        tree.set_path_in(&schema, "MDRBasicUDI/identifier/DICode", "ABC")
            .unwrap();
        assert_eq!(
            tree.get_path("MDRBasicUDI/identifier/DICode")
                .and_then(FormTree::as_scalar),
            Some("ABC")
        );

        let basic = tree.get("MDRBasicUDI").and_then(FormTree::as_map).unwrap();
        assert!(basic.contains_key("{urn:basic}identifier"));
        assert!(!basic.contains_key("identifier"));
        let identifier = basic.get("{urn:basic}identifier").and_then(FormTree::as_map).unwrap();
        assert!(identifier.contains_key("{urn:common}DICode"));
    }

    #[test]
    fn test_set_path_in_rejects_undeclared_segment() {
        let schema = basic_udi_schema();
        let mut tree = device_tree();
        assert!(matches!(
            tree.set_path_in(&schema, "MDRBasicUDI/serial/DICode", "ABC"),
            Err(Error::StructureMismatch(_))
        ));
    }

    #[test]
    fn test_set_path_does_not_create_entries() {
        let mut tree = device_tree();
        assert!(matches!(
            tree.set_path("MDRBasicUDI/identifier/DICode", "ABC"),
            Err(Error::StructureMismatch(_))
        ));
        assert!(tree.get_path("MDRBasicUDI/identifier").is_none());
    }

    #[test]
    fn test_set_path_errors() {
        let mut tree = device_tree();
        assert!(tree.set_path("MDRUDIDIData[5]/identifier/DICode", "x").is_err());
        assert!(tree.set_path("MDRBasicUDI/model/deeper", "x").is_err());
        assert!(tree.set_path("Missing[3]", "x").is_err());
        assert!(tree.set_path("", "x").is_err());
    }

    #[test]
    fn test_from_json_prunes_nulls() {
        let tree = FormTree::from_json_value(json!({
            "Code": "A",
            "Flag": true,
            "Count": 3,
            "Skipped": null,
            "Empty": {"Inner": null},
            "Items": [{"Text": "x"}, null]
        }))
        .unwrap();

        let map = tree.as_map().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["Code", "Flag", "Count", "Items"]);
        assert_eq!(tree.get("Flag").and_then(FormTree::as_scalar), Some("true"));
        assert_eq!(tree.get("Items").and_then(FormTree::as_list).unwrap().len(), 1);
        assert_eq!(FormTree::from_json_value(json!({"a": null})), None);
    }

    #[test]
    fn test_json_serialization() {
        let tree = FormTree::map().with_entry("Code", FormTree::scalar("A"));
        assert_eq!(tree.to_json_string(false).unwrap(), r#"{"Code":"A"}"#);
        assert_eq!(FormTree::from_json_str(r#"{"Code":"A"}"#).unwrap(), Some(tree));
    }
}
