//! Read-only schema model
//!
//! The schema model is the element graph the form builder walks: every global
//! element declaration expanded into [`SchemaNode`]s with their cardinality,
//! simple-type facets or ordered content groups. It is built once by the XSD
//! loader in [`parsing`] and never mutated afterwards.

mod facets;
mod parsing;
mod particles;

pub use facets::{InputKind, PatternFacet, SimpleFacets};
pub use particles::{parse_occurs, ContentGroup, ModelType, Occurs, Particle};

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{local_part, QName};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// XML Schema namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Simple or complex content of an element
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Text-only content constrained by facets
    Simple(SimpleFacets),
    /// Element content; `None` for an empty content model
    Complex(Option<Arc<ContentGroup>>),
}

/// An element declaration with its resolved type
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Qualified element name
    pub name: QName,
    /// Cardinality of this particle
    pub occurs: Occurs,
    /// Resolved content
    pub kind: NodeKind,
    /// Named type of the element, if not anonymous
    pub type_name: Option<QName>,
    /// `xs:documentation` text
    pub documentation: Option<String>,
    /// Schema default value
    pub default: Option<String>,
    /// Schema fixed value
    pub fixed: Option<String>,
}

impl SchemaNode {
    /// Create a mandatory, single-occurrence node
    pub fn new(name: QName, kind: NodeKind) -> Self {
        Self {
            name,
            occurs: Occurs::once(),
            kind,
            type_name: None,
            documentation: None,
            default: None,
            fixed: None,
        }
    }

    /// Set the occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Set the named type
    pub fn with_type_name(mut self, type_name: QName) -> Self {
        self.type_name = Some(type_name);
        self
    }

    /// Set the documentation
    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    /// Create a complex node from a content group
    pub fn complex(name: QName, group: ContentGroup) -> Self {
        Self::new(name, NodeKind::Complex(Some(Arc::new(group))))
    }

    /// Local element name
    pub fn local_name(&self) -> &str {
        &self.name.local_name
    }

    /// Minimum occurrences
    pub fn min_occurs(&self) -> u32 {
        self.occurs.min
    }

    /// Check for simple content
    pub fn is_simple(&self) -> bool {
        matches!(self.kind, NodeKind::Simple(_))
    }

    /// Facets of a simple node
    pub fn facets(&self) -> Option<&SimpleFacets> {
        match &self.kind {
            NodeKind::Simple(facets) => Some(facets),
            NodeKind::Complex(_) => None,
        }
    }

    /// Content group of a complex node
    pub fn content(&self) -> Option<&ContentGroup> {
        match &self.kind {
            NodeKind::Complex(Some(group)) => Some(group),
            _ => None,
        }
    }

    /// Find a child element particle by local name, looking through nested groups
    pub fn find_child(&self, local_name: &str) -> Option<&SchemaNode> {
        self.content()?
            .elements()
            .into_iter()
            .find(|node| node.local_name() == local_name)
    }
}

/// The loaded schema: global element declarations plus namespace metadata
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    /// Global elements in declaration order
    elements: IndexMap<QName, SchemaNode>,
    /// `(prefix, namespace)` declarations found on the schema documents
    prefixes: Vec<(String, String)>,
    /// Target namespaces of all loaded documents
    target_namespaces: Vec<String>,
    /// Files the model was loaded from, main document first
    sources: Vec<PathBuf>,
}

impl SchemaModel {
    /// Build a model from already resolved global elements
    pub fn from_elements(elements: impl IntoIterator<Item = SchemaNode>) -> Self {
        let mut model = Self::default();
        for node in elements {
            if let Some(ns) = &node.name.namespace {
                if !model.target_namespaces.contains(ns) {
                    model.target_namespaces.push(ns.clone());
                }
            }
            model.elements.insert(node.name.clone(), node);
        }
        model
    }

    /// Load an XSD file and everything it includes or imports
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with_limits(path, &Limits::default())
    }

    /// Load an XSD file with explicit resource limits
    pub fn from_file_with_limits(path: impl AsRef<Path>, limits: &Limits) -> Result<Self> {
        let model = parsing::load_schema(path.as_ref(), limits)?;
        log::info!(
            "Loaded schema {} ({} global elements)",
            path.as_ref().display(),
            model.elements.len()
        );
        Ok(model)
    }

    /// Load an XSD document from a string.
    ///
    /// Relative include/import locations resolve against the current directory.
    pub fn from_string(xsd: &str) -> Result<Self> {
        parsing::load_schema_str(xsd, &Limits::default())
    }

    /// Look up a global element by local name or Clark name
    pub fn element(&self, name: &str) -> Option<&SchemaNode> {
        if name.starts_with('{') {
            return self.elements.get(&QName::from_clark(name));
        }
        let local = local_part(name);
        self.elements.values().find(|node| node.local_name() == local)
    }

    /// Look up the global element a walk starts from
    pub fn root(&self, name: &str) -> Result<&SchemaNode> {
        self.element(name).ok_or_else(|| {
            Error::StructureMismatch(format!(
                "Could not find {} element definition in schema",
                name
            ))
        })
    }

    /// Iterate over global elements in declaration order
    pub fn elements(&self) -> impl Iterator<Item = &SchemaNode> {
        self.elements.values()
    }

    /// Number of global elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check whether the model declares no global elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// `(prefix, namespace)` declarations of the schema documents
    pub fn declared_prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Target namespaces of the loaded documents
    pub fn type_namespaces(&self) -> Vec<String> {
        self.target_namespaces.clone()
    }

    /// Files the model was loaded from
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Main schema file, if the model was loaded from disk
    pub fn main_source(&self) -> Option<&Path> {
        self.sources.first().map(PathBuf::as_path)
    }

    /// Visit every element node reachable from the global declarations.
    ///
    /// Shared content groups are visited once.
    pub fn visit_nodes(&self, visitor: &mut dyn FnMut(&SchemaNode)) {
        let mut seen = HashSet::new();
        for node in self.elements.values() {
            visit_node(node, visitor, &mut seen);
        }
    }
}

fn visit_node(
    node: &SchemaNode,
    visitor: &mut dyn FnMut(&SchemaNode),
    seen: &mut HashSet<*const ContentGroup>,
) {
    visitor(node);
    if let NodeKind::Complex(Some(group)) = &node.kind {
        if seen.insert(Arc::as_ptr(group)) {
            visit_group(group, visitor, seen);
        }
    }
}

fn visit_group(
    group: &ContentGroup,
    visitor: &mut dyn FnMut(&SchemaNode),
    seen: &mut HashSet<*const ContentGroup>,
) {
    for particle in &group.particles {
        match particle {
            Particle::Element(node) => visit_node(node, visitor, seen),
            Particle::Group(nested) => visit_group(nested, visitor, seen),
        }
    }
}
