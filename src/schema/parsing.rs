//! XSD Document Parsing
//!
//! Loading happens in two phases. The first collects the text of every schema
//! document reachable through `xs:include`, `xs:redefine` and `xs:import`
//! (iterative worklist, each file loaded once). The second parses all of them
//! with roxmltree, indexes the global components and expands every global
//! element into a [`SchemaNode`] tree.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use roxmltree::Node;

use super::facets::{PatternFacet, SimpleFacets};
use super::particles::{parse_occurs, ContentGroup, ModelType, Occurs, Particle};
use super::{NodeKind, SchemaModel, SchemaNode, XSD_NAMESPACE};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::namespaces::QName;

/// XSD element local names
mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const GROUP: &str = "group";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const ANNOTATION: &str = "annotation";
    pub const DOCUMENTATION: &str = "documentation";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const REDEFINE: &str = "redefine";
    pub const RESTRICTION: &str = "restriction";
    pub const EXTENSION: &str = "extension";
    pub const LIST: &str = "list";
    pub const UNION: &str = "union";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
    pub const ANY: &str = "any";
    // Facets
    pub const PATTERN: &str = "pattern";
    pub const ENUMERATION: &str = "enumeration";
    pub const MIN_LENGTH: &str = "minLength";
    pub const MAX_LENGTH: &str = "maxLength";
    pub const LENGTH: &str = "length";
}

/// XSD attribute names
mod xsd_attrs {
    pub const NAME: &str = "name";
    pub const TYPE: &str = "type";
    pub const REF: &str = "ref";
    pub const BASE: &str = "base";
    pub const VALUE: &str = "value";
    pub const FORM: &str = "form";
    pub const DEFAULT: &str = "default";
    pub const FIXED: &str = "fixed";
    pub const ITEM_TYPE: &str = "itemType";
    pub const MEMBER_TYPES: &str = "memberTypes";
    pub const MIN_OCCURS: &str = "minOccurs";
    pub const MAX_OCCURS: &str = "maxOccurs";
    pub const NAMESPACE: &str = "namespace";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const TARGET_NAMESPACE: &str = "targetNamespace";
    pub const ELEMENT_FORM_DEFAULT: &str = "elementFormDefault";
}

use xsd_attrs as attrs;
use xsd_elements as tags;

/// Pending schema work item for iterative processing
struct PendingSchemaWork {
    /// Path to the schema file
    path: PathBuf,
    /// Schema text when the document is not read from disk
    inline: Option<String>,
    /// Including document's namespace (for chameleon include handling)
    parent_namespace: Option<String>,
    /// Include/import nesting depth
    depth: usize,
}

/// A collected schema document
struct SchemaSource {
    path: PathBuf,
    text: String,
    inline: bool,
    /// Effective target namespace (inherited for chameleon includes)
    target_namespace: Option<String>,
    /// Document has no namespace of its own and adopts the includer's
    chameleon: bool,
}

/// Load a schema file and all documents it references
pub(super) fn load_schema(path: &Path, limits: &Limits) -> Result<SchemaModel> {
    let sources = collect_sources(
        PendingSchemaWork {
            path: path.to_path_buf(),
            inline: None,
            parent_namespace: None,
            depth: 0,
        },
        limits,
    )?;
    build_model(&sources, limits)
}

/// Load a schema from a string; references resolve against the current directory
pub(super) fn load_schema_str(xsd: &str, limits: &Limits) -> Result<SchemaModel> {
    let sources = collect_sources(
        PendingSchemaWork {
            path: PathBuf::from("<string>"),
            inline: Some(xsd.to_string()),
            parent_namespace: None,
            depth: 0,
        },
        limits,
    )?;
    build_model(&sources, limits)
}

fn is_xsd(node: &Node, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(XSD_NAMESPACE)
        && node.tag_name().name() == local_name
}

fn xsd_children<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|c| c.is_element() && c.tag_name().namespace() == Some(XSD_NAMESPACE))
}

fn xsd_child<'a, 'input>(node: Node<'a, 'input>, local_name: &str) -> Option<Node<'a, 'input>> {
    xsd_children(node).find(|c| c.tag_name().name() == local_name)
}

fn parse_document<'input>(path: &Path, text: &'input str) -> Result<roxmltree::Document<'input>> {
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| Error::SchemaLoad(format!("{}: {}", path.display(), e)))?;
    if !is_xsd(&doc.root_element(), tags::SCHEMA) {
        return Err(Error::SchemaLoad(format!(
            "{}: root element is not xs:schema",
            path.display()
        )));
    }
    Ok(doc)
}

/// Resolve a schemaLocation relative to the referencing document
fn resolve_schema_location(location: &str, referencing: &Path) -> PathBuf {
    let location_path = Path::new(location);
    if location_path.is_absolute() {
        return location_path.to_path_buf();
    }
    match referencing.parent() {
        Some(base) => base.join(location),
        None => location_path.to_path_buf(),
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Phase one: gather the text of every reachable schema document
fn collect_sources(first: PendingSchemaWork, limits: &Limits) -> Result<Vec<SchemaSource>> {
    let loader = Loader::new().with_limits(limits.clone());
    let mut loaded_paths = HashSet::new();
    let mut pending = VecDeque::from([first]);
    let mut sources = Vec::new();

    while let Some(work) = pending.pop_front() {
        limits.check_schema_depth(work.depth)?;

        let key = work
            .path
            .canonicalize()
            .unwrap_or_else(|_| work.path.clone());
        if !loaded_paths.insert(key) {
            continue;
        }

        let inline = work.inline.is_some();
        let text = match work.inline {
            Some(text) => text,
            None => loader.load(&work.path).map_err(|e| match e {
                Error::Resource(msg) => Error::SchemaLoad(msg),
                other => other,
            })?,
        };

        let (own_namespace, references) = {
            let doc = parse_document(&work.path, &text)?;
            let root = doc.root_element();
            let own_namespace = root.attribute(attrs::TARGET_NAMESPACE).map(String::from);
            let effective = own_namespace
                .clone()
                .or_else(|| work.parent_namespace.clone());

            let mut references = Vec::new();
            for child in xsd_children(root) {
                let location = child.attribute(attrs::SCHEMA_LOCATION);
                match child.tag_name().name() {
                    tags::INCLUDE | tags::REDEFINE => {
                        if let Some(location) = location {
                            references.push((location.to_string(), effective.clone()));
                        }
                    }
                    tags::IMPORT => match location {
                        Some(location) if is_remote(location) => {
                            log::warn!("Skipping remote import {}", location);
                        }
                        Some(location) => references.push((location.to_string(), None)),
                        None => log::debug!(
                            "Import of {} has no schemaLocation",
                            child.attribute(attrs::NAMESPACE).unwrap_or("(no namespace)")
                        ),
                    },
                    _ => {}
                }
            }
            (own_namespace, references)
        };

        for (location, parent_namespace) in references {
            pending.push_back(PendingSchemaWork {
                path: resolve_schema_location(&location, &work.path),
                inline: None,
                parent_namespace,
                depth: work.depth + 1,
            });
        }

        log::debug!("Collected schema document {}", work.path.display());
        let chameleon = own_namespace.is_none() && work.parent_namespace.is_some();
        sources.push(SchemaSource {
            path: work.path,
            text,
            inline,
            target_namespace: own_namespace.or(work.parent_namespace),
            chameleon,
        });
    }

    Ok(sources)
}

/// Phase two: resolve all global elements of the collected documents
fn build_model(sources: &[SchemaSource], limits: &Limits) -> Result<SchemaModel> {
    let docs = sources
        .iter()
        .map(|s| parse_document(&s.path, &s.text))
        .collect::<Result<Vec<_>>>()?;

    let mut resolver = Resolver::new(sources, &docs, limits);
    let names: Vec<QName> = resolver.elements.keys().cloned().collect();

    let mut model = SchemaModel::default();
    for name in names {
        let node = resolver.global_element(&name)?;
        model.elements.insert(name, node);
    }

    for (source, doc) in sources.iter().zip(&docs) {
        if let Some(ns) = &source.target_namespace {
            if !model.target_namespaces.contains(ns) {
                model.target_namespaces.push(ns.clone());
            }
        }
        for namespace in doc.root_element().namespaces() {
            if let Some(prefix) = namespace.name() {
                let entry = (prefix.to_string(), namespace.uri().to_string());
                if namespace.uri() != XSD_NAMESPACE && !model.prefixes.contains(&entry) {
                    model.prefixes.push(entry);
                }
            }
        }
        if !source.inline {
            model.sources.push(source.path.clone());
        }
    }

    Ok(model)
}

/// A schema node together with the index of its document
#[derive(Clone, Copy)]
struct Located<'a, 'input> {
    node: Node<'a, 'input>,
    doc: usize,
}

impl<'a, 'input> Located<'a, 'input> {
    fn with(self, node: Node<'a, 'input>) -> Self {
        Self { node, doc: self.doc }
    }
}

/// Per-document settings
struct DocInfo {
    target_namespace: Option<String>,
    chameleon: bool,
    qualified_elements: bool,
}

/// Expands global components into schema nodes
struct Resolver<'a, 'input> {
    info: Vec<DocInfo>,
    limits: &'a Limits,
    elements: IndexMap<QName, Located<'a, 'input>>,
    complex_types: HashMap<QName, Located<'a, 'input>>,
    simple_types: HashMap<QName, Located<'a, 'input>>,
    groups: HashMap<QName, Located<'a, 'input>>,
    element_cache: HashMap<QName, SchemaNode>,
    type_cache: HashMap<QName, NodeKind>,
    element_stack: Vec<QName>,
    type_stack: Vec<QName>,
    /// Number of recursive references cut so far
    truncations: usize,
}

impl<'a, 'input> Resolver<'a, 'input> {
    fn new(
        sources: &[SchemaSource],
        docs: &'a [roxmltree::Document<'input>],
        limits: &'a Limits,
    ) -> Self {
        let mut resolver = Self {
            info: Vec::with_capacity(docs.len()),
            limits,
            elements: IndexMap::new(),
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
            groups: HashMap::new(),
            element_cache: HashMap::new(),
            type_cache: HashMap::new(),
            element_stack: Vec::new(),
            type_stack: Vec::new(),
            truncations: 0,
        };

        for (index, (source, doc)) in sources.iter().zip(docs).enumerate() {
            let root = doc.root_element();
            resolver.info.push(DocInfo {
                target_namespace: source.target_namespace.clone(),
                chameleon: source.chameleon,
                qualified_elements: root.attribute(attrs::ELEMENT_FORM_DEFAULT)
                    == Some("qualified"),
            });

            for child in xsd_children(root) {
                let Some(name) = child.attribute(attrs::NAME) else {
                    continue;
                };
                let qname = QName::new(source.target_namespace.clone(), name);
                let located = Located {
                    node: child,
                    doc: index,
                };
                let map = match child.tag_name().name() {
                    tags::ELEMENT => {
                        resolver.elements.entry(qname).or_insert(located);
                        continue;
                    }
                    tags::COMPLEX_TYPE => &mut resolver.complex_types,
                    tags::SIMPLE_TYPE => &mut resolver.simple_types,
                    tags::GROUP => &mut resolver.groups,
                    _ => continue,
                };
                map.entry(qname).or_insert(located);
            }
        }

        resolver
    }

    /// Resolve a QName-valued attribute in the scope of its node
    fn qname_attr(&self, at: Located<'a, 'input>, value: &str) -> Result<QName> {
        let value = value.trim();
        match value.split_once(':') {
            Some((prefix, local)) => {
                let ns = at.node.lookup_namespace_uri(Some(prefix)).ok_or_else(|| {
                    Error::SchemaLoad(format!("Unknown prefix '{}' in '{}'", prefix, value))
                })?;
                Ok(QName::namespaced(ns, local))
            }
            None => {
                let info = &self.info[at.doc];
                let ns = match at.node.lookup_namespace_uri(None) {
                    Some(ns) if !ns.is_empty() => Some(ns.to_string()),
                    _ if info.chameleon => info.target_namespace.clone(),
                    _ => None,
                };
                Ok(QName::new(ns, value))
            }
        }
    }

    fn check_depth(&self) -> Result<()> {
        self.limits
            .check_type_depth(self.element_stack.len() + self.type_stack.len())
    }

    /// Expand a global element declaration (cached)
    fn global_element(&mut self, qname: &QName) -> Result<SchemaNode> {
        if let Some(node) = self.element_cache.get(qname) {
            return Ok(node.clone());
        }
        let at = *self
            .elements
            .get(qname)
            .ok_or_else(|| Error::SchemaLoad(format!("Unknown element {}", qname)))?;

        if self.element_stack.contains(qname) {
            log::warn!("Recursive element {} truncated", qname);
            self.truncations += 1;
            return Ok(SchemaNode::new(qname.clone(), NodeKind::Complex(None)));
        }

        self.element_stack.push(qname.clone());
        let before = self.truncations;
        let result = self.element_decl(at, qname.clone(), Occurs::once());
        self.element_stack.pop();

        let node = result?;
        if self.truncations == before {
            self.element_cache.insert(qname.clone(), node.clone());
        }
        Ok(node)
    }

    /// Expand a local element particle (declaration or reference)
    fn element_particle(&mut self, at: Located<'a, 'input>) -> Result<SchemaNode> {
        let occurs = parse_occurs(
            at.node.attribute(attrs::MIN_OCCURS),
            at.node.attribute(attrs::MAX_OCCURS),
        )?;

        if let Some(reference) = at.node.attribute(attrs::REF) {
            let qname = self.qname_attr(at, reference)?;
            let mut node = self.global_element(&qname)?.with_occurs(occurs);
            if let Some(doc) = documentation(at.node) {
                node.documentation = Some(doc);
            }
            return Ok(node);
        }

        let name = at.node.attribute(attrs::NAME).ok_or_else(|| {
            Error::SchemaLoad("Local element has neither name nor ref".to_string())
        })?;
        let info = &self.info[at.doc];
        let qualified = match at.node.attribute(attrs::FORM) {
            Some(form) => form == "qualified",
            None => info.qualified_elements,
        };
        let namespace = if qualified {
            info.target_namespace.clone()
        } else {
            None
        };
        self.element_decl(at, QName::new(namespace, name), occurs)
    }

    fn element_decl(
        &mut self,
        at: Located<'a, 'input>,
        name: QName,
        occurs: Occurs,
    ) -> Result<SchemaNode> {
        self.check_depth()?;

        let mut type_name = None;
        let kind = if let Some(type_attr) = at.node.attribute(attrs::TYPE) {
            let qname = self.qname_attr(at, type_attr)?;
            let kind = self.named_type(&qname)?;
            type_name = Some(qname);
            kind
        } else if let Some(ct) = xsd_child(at.node, tags::COMPLEX_TYPE) {
            self.complex_type(at.with(ct))?
        } else if let Some(st) = xsd_child(at.node, tags::SIMPLE_TYPE) {
            NodeKind::Simple(self.simple_type(at.with(st))?)
        } else {
            log::debug!("Element {} has no type, treating as text", name);
            NodeKind::Simple(SimpleFacets::builtin("anySimpleType"))
        };

        Ok(SchemaNode {
            name,
            occurs,
            kind,
            type_name,
            documentation: documentation(at.node),
            default: at.node.attribute(attrs::DEFAULT).map(String::from),
            fixed: at.node.attribute(attrs::FIXED).map(String::from),
        })
    }

    /// Resolve a named type (cached, recursion-safe)
    fn named_type(&mut self, qname: &QName) -> Result<NodeKind> {
        if qname.namespace.as_deref() == Some(XSD_NAMESPACE) {
            return Ok(builtin_kind(&qname.local_name));
        }
        if let Some(kind) = self.type_cache.get(qname) {
            return Ok(kind.clone());
        }
        if self.type_stack.contains(qname) {
            log::warn!("Recursive type {} truncated", qname);
            self.truncations += 1;
            return Ok(NodeKind::Complex(None));
        }

        let (at, is_complex) = if let Some(at) = self.complex_types.get(qname) {
            (*at, true)
        } else if let Some(at) = self.simple_types.get(qname) {
            (*at, false)
        } else {
            return Err(Error::SchemaLoad(format!("Unknown type {}", qname)));
        };

        self.type_stack.push(qname.clone());
        let before = self.truncations;
        let result = if is_complex {
            self.complex_type(at)
        } else {
            self.simple_type(at).map(NodeKind::Simple)
        };
        self.type_stack.pop();

        let kind = result?;
        if self.truncations == before {
            self.type_cache.insert(qname.clone(), kind.clone());
        }
        Ok(kind)
    }

    fn complex_type(&mut self, at: Located<'a, 'input>) -> Result<NodeKind> {
        for child in xsd_children(at.node) {
            match child.tag_name().name() {
                tags::SIMPLE_CONTENT => {
                    return self.simple_content(at.with(child)).map(NodeKind::Simple)
                }
                tags::COMPLEX_CONTENT => return self.complex_content(at.with(child)),
                tags::SEQUENCE | tags::CHOICE | tags::ALL => {
                    return Ok(complex_kind(Some(self.model_group(at.with(child))?)))
                }
                tags::GROUP => return Ok(complex_kind(Some(self.group_ref(at.with(child))?))),
                _ => {}
            }
        }
        Ok(NodeKind::Complex(None))
    }

    /// Text content of a complex type with simple content; attributes are not collected
    fn simple_content(&mut self, at: Located<'a, 'input>) -> Result<SimpleFacets> {
        let Some(derivation) = xsd_children(at.node).find(|c| {
            matches!(c.tag_name().name(), tags::EXTENSION | tags::RESTRICTION)
        }) else {
            return Ok(SimpleFacets::default());
        };

        let base = match derivation.attribute(attrs::BASE) {
            Some(base) => {
                let qname = self.qname_attr(at, base)?;
                match self.named_type(&qname)? {
                    NodeKind::Simple(facets) => facets,
                    NodeKind::Complex(_) => SimpleFacets::default(),
                }
            }
            None => SimpleFacets::default(),
        };

        if derivation.tag_name().name() == tags::RESTRICTION {
            self.apply_facets(at.with(derivation), base)
        } else {
            Ok(base)
        }
    }

    fn complex_content(&mut self, at: Located<'a, 'input>) -> Result<NodeKind> {
        let Some(derivation) = xsd_children(at.node).find(|c| {
            matches!(c.tag_name().name(), tags::EXTENSION | tags::RESTRICTION)
        }) else {
            return Ok(NodeKind::Complex(None));
        };

        let own = self.content_model(at.with(derivation))?;
        if derivation.tag_name().name() == tags::RESTRICTION {
            return Ok(complex_kind(own));
        }

        let base = match derivation.attribute(attrs::BASE) {
            Some(base) => {
                let qname = self.qname_attr(at, base)?;
                match self.named_type(&qname)? {
                    NodeKind::Complex(group) => group,
                    NodeKind::Simple(_) => None,
                }
            }
            None => None,
        };

        Ok(match (base, own) {
            (Some(base), None) => NodeKind::Complex(Some(base)),
            (Some(base), Some(own)) => complex_kind(Some(
                ContentGroup::new(ModelType::Sequence, Occurs::once())
                    .with_particle(Particle::Group((*base).clone()))
                    .with_particle(Particle::Group(own)),
            )),
            (None, own) => complex_kind(own),
        })
    }

    /// The sequence/choice/all/group child of a type or derivation, if any
    fn content_model(&mut self, at: Located<'a, 'input>) -> Result<Option<ContentGroup>> {
        for child in xsd_children(at.node) {
            match child.tag_name().name() {
                tags::SEQUENCE | tags::CHOICE | tags::ALL => {
                    return self.model_group(at.with(child)).map(Some)
                }
                tags::GROUP => return self.group_ref(at.with(child)).map(Some),
                _ => {}
            }
        }
        Ok(None)
    }

    fn model_group(&mut self, at: Located<'a, 'input>) -> Result<ContentGroup> {
        let model = ModelType::from_tag(at.node.tag_name().name()).ok_or_else(|| {
            Error::SchemaLoad(format!(
                "'{}' is not a content model",
                at.node.tag_name().name()
            ))
        })?;
        let occurs = parse_occurs(
            at.node.attribute(attrs::MIN_OCCURS),
            at.node.attribute(attrs::MAX_OCCURS),
        )?;

        let mut group = ContentGroup::new(model, occurs);
        for child in xsd_children(at.node) {
            match child.tag_name().name() {
                tags::ELEMENT => {
                    let node = self.element_particle(at.with(child))?;
                    group.particles.push(Particle::Element(node));
                }
                tags::SEQUENCE | tags::CHOICE | tags::ALL => {
                    let nested = self.model_group(at.with(child))?;
                    group.particles.push(Particle::Group(nested));
                }
                tags::GROUP => {
                    let nested = self.group_ref(at.with(child))?;
                    group.particles.push(Particle::Group(nested));
                }
                tags::ANY => log::debug!("Skipping xs:any wildcard"),
                _ => {}
            }
        }
        Ok(group)
    }

    fn group_ref(&mut self, at: Located<'a, 'input>) -> Result<ContentGroup> {
        let reference = at.node.attribute(attrs::REF).ok_or_else(|| {
            Error::SchemaLoad("Group reference without ref attribute".to_string())
        })?;
        let qname = self.qname_attr(at, reference)?;
        let def = *self
            .groups
            .get(&qname)
            .ok_or_else(|| Error::SchemaLoad(format!("Unknown group {}", qname)))?;

        let model_node = xsd_children(def.node)
            .find(|c| ModelType::from_tag(c.tag_name().name()).is_some())
            .ok_or_else(|| Error::SchemaLoad(format!("Group {} has no content model", qname)))?;

        let mut group = self.model_group(def.with(model_node))?;
        group.occurs = parse_occurs(
            at.node.attribute(attrs::MIN_OCCURS),
            at.node.attribute(attrs::MAX_OCCURS),
        )?;
        Ok(group)
    }

    fn simple_type(&mut self, at: Located<'a, 'input>) -> Result<SimpleFacets> {
        for child in xsd_children(at.node) {
            match child.tag_name().name() {
                tags::RESTRICTION => return self.simple_restriction(at.with(child)),
                tags::LIST => return self.simple_list(at.with(child)),
                tags::UNION => return self.simple_union(at.with(child)),
                _ => {}
            }
        }
        Err(Error::SchemaLoad(
            "simpleType without restriction, list or union".to_string(),
        ))
    }

    /// Facets of a named or inline simple type reference
    fn simple_base(
        &mut self,
        at: Located<'a, 'input>,
        type_attr: Option<&str>,
    ) -> Result<SimpleFacets> {
        if let Some(base) = type_attr {
            let qname = self.qname_attr(at, base)?;
            return match self.named_type(&qname)? {
                NodeKind::Simple(facets) => Ok(facets),
                NodeKind::Complex(_) => Err(Error::SchemaLoad(format!(
                    "Simple type derives from complex type {}",
                    qname
                ))),
            };
        }
        match xsd_child(at.node, tags::SIMPLE_TYPE) {
            Some(inline) => self.simple_type(at.with(inline)),
            None => Ok(SimpleFacets::builtin("string")),
        }
    }

    fn simple_restriction(&mut self, at: Located<'a, 'input>) -> Result<SimpleFacets> {
        let base = self.simple_base(at, at.node.attribute(attrs::BASE))?;
        self.apply_facets(at, base)
    }

    fn simple_list(&mut self, at: Located<'a, 'input>) -> Result<SimpleFacets> {
        let item = self.simple_base(at, at.node.attribute(attrs::ITEM_TYPE))?;
        Ok(SimpleFacets {
            primitive: item.primitive,
            enumeration: item.enumeration,
            pattern_steps: item.pattern_steps,
            is_list: true,
            ..Default::default()
        })
    }

    fn simple_union(&mut self, at: Located<'a, 'input>) -> Result<SimpleFacets> {
        let mut members = Vec::new();
        if let Some(member_types) = at.node.attribute(attrs::MEMBER_TYPES) {
            for member in member_types.split_whitespace() {
                members.push(self.simple_base(at, Some(member))?);
            }
        }
        for inline in xsd_children(at.node).filter(|c| c.tag_name().name() == tags::SIMPLE_TYPE) {
            members.push(self.simple_type(at.with(inline))?);
        }

        let mut facets = SimpleFacets::default();
        if !members.is_empty() && members.iter().all(|m| !m.enumeration.is_empty()) {
            for value in members.iter().flat_map(|m| m.enumeration.iter()) {
                if !facets.enumeration.contains(value) {
                    facets.enumeration.push(value.clone());
                }
            }
        }
        if let Some(first) = members.first() {
            if members.iter().all(|m| m.primitive == first.primitive) {
                facets.primitive = first.primitive.clone();
            }
        }
        Ok(facets)
    }

    /// Apply the facets declared on a restriction on top of its base
    fn apply_facets(
        &self,
        at: Located<'a, 'input>,
        mut facets: SimpleFacets,
    ) -> Result<SimpleFacets> {
        let mut enumeration = Vec::new();
        let mut patterns = Vec::new();

        for child in xsd_children(at.node) {
            let value = child.attribute(attrs::VALUE);
            match child.tag_name().name() {
                tags::ENUMERATION => {
                    if let Some(value) = value {
                        enumeration.push(value.to_string());
                    }
                }
                tags::PATTERN => match value.map(PatternFacet::new) {
                    Some(Ok(pattern)) => patterns.push(pattern),
                    Some(Err(e)) => log::warn!("Ignoring pattern facet: {}", e),
                    None => {}
                },
                tags::LENGTH => facets.length = parse_length(value)?,
                tags::MIN_LENGTH => facets.min_length = parse_length(value)?,
                tags::MAX_LENGTH => facets.max_length = parse_length(value)?,
                _ => {}
            }
        }

        Ok(facets.with_enumeration(enumeration).with_patterns(patterns))
    }
}

fn builtin_kind(local_name: &str) -> NodeKind {
    if local_name == "anyType" {
        NodeKind::Complex(None)
    } else {
        NodeKind::Simple(SimpleFacets::builtin(local_name))
    }
}

fn complex_kind(group: Option<ContentGroup>) -> NodeKind {
    match group {
        Some(group) if !group.is_empty() => NodeKind::Complex(Some(Arc::new(group))),
        _ => NodeKind::Complex(None),
    }
}

fn parse_length(value: Option<&str>) -> Result<Option<usize>> {
    value
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| Error::SchemaLoad(format!("Invalid length facet '{}'", v)))
        })
        .transpose()
}

/// Text of the first `xs:annotation/xs:documentation`, whitespace-collapsed
fn documentation(node: Node) -> Option<String> {
    let annotation = xsd_child(node, tags::ANNOTATION)?;
    let doc = xsd_child(annotation, tags::DOCUMENTATION)?;
    let text: Vec<&str> = doc
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .flat_map(str::split_whitespace)
        .collect();
    if text.is_empty() {
        None
    } else {
        Some(text.join(" "))
    }
}
