//! XML namespace handling
//!
//! This module provides qualified names (QNames), prefix scopes for parsed
//! documents, and the [`NamespaceTable`] used to re-qualify form field names
//! when serializing.

use crate::error::{Error, Result};
use crate::schema::SchemaModel;
use indexmap::IndexMap;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Well-known EUDAMED data and service model namespaces
pub mod eudamed {
    /// Device entity namespace
    pub const DEVICE: &str = "https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/v1";
    /// Basic UDI-DI entity namespace
    pub const BASIC_UDI: &str =
        "https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/BasicUDI/v1";
    /// UDI-DI entity namespace
    pub const UDI_DI: &str = "https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/UDIDI/v1";
    /// Common device namespace
    pub const COMMON_DI: &str =
        "https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Device/CommonDevice/v1";
    /// Links namespace
    pub const LINKS: &str = "https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/Links/v1";
    /// Market info namespace
    pub const MARKET_INFO: &str =
        "https://ec.europa.eu/tools/eudamed/dtx/datamodel/Entity/MktInfo/MarketInfo/v1";
    /// Message envelope namespace
    pub const MESSAGE: &str = "https://ec.europa.eu/tools/eudamed/dtx/servicemodel/Message/v1";
    /// Service namespace
    pub const SERVICE: &str = "https://ec.europa.eu/tools/eudamed/dtx/servicemodel/Service/v1";

    /// Preferred prefix for each well-known namespace
    pub const PREFIXES: &[(&str, &str)] = &[
        ("device", DEVICE),
        ("basicudi", BASIC_UDI),
        ("udidi", UDI_DI),
        ("commondi", COMMON_DI),
        ("links", LINKS),
        ("marketinfo", MARKET_INFO),
        ("m", MESSAGE),
        ("s", SERVICE),
        ("xsi", super::XSI_NAMESPACE),
    ];
}

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Parse Clark notation (`{namespace}local`); anything else is a bare local name
    pub fn from_clark(name: &str) -> Self {
        if let Some(rest) = name.strip_prefix('{') {
            if let Some((ns, local)) = rest.split_once('}') {
                if ns.is_empty() {
                    return Self::local(local);
                }
                return Self::namespaced(ns, local);
            }
        }
        Self::local(name)
    }

    /// Get the name in Clark notation
    pub fn clark(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{}}}{}", ns, self.local_name),
            None => self.local_name.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

/// Local part of a Clark-notation or bare name
pub fn local_part(name: &str) -> &str {
    match name.strip_prefix('{').and_then(|rest| rest.split_once('}')) {
        Some((_, local)) => local,
        None => name,
    }
}

/// Namespace declarations made on one element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI, in declaration order
    prefixes: IndexMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Find a declared prefix for a namespace URI
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|(_, uri)| uri.as_str() == namespace)
            .map(|(prefix, _)| prefix.as_str())
    }

    /// Iterate over prefix declarations in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Check whether this context declares nothing
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }

    /// Resolve a prefixed name to a QName
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(self.default_namespace.clone(), prefixed_name))
        }
    }
}

/// Element name to namespace table used to re-qualify form field names.
///
/// Built once from a loaded [`SchemaModel`]: every element name reachable from
/// the global declarations is registered with its owning namespace, and every
/// namespace gets a prefix (well-known EUDAMED prefixes first, then prefixes
/// declared by the schema documents, then generated `nsN` prefixes).
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    /// Local name to the namespaces that own an element of that name
    owners: IndexMap<String, Vec<Option<NamespaceUri>>>,
    /// Namespace URI to prefix
    prefixes: IndexMap<NamespaceUri, Prefix>,
}

impl Default for NamespaceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTable {
    /// Create a table holding only the well-known prefixes
    pub fn new() -> Self {
        let mut table = Self {
            owners: IndexMap::new(),
            prefixes: IndexMap::new(),
        };
        for (prefix, uri) in eudamed::PREFIXES {
            table.register_prefix(prefix, uri);
        }
        table
    }

    /// Derive the table from every element reachable in a schema model
    pub fn from_schema(model: &SchemaModel) -> Self {
        let mut table = Self::new();
        for (prefix, uri) in model.declared_prefixes() {
            table.register_prefix(prefix, uri);
        }
        model.visit_nodes(&mut |node| table.register_name(&node.name));
        for namespace in model.type_namespaces() {
            table.ensure_prefix(&namespace);
        }
        table
    }

    /// Register an element name
    pub fn register_name(&mut self, qname: &QName) {
        let owners = self.owners.entry(qname.local_name.clone()).or_default();
        if !owners.contains(&qname.namespace) {
            owners.push(qname.namespace.clone());
        }
        if let Some(ns) = &qname.namespace {
            self.ensure_prefix(ns);
        }
    }

    /// Register a prefix for a namespace unless either is already taken
    pub fn register_prefix(&mut self, prefix: &str, namespace: &str) {
        if prefix.is_empty() || prefix == "xml" || prefix.starts_with("xmlns") {
            return;
        }
        if self.prefixes.contains_key(namespace) || self.prefixes.values().any(|p| p == prefix) {
            return;
        }
        self.prefixes.insert(namespace.to_string(), prefix.to_string());
    }

    /// Builder form of [`register_prefix`](Self::register_prefix)
    pub fn with_prefix(mut self, prefix: &str, namespace: &str) -> Self {
        self.register_prefix(prefix, namespace);
        self
    }

    /// Get the prefix for a namespace, assigning a generated one if missing
    pub fn ensure_prefix(&mut self, namespace: &str) -> String {
        if let Some(prefix) = self.prefixes.get(namespace) {
            return prefix.clone();
        }
        let mut n = 0;
        let prefix = loop {
            let candidate = format!("ns{}", n);
            if !self.prefixes.values().any(|p| *p == candidate) {
                break candidate;
            }
            n += 1;
        };
        self.prefixes.insert(namespace.to_string(), prefix.clone());
        prefix
    }

    /// Get the prefix for a namespace
    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.prefixes.get(namespace).map(|s| s.as_str())
    }

    /// Check whether a local element name is known
    pub fn contains(&self, local_name: &str) -> bool {
        self.owners.contains_key(local_name)
    }

    /// Qualify a form field key.
    ///
    /// Clark-notation keys carry their namespace already. Bare local names are
    /// looked up in the table; unknown or ambiguous names are errors.
    pub fn qualify(&self, key: &str) -> Result<QName> {
        if key.starts_with('{') {
            return Ok(QName::from_clark(key));
        }
        match self.owners.get(key).map(|owners| owners.as_slice()) {
            Some([namespace]) => Ok(QName::new(namespace.clone(), key)),
            Some(owners) if owners.len() > 1 => Err(Error::Namespace(format!(
                "element name '{}' is owned by {} namespaces",
                key,
                owners.len()
            ))),
            _ => Err(Error::Namespace(format!(
                "element name '{}' is not declared by the schema",
                key
            ))),
        }
    }

    /// Format a QName as `prefix:local` using this table
    pub fn prefixed(&self, qname: &QName) -> Result<String> {
        match &qname.namespace {
            None => Ok(qname.local_name.clone()),
            Some(ns) => {
                let prefix = self.prefix_for(ns).ok_or_else(|| {
                    Error::Namespace(format!("no prefix registered for namespace '{}'", ns))
                })?;
                Ok(format!("{}:{}", prefix, qname.local_name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace, Some("http://example.com".to_string()));
        assert_eq!(qname.local_name, "element");
    }

    #[test]
    fn test_qname_clark_round_trip() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.clark(), "{http://example.com}element");
        assert_eq!(QName::from_clark(&qname.clark()), qname);
        assert_eq!(QName::from_clark("element"), QName::local("element"));
        assert_eq!(local_part("{urn:x}DICode"), "DICode");
        assert_eq!(local_part("DICode"), "DICode");
    }

    #[test]
    fn test_namespace_context() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("m", eudamed::MESSAGE);
        ctx.set_default_namespace("http://example.com");

        assert_eq!(ctx.get_namespace("m"), Some(eudamed::MESSAGE));
        assert_eq!(ctx.prefix_for(eudamed::MESSAGE), Some("m"));
        assert_eq!(ctx.get_default_namespace(), Some("http://example.com"));

        let qname = ctx.resolve("m:messageID").unwrap();
        assert_eq!(qname.namespace.as_deref(), Some(eudamed::MESSAGE));
        assert!(ctx.resolve("x:messageID").is_err());
    }

    #[test]
    fn test_table_qualifies_unique_names() {
        let mut table = NamespaceTable::new();
        table.register_name(&QName::namespaced(eudamed::COMMON_DI, "DICode"));
        table.register_name(&QName::local("Code"));

        let qname = table.qualify("DICode").unwrap();
        assert_eq!(qname.namespace.as_deref(), Some(eudamed::COMMON_DI));
        assert_eq!(table.prefixed(&qname).unwrap(), "commondi:DICode");
        assert_eq!(table.qualify("Code").unwrap(), QName::local("Code"));
    }

    #[test]
    fn test_table_rejects_unknown_and_ambiguous_names() {
        let mut table = NamespaceTable::new();
        table.register_name(&QName::namespaced(eudamed::BASIC_UDI, "identifier"));
        table.register_name(&QName::namespaced(eudamed::UDI_DI, "identifier"));

        assert!(matches!(table.qualify("identifier"), Err(Error::Namespace(_))));
        assert!(matches!(table.qualify("missing"), Err(Error::Namespace(_))));

        let clark = format!("{{{}}}identifier", eudamed::UDI_DI);
        assert_eq!(
            table.qualify(&clark).unwrap().namespace.as_deref(),
            Some(eudamed::UDI_DI)
        );
    }

    #[test]
    fn test_table_generates_prefixes() {
        let mut table = NamespaceTable::new();
        table.register_name(&QName::namespaced("urn:a", "x"));
        table.register_name(&QName::namespaced("urn:b", "y"));
        assert_eq!(table.prefix_for("urn:a"), Some("ns0"));
        assert_eq!(table.prefix_for("urn:b"), Some("ns1"));
        assert_eq!(table.prefix_for(eudamed::DEVICE), Some("device"));
    }
}
