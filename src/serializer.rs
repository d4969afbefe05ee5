//! FormTree to XML serialization
//!
//! Mapping keys are re-qualified through a [`NamespaceTable`]: Clark-notation
//! keys keep their namespace, bare local names are looked up. Every namespace
//! used anywhere in the output is declared once on the root element.

use crate::documents::Element;
use crate::error::{Error, Result};
use crate::form::FormTree;
use crate::namespaces::{NamespaceContext, NamespaceTable, QName, XSI_NAMESPACE};
use indexmap::IndexSet;

/// Serializes form trees into namespaced element trees
#[derive(Debug, Clone)]
pub struct XmlSerializer<'a> {
    table: &'a NamespaceTable,
}

impl<'a> XmlSerializer<'a> {
    /// Create a serializer over a namespace table
    pub fn new(table: &'a NamespaceTable) -> Self {
        Self { table }
    }

    /// Serialize `content` under the element `tag` (Clark or bare local name)
    pub fn serialize(&self, tag: &str, content: &FormTree) -> Result<Element> {
        self.serialize_root(tag, content, None)
    }

    /// Serialize a payload root, optionally annotated with `xsi:type`
    pub fn serialize_root(
        &self,
        tag: &str,
        content: &FormTree,
        xsi_type: Option<&QName>,
    ) -> Result<Element> {
        let qname = self.table.qualify(tag)?;
        let mut used = IndexSet::new();
        let mut root = self.build(qname, content, &mut used)?;

        if let Some(type_name) = xsi_type {
            if let Some(ns) = &type_name.namespace {
                used.insert(ns.clone());
            }
            used.insert(XSI_NAMESPACE.to_string());
            root.set_attribute("xsi:type", self.table.prefixed(type_name)?);
        }

        root.namespaces = self.declarations(&used)?;
        Ok(root)
    }

    fn build(
        &self,
        qname: QName,
        content: &FormTree,
        used: &mut IndexSet<String>,
    ) -> Result<Element> {
        let mut element = self.element(qname, used)?;
        match content {
            FormTree::Scalar(text) => element.set_text(text.as_str()),
            FormTree::Map(map) => {
                for (key, value) in map {
                    let child_name = self.table.qualify(key)?;
                    match value {
                        FormTree::List(items) => {
                            for item in items {
                                if matches!(item, FormTree::List(_)) {
                                    return Err(Error::Xml(format!(
                                        "'{}' holds a list of lists",
                                        key
                                    )));
                                }
                                let child = self.build(child_name.clone(), item, used)?;
                                element.add_child(child);
                            }
                        }
                        _ => {
                            let child = self.build(child_name, value, used)?;
                            element.add_child(child);
                        }
                    }
                }
            }
            FormTree::List(_) => {
                return Err(Error::Xml(format!(
                    "'{}' cannot be serialized from a list",
                    element.local_name()
                )))
            }
        }
        Ok(element)
    }

    fn element(&self, qname: QName, used: &mut IndexSet<String>) -> Result<Element> {
        let prefix = match &qname.namespace {
            Some(ns) => {
                let prefix = self.table.prefix_for(ns).ok_or_else(|| {
                    Error::Namespace(format!("no prefix registered for namespace '{}'", ns))
                })?;
                used.insert(ns.clone());
                Some(prefix.to_string())
            }
            None => None,
        };
        let element = Element::new(qname);
        Ok(match prefix {
            Some(prefix) => element.with_prefix(prefix),
            None => element,
        })
    }

    fn declarations(&self, used: &IndexSet<String>) -> Result<NamespaceContext> {
        let mut context = NamespaceContext::new();
        for ns in used {
            let prefix = self.table.prefix_for(ns).ok_or_else(|| {
                Error::Namespace(format!("no prefix registered for namespace '{}'", ns))
            })?;
            context.add_prefix(prefix, ns.as_str());
        }
        Ok(context)
    }
}
