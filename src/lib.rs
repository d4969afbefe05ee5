//! # eudamed-xml
//!
//! Schema-driven generation of EUDAMED device registration XML.
//!
//! The crate walks an XSD schema model, asks a value-capture collaborator for
//! every visible field, collects the answers into a [`FormTree`] and
//! serializes it into namespace-qualified XML, optionally wrapped in a `Push`
//! message envelope.
//!
//! ## Features
//!
//! - XSD loader for the EUDAMED schema family (types, groups, includes, facets)
//! - Visibility configuration with defaults and repeated-instance indices
//! - GS1 check characters for GMN (Basic UDI-DI) and GTIN-14 (UDI-DI)
//! - Identifier regeneration for existing device documents
//! - Bulk generation from an identifier source
//! - Optional `xmllint` validation of produced documents
//!
//! ## Example
//!
//! ```rust,ignore
//! use eudamed_xml::{BuildReport, FormTree, FormTreeBuilder, MapCapture, NamespaceTable,
//!                   SchemaModel, VisibilityConfig, XmlSerializer};
//!
//! let model = SchemaModel::from_file("DI.xsd")?;
//! let root = model.root("MDRDevice")?;
//! let config = VisibilityConfig::new();
//!
//! let mut capture = MapCapture::from_json_str(&values)?;
//! let mut report = BuildReport::new();
//! let tree = FormTreeBuilder::new(&config).build(root, &mut capture, &mut report)?;
//!
//! let table = NamespaceTable::from_schema(&model);
//! let element = XmlSerializer::new(&table).serialize(&root.name.clark(), &tree.unwrap_or_else(FormTree::map))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names and paths
pub mod namespaces;
pub mod paths;

// Resource loading
pub mod documents;
pub mod loaders;

// Schema model
pub mod schema;

// Generation
pub mod form;
pub mod serializer;
pub mod visibility;

// Identifiers
pub mod checksum;
pub mod regenerate;

// Device documents
pub mod batch;
pub mod device;
pub mod envelope;
pub mod validation;

pub use checksum::{gmn_check_characters, gtin_check_digit};
pub use device::DeviceStructure;
pub use documents::{Document, Element, WriteOptions};
pub use envelope::{Envelope, EnvelopeSettings};
pub use error::{Error, FieldValidationError, Result};
pub use form::{BuildReport, DefaultsOnly, FormTree, FormTreeBuilder, MapCapture, ValueCapture};
pub use limits::Limits;
pub use namespaces::{NamespaceTable, QName};
pub use paths::FieldPath;
pub use schema::{SchemaModel, SchemaNode};
pub use serializer::XmlSerializer;
pub use visibility::{SparseIndexPolicy, VisibilityConfig};

/// Version of the eudamed-xml library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
