//! Device registration documents
//!
//! A device document has one `MDRBasicUDI` block and one or more
//! `MDRUDIDIData` entries under the `MDRDevice` root. [`DeviceStructure`]
//! locates these particles in the schema, collects a [`FormTree`] for them and
//! turns it into a document, optionally wrapped in a message envelope.

use crate::documents::Document;
use crate::envelope::{Envelope, EnvelopeSettings};
use crate::error::{Error, Result};
use crate::form::{BuildReport, FormTree, FormTreeBuilder, ValueCapture};
use crate::paths::FieldPath;
use crate::schema::{SchemaModel, SchemaNode};
use crate::serializer::XmlSerializer;

/// Local name of the device root element
pub const DEVICE_ROOT: &str = "MDRDevice";
/// Local name of the Basic UDI-DI block
pub const BASIC_UDI: &str = "MDRBasicUDI";
/// Local name of a UDI-DI entry
pub const UDI_DI_DATA: &str = "MDRUDIDIData";
/// Upper bound on UDI-DI entries per generated document
pub const MAX_UDI_DI_ENTRIES: usize = 10;

/// The particles of a device root
#[derive(Debug, Clone, Copy)]
pub struct DeviceStructure<'a> {
    /// `MDRDevice` declaration
    pub root: &'a SchemaNode,
    /// `MDRBasicUDI` particle
    pub basic_udi: &'a SchemaNode,
    /// `MDRUDIDIData` particle
    pub udi_di: &'a SchemaNode,
}

impl<'a> DeviceStructure<'a> {
    /// Locate the device root and its particles in a schema
    pub fn locate(model: &'a SchemaModel) -> Result<Self> {
        Self::locate_in(model.root(DEVICE_ROOT)?)
    }

    /// Locate the Basic UDI-DI and UDI-DI particles under a device root
    pub fn locate_in(root: &'a SchemaNode) -> Result<Self> {
        match (root.find_child(BASIC_UDI), root.find_child(UDI_DI_DATA)) {
            (Some(basic_udi), Some(udi_di)) => Ok(Self {
                root,
                basic_udi,
                udi_di,
            }),
            _ => Err(Error::StructureMismatch(format!(
                "Could not find {} or {} definitions",
                BASIC_UDI, UDI_DI_DATA
            ))),
        }
    }

    /// Path of the device root
    pub fn root_path(&self) -> FieldPath {
        FieldPath::new(self.root.local_name())
    }

    /// Collect the device tree: the Basic UDI-DI block, then the UDI-DI entries.
    ///
    /// The number of entries comes from the capture collaborator (suggestion 1)
    /// and is kept between 1 and [`MAX_UDI_DI_ENTRIES`]. Entry `i` is walked at
    /// `MDRDevice/MDRUDIDIData[i]`.
    pub fn collect(
        &self,
        builder: &FormTreeBuilder<'_>,
        capture: &mut dyn ValueCapture,
        report: &mut BuildReport,
    ) -> Result<FormTree> {
        let root_path = self.root_path();
        let mut tree = FormTree::map();

        if let Some(basic) = builder.build_at(self.basic_udi, &root_path, capture, report)? {
            tree = tree.with_entry(self.basic_udi.name.clark(), basic);
        }

        let entries_path = root_path.child(self.udi_di.local_name());
        let count = capture
            .instance_count(&entries_path, 1)
            .clamp(1, MAX_UDI_DI_ENTRIES);
        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let path = entries_path.indexed(i);
            if let Some(entry) =
                builder.build_node(self.udi_di, &path, false, root_path.depth(), capture, report)?
            {
                entries.push(entry);
            }
        }
        if !entries.is_empty() {
            tree = tree.with_entry(self.udi_di.name.clark(), FormTree::List(entries));
        }
        Ok(tree)
    }

    /// Serialize a device tree into a document.
    ///
    /// With envelope settings the device becomes the payload of a `m:Push`
    /// message and carries an `xsi:type` naming its schema type.
    pub fn to_document(
        &self,
        serializer: &XmlSerializer<'_>,
        tree: &FormTree,
        envelope: Option<&EnvelopeSettings>,
    ) -> Result<Document> {
        let tag = self.root.name.clark();
        match envelope {
            None => Ok(Document::with_root(serializer.serialize(&tag, tree)?)),
            Some(settings) => {
                let payload =
                    serializer.serialize_root(&tag, tree, self.root.type_name.as_ref())?;
                Ok(Document::with_root(
                    Envelope::new(settings.clone()).wrap(vec![payload]),
                ))
            }
        }
    }
}
