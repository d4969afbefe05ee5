//! Bulk generation from an identifier source
//!
//! An identifier source (in production, a query against the ERP database)
//! yields one row per device variant. Rows are ordered by department and
//! cylinder, the first row becomes the "minimum" document and the rest the
//! bulk batch; each output gets its own copy of the form tree with the row's
//! UDI-DI spliced in.

use crate::error::{Error, Result};
use crate::form::FormTree;
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::schema::SchemaNode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Path of the UDI-DI code inside a device tree
pub const UDI_DI_CODE_PATH: &str = "MDRUDIDIData[0]/identifier/DICode";

/// One identifier row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRow {
    /// Department
    pub dpt: String,
    /// Cylinder
    pub cyl: String,
    /// Product code
    pub pcode: String,
    /// UDI-DI (GTIN-14)
    pub udi_di: String,
}

impl IdentifierRow {
    /// Create a row
    pub fn new(
        dpt: impl Into<String>,
        cyl: impl Into<String>,
        pcode: impl Into<String>,
        udi_di: impl Into<String>,
    ) -> Self {
        Self {
            dpt: dpt.into(),
            cyl: cyl.into(),
            pcode: pcode.into(),
            udi_di: udi_di.into(),
        }
    }
}

/// Supplies identifier rows
pub trait IdentifierSource {
    /// Fetch all rows; failures are [`Error::ExternalSource`]
    fn fetch(&mut self) -> Result<Vec<IdentifierRow>>;
}

/// Rows held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    rows: Vec<IdentifierRow>,
}

impl StaticSource {
    /// Wrap rows
    pub fn new(rows: Vec<IdentifierRow>) -> Self {
        Self { rows }
    }
}

impl IdentifierSource for StaticSource {
    fn fetch(&mut self) -> Result<Vec<IdentifierRow>> {
        Ok(self.rows.clone())
    }
}

/// Rows exported as a JSON array of `{dpt, cyl, pcode, udi_di}` objects
#[derive(Debug, Clone)]
pub struct JsonRowsSource {
    path: PathBuf,
    limits: Limits,
}

impl JsonRowsSource {
    /// Read rows from `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limits: Limits::default(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Source file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentifierSource for JsonRowsSource {
    fn fetch(&mut self) -> Result<Vec<IdentifierRow>> {
        let text = Loader::new()
            .with_limits(self.limits.clone())
            .load(&self.path)
            .map_err(|e| Error::ExternalSource(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| Error::ExternalSource(e.to_string()))
    }
}

fn finite(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Finite numbers first in numeric order, then the rest in text order
fn compare_numeric(a: &str, b: &str) -> Ordering {
    match (finite(a), finite(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Sort rows by department then cylinder; non-numeric values sort last
pub fn sort_rows(rows: &mut [IdentifierRow]) {
    rows.sort_by(|a, b| compare_numeric(&a.dpt, &b.dpt).then_with(|| compare_numeric(&a.cyl, &b.cyl)));
}

/// Sorted rows split into the minimum representative and the bulk remainder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierBatch {
    /// First row after sorting
    pub minimum: IdentifierRow,
    /// Remaining rows
    pub bulk: Vec<IdentifierRow>,
}

impl IdentifierBatch {
    /// Fetch, sort and split the rows of a source
    pub fn fetch(source: &mut dyn IdentifierSource) -> Result<Self> {
        let mut rows = source.fetch()?;
        sort_rows(&mut rows);
        log::info!("Fetched {} identifier rows", rows.len());

        let mut rows = rows.into_iter();
        let minimum = rows
            .next()
            .ok_or_else(|| Error::ExternalSource("No identifier rows returned".to_string()))?;
        Ok(Self {
            minimum,
            bulk: rows.collect(),
        })
    }

    /// All rows, minimum first
    pub fn rows(&self) -> impl Iterator<Item = &IdentifierRow> {
        std::iter::once(&self.minimum).chain(self.bulk.iter())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        1 + self.bulk.len()
    }

    /// Always false: a batch holds at least the minimum row
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Copy of `tree` with the row's UDI-DI written at `path`.
///
/// `root` is the element the tree was collected for; entries missing from the
/// tree are created under their qualified names.
pub fn splice_udi_di(
    root: &SchemaNode,
    tree: &FormTree,
    row: &IdentifierRow,
    path: &str,
) -> Result<FormTree> {
    let mut copy = tree.clone();
    copy.set_path_in(root, path, row.udi_di.as_str())?;
    Ok(copy)
}

/// One tree per row of the batch, minimum first
pub fn generate_batch(
    root: &SchemaNode,
    tree: &FormTree,
    batch: &IdentifierBatch,
    path: &str,
) -> Result<Vec<(IdentifierRow, FormTree)>> {
    batch
        .rows()
        .map(|row| Ok((row.clone(), splice_udi_di(root, tree, row, path)?)))
        .collect()
}
