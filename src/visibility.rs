//! Field visibility and defaults
//!
//! A [`VisibilityConfig`] says which schema fields are collected and which
//! default values are carried into the output. It is loaded from a TOML file
//! per device group:
//!
//! ```toml
//! visible = ["MDRDevice/MDRBasicUDI/riskClass"]
//! sparse_index_policy = "contiguous-from-zero"
//!
//! [defaults]
//! "MDRDevice/MDRBasicUDI/riskClass" = "CLASS_IIA"
//!
//! [envelope]
//! actor_code = "BE-MF-000000001"
//! ```
//!
//! Without a `visible` key every field is visible (unconstrained mode). A
//! missing group file means "no configuration", not an empty one.

use crate::envelope::EnvelopeSettings;
use crate::error::Result;
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::paths::{normalize, SEPARATOR};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// How repeated-element instance counts are inferred from indexed default keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SparseIndexPolicy {
    /// Count instances `[0]`, `[1]`, ... and stop at the first missing index
    #[default]
    ContiguousFromZero,
    /// Highest configured index plus one
    HighestIndex,
}

/// Visible-path set, default values and envelope settings for one device group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Paths explicitly marked visible; `None` means every node is visible
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<BTreeSet<String>>,
    /// Default values keyed by exact or normalized path
    #[serde(default)]
    pub defaults: IndexMap<String, String>,
    /// Transport envelope settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<EnvelopeSettings>,
    /// Instance-count inference for repeated elements
    #[serde(default)]
    pub sparse_index_policy: SparseIndexPolicy,
}

impl VisibilityConfig {
    /// Unconstrained configuration: everything visible, no defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// Load a configuration file
    pub fn from_file(path: &Path, limits: &Limits) -> Result<Self> {
        let text = Loader::new().with_limits(limits.clone()).load(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded configuration {}", path.display());
        Ok(config)
    }

    /// Load `<dir>/<group>.toml`, or `None` when the group has no configuration file
    pub fn load_group(dir: &Path, group: &str, limits: &Limits) -> Result<Option<Self>> {
        let path = dir.join(format!("{}.toml", group));
        match Loader::new().with_limits(limits.clone()).load_optional(&path)? {
            Some(text) => Self::from_toml_str(&text).map(Some),
            None => {
                log::debug!("No configuration for group '{}'", group);
                Ok(None)
            }
        }
    }

    /// Mark paths visible, switching to constrained mode
    pub fn with_visible<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let visible = self.visible.get_or_insert_with(BTreeSet::new);
        visible.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Add a default value
    pub fn with_default(mut self, path: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(path.into(), value.into());
        self
    }

    /// Set the envelope settings
    pub fn with_envelope(mut self, envelope: EnvelopeSettings) -> Self {
        self.envelope = Some(envelope);
        self
    }

    /// Set the sparse index policy
    pub fn with_sparse_index_policy(mut self, policy: SparseIndexPolicy) -> Self {
        self.sparse_index_policy = policy;
        self
    }

    /// Check whether a visible-path set is loaded
    pub fn is_constrained(&self) -> bool {
        self.visible.is_some()
    }

    /// Decide whether a node at `path` is collected.
    ///
    /// Always true in unconstrained mode. Otherwise true for schema-mandatory
    /// nodes, forced nodes (a resolved choice branch), nodes whose exact or
    /// normalized path is listed, and ancestors of a listed path.
    pub fn is_visible(&self, min_occurs: u32, path: &str, force: bool) -> bool {
        match &self.visible {
            None => true,
            Some(visible) => force || min_occurs >= 1 || set_matches(visible, path),
        }
    }

    /// Default for a path: exact key first, then the normalized key
    pub fn resolve_default(&self, path: &str) -> Option<&str> {
        self.defaults
            .get(path)
            .or_else(|| self.defaults.get(&normalize(path)))
            .map(String::as_str)
    }

    /// Check whether the path, or something below it, is listed as visible
    pub fn is_listed_visible(&self, path: &str) -> bool {
        self.visible
            .as_ref()
            .map_or(false, |visible| set_matches(visible, path))
    }

    /// Check whether the path, or something below it, is configured in the
    /// visible set or the defaults
    pub fn is_configured(&self, path: &str) -> bool {
        self.is_listed_visible(path) || self.has_default_at_or_below(path)
    }

    fn has_default_at_or_below(&self, path: &str) -> bool {
        let normalized = normalize(path);
        let exact_prefix = format!("{}{}", path, SEPARATOR);
        let normalized_prefix = format!("{}{}", normalized, SEPARATOR);
        self.defaults.keys().any(|key| {
            key == path
                || *key == normalized
                || key.starts_with(&exact_prefix)
                || normalize(key).starts_with(&normalized_prefix)
        })
    }

    /// Initial number of instances of a repeated element at `clean_path`.
    ///
    /// Inferred from indexed default keys (`clean_path[k]` or a descendant),
    /// never below `min_occurs`, and at least one when the path itself is
    /// listed visible.
    pub fn instance_count(&self, clean_path: &str, min_occurs: u32) -> usize {
        let configured = match self.sparse_index_policy {
            SparseIndexPolicy::ContiguousFromZero => {
                let mut k = 0;
                while self.has_default_for_instance(clean_path, k) {
                    k += 1;
                }
                k
            }
            SparseIndexPolicy::HighestIndex => self
                .defaults
                .keys()
                .filter_map(|key| instance_index(key, clean_path))
                .max()
                .map_or(0, |max| max + 1),
        };

        let mut count = configured.max(min_occurs as usize);
        if count == 0 && self.is_listed_visible(clean_path) {
            count = 1;
        }
        count
    }

    fn has_default_for_instance(&self, clean_path: &str, index: usize) -> bool {
        self.defaults
            .keys()
            .any(|key| instance_index(key, clean_path) == Some(index))
    }

    /// Auto-select a choice branch.
    ///
    /// Returns the index of the only candidate whose path (`parent_path/name`)
    /// is listed visible or has a listed descendant; `None` when zero or
    /// several candidates match.
    pub fn select_branch(&self, parent_path: &str, candidates: &[&str]) -> Option<usize> {
        let visible = self.visible.as_ref()?;
        let mut matches = candidates.iter().enumerate().filter(|(_, name)| {
            let branch = format!("{}{}{}", parent_path, SEPARATOR, name);
            set_matches(visible, &branch)
        });
        match (matches.next(), matches.next()) {
            (Some((index, _)), None) => Some(index),
            _ => None,
        }
    }
}

/// Exact, normalized or descendant membership in a visible-path set
fn set_matches(visible: &BTreeSet<String>, path: &str) -> bool {
    if visible.contains(path) {
        return true;
    }
    let normalized = normalize(path);
    if visible.contains(&normalized) {
        return true;
    }
    let prefix = format!("{}{}", normalized, SEPARATOR);
    visible
        .range(prefix.clone()..)
        .next()
        .map_or(false, |entry| entry.starts_with(&prefix))
}

/// Index `k` when `key` is `clean_path[k]` or lies below it
fn instance_index(key: &str, clean_path: &str) -> Option<usize> {
    let rest = key.strip_prefix(clean_path)?.strip_prefix('[')?;
    let close = rest.find(']')?;
    let index = rest[..close].parse().ok()?;
    let tail = &rest[close + 1..];
    if tail.is_empty() || tail.starts_with(SEPARATOR) {
        Some(index)
    } else {
        None
    }
}
