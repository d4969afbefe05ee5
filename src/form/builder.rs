//! Schema walk producing a [`FormTree`]

use super::capture::{FieldPrompt, ValueCapture};
use super::report::{BuildReport, ValueOrigin};
use super::FormTree;
use crate::error::Result;
use crate::limits::Limits;
use crate::paths::FieldPath;
use crate::schema::{ContentGroup, NodeKind, Particle, SchemaNode};
use crate::visibility::VisibilityConfig;
use indexmap::IndexMap;

/// Walks schema elements and collects their values into a [`FormTree`].
///
/// Decisions per node:
/// - a simple node asks the capture collaborator when visible, and otherwise
///   carries its default (or nothing) through silently;
/// - a mandatory choice renders exactly one branch, auto-selected from the
///   visible set when unambiguous;
/// - a repeated element gets one instance per configured index, at least
///   `minOccurs`;
/// - optional non-repeated elements are walked only when configured;
/// - nested groups merge into the enclosing mapping.
///
/// Empty subtrees collapse to `None`, so no mapping ever holds an empty entry.
#[derive(Debug, Clone)]
pub struct FormTreeBuilder<'a> {
    config: &'a VisibilityConfig,
    limits: Limits,
}

impl<'a> FormTreeBuilder<'a> {
    /// Create a builder over a visibility configuration
    pub fn new(config: &'a VisibilityConfig) -> Self {
        Self {
            config,
            limits: Limits::default(),
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Walk a root element; its path is its own local name
    pub fn build(
        &self,
        root: &SchemaNode,
        capture: &mut dyn ValueCapture,
        report: &mut BuildReport,
    ) -> Result<Option<FormTree>> {
        let path = FieldPath::new(root.local_name());
        self.build_node(root, &path, false, 0, capture, report)
    }

    /// Walk an element below `parent`, e.g. `MDRBasicUDI` below `MDRDevice`
    pub fn build_at(
        &self,
        node: &SchemaNode,
        parent: &FieldPath,
        capture: &mut dyn ValueCapture,
        report: &mut BuildReport,
    ) -> Result<Option<FormTree>> {
        let path = parent.child(node.local_name());
        self.build_node(node, &path, false, parent.depth(), capture, report)
    }

    /// Walk one node at `path`
    pub fn build_node(
        &self,
        node: &SchemaNode,
        path: &FieldPath,
        force_visible: bool,
        depth: usize,
        capture: &mut dyn ValueCapture,
        report: &mut BuildReport,
    ) -> Result<Option<FormTree>> {
        self.limits.check_walk_depth(depth)?;
        match &node.kind {
            NodeKind::Simple(_) => Ok(self.build_simple(node, path, force_visible, capture, report)),
            NodeKind::Complex(None) => Ok(None),
            NodeKind::Complex(Some(group)) => {
                let map = self.process_group(group, path, depth, capture, report)?;
                Ok((!map.is_empty()).then_some(FormTree::Map(map)))
            }
        }
    }

    fn build_simple(
        &self,
        node: &SchemaNode,
        path: &FieldPath,
        force_visible: bool,
        capture: &mut dyn ValueCapture,
        report: &mut BuildReport,
    ) -> Option<FormTree> {
        let default = self
            .config
            .resolve_default(path.as_str())
            .or(node.fixed.as_deref())
            .or(node.default.as_deref())
            .filter(|v| !v.is_empty());

        if !self
            .config
            .is_visible(node.min_occurs(), path.as_str(), force_visible)
        {
            let value = default?;
            report.record(path, node.local_name(), value, ValueOrigin::HiddenDefault);
            return Some(FormTree::scalar(value));
        }

        let prompt = FieldPrompt::for_node(node, path, default);
        let (value, origin) = match capture.capture(&prompt) {
            Some(value) => (value, ValueOrigin::Captured),
            None => (default?.to_string(), ValueOrigin::Default),
        };
        if value.is_empty() {
            return None;
        }

        if let Some(facets) = node.facets() {
            if let Err(error) = facets.validate(&value) {
                report.add_error(error.with_path(path.as_str()));
            }
        }
        report.record(path, node.local_name(), &value, origin);
        Some(FormTree::Scalar(value))
    }

    fn process_group(
        &self,
        group: &ContentGroup,
        path: &FieldPath,
        depth: usize,
        capture: &mut dyn ValueCapture,
        report: &mut BuildReport,
    ) -> Result<IndexMap<String, FormTree>> {
        if group.is_choice() && group.occurs.is_mandatory() {
            return self.process_choice(group, path, depth, capture, report);
        }

        let mut map = IndexMap::new();
        for particle in &group.particles {
            match particle {
                Particle::Element(child) => {
                    let clean = path.child(child.local_name());
                    let value = if child.occurs.is_repeated() {
                        self.build_repeated(child, &clean, depth, capture, report)?
                    } else if child.occurs.is_mandatory()
                        || self.config.is_configured(clean.as_str())
                    {
                        self.build_node(child, &clean, false, depth + 1, capture, report)?
                    } else {
                        log::debug!("Skipping unconfigured optional {}", clean);
                        None
                    };
                    if let Some(value) = value {
                        map.insert(child.name.clark(), value);
                    }
                }
                Particle::Group(nested) if nested.occurs.is_mandatory() => {
                    let nested_map = self.process_group(nested, path, depth, capture, report)?;
                    map.extend(nested_map);
                }
                Particle::Group(_) => {}
            }
        }
        Ok(map)
    }

    fn process_choice(
        &self,
        group: &ContentGroup,
        path: &FieldPath,
        depth: usize,
        capture: &mut dyn ValueCapture,
        report: &mut BuildReport,
    ) -> Result<IndexMap<String, FormTree>> {
        let labels: Vec<String> = group.particles.iter().map(Particle::label).collect();
        let candidates: Vec<&str> = labels.iter().map(String::as_str).collect();

        let (selected, forced) = match self.config.select_branch(path.as_str(), &candidates) {
            Some(index) => {
                log::debug!("Auto-selected branch {} at {}", labels[index], path);
                (Some(index), true)
            }
            None => (capture.choose_branch(path, &labels), false),
        };

        let mut map = IndexMap::new();
        match selected.and_then(|index| group.particles.get(index)) {
            Some(Particle::Element(branch)) => {
                let branch_path = path.child(branch.local_name());
                if let Some(value) =
                    self.build_node(branch, &branch_path, forced, depth + 1, capture, report)?
                {
                    map.insert(branch.name.clark(), value);
                }
            }
            Some(Particle::Group(_)) => {
                log::warn!("Nested group selected at {} is not expanded", path);
            }
            None => {
                log::warn!(
                    "No branch selected for mandatory choice at {} ({})",
                    path,
                    labels.join(", ")
                );
            }
        }
        Ok(map)
    }

    fn build_repeated(
        &self,
        node: &SchemaNode,
        clean: &FieldPath,
        depth: usize,
        capture: &mut dyn ValueCapture,
        report: &mut BuildReport,
    ) -> Result<Option<FormTree>> {
        let min = node.min_occurs();
        let suggested = self.config.instance_count(clean.as_str(), min);
        if min == 0 && suggested == 0 && !self.config.is_configured(clean.as_str()) {
            log::debug!("Skipping unconfigured repeated {}", clean);
            return Ok(None);
        }

        let requested = capture.instance_count(clean, suggested).max(min as usize);
        let count = node.occurs.clamp(requested);
        self.limits.check_instances(count)?;
        log::debug!("{} instances of {}", count, clean);

        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            let instance = clean.indexed(i);
            if let Some(value) = self.build_node(node, &instance, false, depth + 1, capture, report)? {
                items.push(value);
            }
        }
        Ok((!items.is_empty()).then_some(FormTree::List(items)))
    }
}
