//! Particles and content groups
//!
//! A particle is one entry of a complex type's content model: either an
//! element declaration or a nested sequence/choice group. Every particle
//! carries its occurrence bounds (minOccurs, maxOccurs).

use super::SchemaNode;
use crate::error::{Error, Result};
use std::fmt;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if the particle is schema-mandatory (minOccurs >= 1)
    pub fn is_mandatory(&self) -> bool {
        self.min >= 1
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if the particle repeats (maxOccurs unbounded or > 1)
    pub fn is_repeated(&self) -> bool {
        match self.max {
            Some(max) => max > 1,
            None => true,
        }
    }

    /// Clamp an instance count to the maximum
    pub fn clamp(&self, count: usize) -> usize {
        match self.max {
            Some(max) => count.min(max as usize),
            None => count,
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..*", self.min),
        }
    }
}

/// Parse minOccurs/maxOccurs from XML attribute values
pub fn parse_occurs(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Occurs> {
    let mut occurs = Occurs::once();

    if let Some(min_str) = min_occurs {
        occurs.min = min_str.trim().parse::<u32>().map_err(|_| {
            Error::SchemaLoad(format!(
                "minOccurs value '{}' is not a valid non-negative integer",
                min_str
            ))
        })?;
    }

    match max_occurs.map(str::trim) {
        Some("unbounded") => occurs.max = None,
        Some(max_str) => {
            let max = max_str.parse::<u32>().map_err(|_| {
                Error::SchemaLoad(format!(
                    "maxOccurs value '{}' must be a non-negative integer or 'unbounded'",
                    max_str
                ))
            })?;
            if occurs.min > max {
                return Err(Error::SchemaLoad(
                    "maxOccurs must be 'unbounded' or greater than minOccurs".to_string(),
                ));
            }
            occurs.max = Some(max);
        }
        None => {
            if occurs.min > 1 {
                return Err(Error::SchemaLoad(
                    "minOccurs must be lesser or equal than maxOccurs".to_string(),
                ));
            }
        }
    }

    Ok(occurs)
}

/// Content model compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// Ordered sequence of particles (`xs:all` is read as a sequence)
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
}

impl ModelType {
    /// Parse from element tag name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sequence" | "all" => Some(ModelType::Sequence),
            "choice" => Some(ModelType::Choice),
            _ => None,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Sequence => write!(f, "sequence"),
            ModelType::Choice => write!(f, "choice"),
        }
    }
}

/// An ordered sequence or choice of particles
#[derive(Debug, Clone)]
pub struct ContentGroup {
    /// Compositor
    pub model: ModelType,
    /// Occurrence bounds of the group itself
    pub occurs: Occurs,
    /// Particles in schema-declared order
    pub particles: Vec<Particle>,
}

impl ContentGroup {
    /// Create an empty group
    pub fn new(model: ModelType, occurs: Occurs) -> Self {
        Self {
            model,
            occurs,
            particles: Vec::new(),
        }
    }

    /// Append a particle
    pub fn with_particle(mut self, particle: Particle) -> Self {
        self.particles.push(particle);
        self
    }

    /// Check whether the group is a choice
    pub fn is_choice(&self) -> bool {
        self.model == ModelType::Choice
    }

    /// Check whether the group has no particles
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Element particles of this group and of its nested groups, in order
    pub fn elements(&self) -> Vec<&SchemaNode> {
        let mut out = Vec::new();
        self.collect_elements(&mut out);
        out
    }

    fn collect_elements<'a>(&'a self, out: &mut Vec<&'a SchemaNode>) {
        for particle in &self.particles {
            match particle {
                Particle::Element(node) => out.push(node),
                Particle::Group(group) => group.collect_elements(out),
            }
        }
    }
}

/// One entry of a content group
#[derive(Debug, Clone)]
pub enum Particle {
    /// An element declaration
    Element(SchemaNode),
    /// A nested sequence or choice
    Group(ContentGroup),
}

impl Particle {
    /// Occurrence bounds of the particle
    pub fn occurs(&self) -> Occurs {
        match self {
            Particle::Element(node) => node.occurs,
            Particle::Group(group) => group.occurs,
        }
    }

    /// Label shown for the particle when offered as a choice branch
    pub fn label(&self) -> String {
        match self {
            Particle::Element(node) => node.name.local_name.clone(),
            Particle::Group(group) => format!("(nested {})", group.model),
        }
    }
}
