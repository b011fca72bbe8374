//! Tagged-union values.
//!
//! A [`UnionValue`] holds one slot per variant. `oneOf` unions keep at most
//! one slot set; `anyOf` unions may set several. An empty union is the
//! union's zero value and encodes as `null`.

use thiserror::Error;

use crate::graph::{TypeGraph, TypeNode};
use crate::ir::{NodeId, TypeKind, UnionMode};

use super::value::Instance;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnionError {
    #[error("{node} is not a union type")]
    NotAUnion { node: NodeId },

    #[error("union {union} has no variant '{variant}'")]
    UnknownVariant { union: String, variant: String },

    #[error("variant '{variant}' is not set")]
    NotSet { variant: String },

    #[error("discriminator value '{value}' does not select any variant")]
    UnknownDiscriminator { value: String },

    #[error("discriminator property '{property}' is missing")]
    MissingDiscriminator { property: String },

    #[error("union has no discriminator")]
    NoDiscriminator,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionValue {
    union: NodeId,
    mode: UnionMode,
    names: Vec<String>,
    slots: Vec<Option<Instance>>,
    discriminator: Option<String>,
}

impl UnionValue {
    /// The zero value of a union type.
    pub fn empty(graph: &TypeGraph, union: NodeId) -> Result<Self, UnionError> {
        let node = graph.node(union);
        let TypeKind::Union { mode, variants, .. } = &node.kind else {
            return Err(UnionError::NotAUnion { node: union });
        };
        Ok(Self {
            union,
            mode: *mode,
            names: variants.iter().map(|v| v.name.clone()).collect(),
            slots: vec![None; variants.len()],
            discriminator: None,
        })
    }

    /// A union holding a single variant.
    pub fn from_variant(
        graph: &TypeGraph,
        union: NodeId,
        variant: &str,
        value: Instance,
    ) -> Result<Self, UnionError> {
        let mut this = Self::empty(graph, union)?;
        this.set_variant(graph, variant, value)?;
        Ok(this)
    }

    pub fn union_id(&self) -> NodeId {
        self.union
    }

    pub fn mode(&self) -> UnionMode {
        self.mode
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Set a variant. On a `oneOf` union this clears any other variant.
    ///
    /// The discriminator string becomes the variant's first mapped value
    /// unless one was already chosen for this variant.
    pub fn set_variant(
        &mut self,
        graph: &TypeGraph,
        variant: &str,
        value: Instance,
    ) -> Result<(), UnionError> {
        let index = self.index_of(variant)?;
        if self.mode == UnionMode::OneOf {
            self.slots.iter_mut().for_each(|slot| *slot = None);
        }
        self.slots[index] = Some(value);

        let (_, spec) = union_node(graph, self.union)?
            .variant(variant)
            .ok_or_else(|| self.unknown(variant))?;
        let keep = self
            .discriminator
            .as_ref()
            .is_some_and(|d| spec.discriminator_values.contains(d));
        if !keep && (self.mode == UnionMode::OneOf || self.discriminator.is_none()) {
            self.discriminator = spec.discriminator_values.first().cloned();
        }
        Ok(())
    }

    /// Access a variant by name.
    pub fn as_variant(&self, variant: &str) -> Result<&Instance, UnionError> {
        let index = self.index_of(variant)?;
        self.slots[index].as_ref().ok_or_else(|| UnionError::NotSet {
            variant: variant.to_string(),
        })
    }

    /// Set variants in declaration order.
    pub fn set_variants(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.names
            .iter()
            .zip(&self.slots)
            .filter_map(|(name, slot)| slot.as_ref().map(|v| (name.as_str(), v)))
    }

    pub(crate) fn set_indices(&self) -> impl Iterator<Item = (usize, &Instance)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }

    pub(crate) fn set_index(&mut self, index: usize, value: Instance) {
        if self.mode == UnionMode::OneOf {
            self.slots.iter_mut().for_each(|slot| *slot = None);
        }
        self.slots[index] = Some(value);
    }

    /// Current discriminator string, if the union is discriminated and set.
    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    /// Choose which of a variant's discriminator strings to emit.
    pub fn set_discriminator(&mut self, value: impl Into<String>) {
        self.discriminator = Some(value.into());
    }

    /// The variant selected by the discriminator, and its value.
    pub fn value_by_discriminator(&self, graph: &TypeGraph) -> Result<(&str, &Instance), UnionError> {
        let TypeKind::Union { discriminator, .. } = &union_node(graph, self.union)?.kind else {
            return Err(UnionError::NotAUnion { node: self.union });
        };
        let Some(discriminator) = discriminator else {
            return Err(UnionError::NoDiscriminator);
        };
        let Some(value) = &self.discriminator else {
            return Err(UnionError::MissingDiscriminator {
                property: discriminator.property_name.clone(),
            });
        };
        let index = discriminator
            .mapping
            .get(value)
            .copied()
            .or_else(|| self.names.iter().position(|n| n == value))
            .ok_or_else(|| UnionError::UnknownDiscriminator { value: value.clone() })?;
        let name = self.names[index].as_str();
        let instance = self.slots[index]
            .as_ref()
            .ok_or_else(|| UnionError::NotSet { variant: name.to_string() })?;
        Ok((name, instance))
    }

    fn index_of(&self, variant: &str) -> Result<usize, UnionError> {
        self.names
            .iter()
            .position(|n| n == variant)
            .ok_or_else(|| self.unknown(variant))
    }

    fn unknown(&self, variant: &str) -> UnionError {
        UnionError::UnknownVariant {
            union: self.union.to_string(),
            variant: variant.to_string(),
        }
    }
}

fn union_node(graph: &TypeGraph, id: NodeId) -> Result<&TypeNode, UnionError> {
    let node = graph.node(id);
    match node.kind {
        TypeKind::Union { .. } => Ok(node),
        _ => Err(UnionError::NotAUnion { node: id }),
    }
}
