//! Pass 1: Composition Merging (`allOf` flattening)
//!
//! Every pending `allOf` node becomes one flat `Object`. Members are merged
//! first, in encounter order, then the properties declared directly next to
//! `allOf`. There is no inheritance in the output: a type composed from
//! `Person` carries copies of `Person`'s fields.
//!
//! Merge semantics:
//! - fields are unioned; a field seen twice keeps its first position but
//!   takes the later declaration's schema, so local properties override
//!   inherited ones; `required`/`nullable` are ORed across declarations
//! - the required set is the union of every member's `required` list and
//!   the level's own
//! - `additionalProperties` folds left-to-right through [`merge_additional`]

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

use crate::error::CompileError;
use crate::ir::{
    AdditionalProperties, Field, NodeId, NodeKind, NodeRef, ScalarKind, SchemaArena, TypeKind,
};
use crate::resolver::SchemaPath;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Flatten every pending `allOf` in the arena.
pub(crate) fn merge_compositions(arena: &mut SchemaArena) -> Result<(), CompileError> {
    settle_field_nullability(arena);

    let pending: Vec<NodeId> = arena
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::AllOf(_)))
        .map(|n| n.id)
        .collect();
    tracing::debug!(count = pending.len(), "merging allOf compositions");

    let mut merging = HashSet::new();
    for id in pending {
        merge_node(arena, id, &mut merging)?;
    }

    sort_fields_by_order(arena);
    Ok(())
}

/// Fold two `additionalProperties` modes (accumulator first).
///
/// | acc \ next  | Any      | Typed(S) | Unspecified | Forbidden |
/// |-------------|----------|----------|-------------|-----------|
/// | Any         | Any      | Typed(S) | Any         | Forbidden |
/// | Typed(T)    | Typed(T) | error    | Typed(T)    | Forbidden |
/// | Unspecified | Any      | Typed(S) | Unspecified | Forbidden |
/// | Forbidden   | Forbidden| Forbidden| Forbidden   | Forbidden |
///
/// `Typed + Typed` is accepted only when both name the same node.
pub(crate) fn merge_additional(
    acc: AdditionalProperties,
    next: AdditionalProperties,
    path: &SchemaPath,
) -> Result<AdditionalProperties, CompileError> {
    use AdditionalProperties::*;
    match (acc, next) {
        (Forbidden, _) | (_, Forbidden) => Ok(Forbidden),
        (Unspecified, other) | (other, Unspecified) => Ok(other),
        (Any, Any) => Ok(Any),
        (Any, Typed(s)) | (Typed(s), Any) => Ok(Typed(s)),
        (Typed(t), Typed(s)) if t.id() == s.id() => Ok(Typed(t)),
        (Typed(t), Typed(s)) => Err(CompileError::merge(
            path,
            format!(
                "two different typed additionalProperties schemas ({} and {}) cannot be merged",
                t.id(),
                s.id()
            ),
        )),
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

fn merge_node(
    arena: &mut SchemaArena,
    id: NodeId,
    merging: &mut HashSet<NodeId>,
) -> Result<(), CompileError> {
    let NodeKind::AllOf(pending) = &arena.node(id).kind else {
        return Ok(());
    };
    let pending = pending.clone();
    let path = arena.node(id).origin.clone();

    if !merging.insert(id) {
        return Err(CompileError::CyclicSchema {
            path: path.to_string(),
            cycle: format!("allOf of {} includes itself", arena.node(id).base_name),
        });
    }

    // allOf: [$ref X] with nothing else is a rename of X.
    if let ([member], true, AdditionalProperties::Unspecified) = (
        pending.members.as_slice(),
        pending.local_fields.is_empty(),
        pending.local_additional,
    ) {
        // A level `required` the target lacks needs a flattened copy.
        let adds_required = |target: NodeId| {
            let target_required = &arena.node(target).required;
            arena
                .node(id)
                .required
                .iter()
                .any(|name| !target_required.contains(name))
        };
        let alias_target = match member.schema {
            NodeRef::Named(target) if !adds_required(target) => Some(target),
            _ => None,
        };
        if let Some(target) = alias_target {
            let node = arena.node_mut(id);
            node.kind = NodeKind::Type(TypeKind::Alias {
                target: NodeRef::Named(target),
            });
            if node.parent.is_some() {
                node.declared = false;
            }
            merging.remove(&id);
            return Ok(());
        }
    }

    let mut merged = MergedObject::default();
    let mut displaced = Vec::new();
    let mut required: IndexSet<String> = arena.node(id).required.clone();

    for member in &pending.members {
        let target = resolve_member(arena, member.schema.id(), &member.path, merging)?;
        let owned = matches!(member.schema, NodeRef::Inline(_)) && target == member.schema.id();

        match &arena.node(target).kind {
            NodeKind::Type(TypeKind::Object {
                fields,
                additional_properties,
            }) => {
                let fields = fields.clone();
                let additional = *additional_properties;
                required.extend(arena.node(target).required.iter().cloned());

                for mut field in fields {
                    if let NodeRef::Inline(child) = field.schema {
                        if owned {
                            arena.node_mut(child).parent = Some(id);
                        } else {
                            field.schema = NodeRef::Named(child);
                        }
                    }
                    displaced.extend(merged.add(field));
                }
                merged.additional = merge_additional(merged.additional, additional, &member.path)?;
            }
            NodeKind::Type(TypeKind::Scalar {
                scalar: ScalarKind::Dynamic,
                ..
            }) => {
                tracing::debug!(member = %member.path, "empty allOf member contributes nothing");
            }
            NodeKind::Type(other) => {
                return Err(CompileError::merge(
                    &member.path,
                    format!("allOf member is {}, only objects can be merged", other.kind_word()),
                ));
            }
            NodeKind::Union(_) | NodeKind::AllOf(_) | NodeKind::Placeholder => {
                return Err(CompileError::merge(
                    &member.path,
                    "allOf member did not resolve to an object",
                ));
            }
        }
    }

    for field in pending.local_fields {
        displaced.extend(merged.add(field));
    }
    for child in displaced {
        retire_inline(arena, child);
    }
    merged.additional = merge_additional(merged.additional, pending.local_additional, &path)?;

    let mut fields = merged.fields;
    for field in &mut fields {
        if required.contains(&field.name) {
            field.required = true;
        }
    }
    for name in &required {
        if !fields.iter().any(|f| &f.name == name) {
            tracing::debug!(path = %path, field = %name, "required field not declared by any allOf member");
        }
    }

    tracing::debug!(path = %path, fields = fields.len(), "merged allOf");
    let node = arena.node_mut(id);
    node.kind = NodeKind::Type(TypeKind::Object {
        fields,
        additional_properties: merged.additional,
    });
    node.required = required;
    merging.remove(&id);
    Ok(())
}

/// Follow a member through aliases (merging nested `allOf` on the way) to
/// the node that supplies its shape.
fn resolve_member(
    arena: &mut SchemaArena,
    start: NodeId,
    path: &SchemaPath,
    merging: &mut HashSet<NodeId>,
) -> Result<NodeId, CompileError> {
    let mut current = start;
    let mut seen = HashSet::new();
    loop {
        if !seen.insert(current) {
            return Err(CompileError::CyclicSchema {
                path: path.to_string(),
                cycle: "alias chain loops back on itself".to_string(),
            });
        }
        if matches!(arena.node(current).kind, NodeKind::AllOf(_)) {
            merge_node(arena, current, merging)?;
        }
        match &arena.node(current).kind {
            NodeKind::Type(TypeKind::Alias { target }) => current = target.id(),
            _ => return Ok(current),
        }
    }
}

#[derive(Default)]
struct MergedObject {
    fields: Vec<Field>,
    index: IndexMap<String, usize>,
    additional: AdditionalProperties,
}

impl MergedObject {
    /// Add a field. A later declaration of the same name replaces the
    /// earlier one in place; the displaced inline child is returned.
    fn add(&mut self, mut field: Field) -> Option<NodeId> {
        match self.index.get(&field.name) {
            Some(&at) => {
                let existing = &mut self.fields[at];
                tracing::debug!(
                    field = %field.name,
                    replaced = %existing.origin,
                    by = %field.origin,
                    "field declared by more than one allOf level"
                );
                field.required |= existing.required;
                field.nullable |= existing.nullable;
                let displaced = std::mem::replace(existing, field);
                match displaced.schema {
                    NodeRef::Inline(child) if child != existing.schema.id() => Some(child),
                    _ => None,
                }
            }
            None => {
                self.index.insert(field.name.clone(), self.fields.len());
                self.fields.push(field);
                None
            }
        }
    }
}

/// Stop declaring an inline schema (and everything nested in it) that no
/// merged field points at any more.
fn retire_inline(arena: &mut SchemaArena, root: NodeId) {
    let mut retired = HashSet::from([root]);
    loop {
        let before = retired.len();
        for node in &arena.nodes {
            if node.parent.is_some_and(|p| retired.contains(&p)) {
                retired.insert(node.id);
            }
        }
        if retired.len() == before {
            break;
        }
    }
    for id in retired {
        arena.node_mut(id).declared = false;
    }
}

// ---------------------------------------------------------------------------
// Field fix-ups
// ---------------------------------------------------------------------------

/// A field pointing at a nullable component is nullable. Components are
/// filled after the fields that use them, so this runs once all bodies exist.
fn settle_field_nullability(arena: &mut SchemaArena) {
    let nullable_target = |arena: &SchemaArena, start: NodeId| -> bool {
        let mut current = start;
        for _ in 0..=arena.len() {
            let node = arena.node(current);
            if node.nullable {
                return true;
            }
            match &node.kind {
                NodeKind::Type(TypeKind::Alias { target }) => current = target.id(),
                _ => return false,
            }
        }
        false
    };

    let mut updates = Vec::new();
    for node in &arena.nodes {
        let fields = match &node.kind {
            NodeKind::Type(TypeKind::Object { fields, .. }) => fields,
            NodeKind::AllOf(pending) => &pending.local_fields,
            _ => continue,
        };
        for (i, field) in fields.iter().enumerate() {
            if let NodeRef::Named(target) = field.schema {
                if !field.nullable && nullable_target(arena, target) {
                    updates.push((node.id, i));
                }
            }
        }
    }

    for (id, i) in updates {
        match &mut arena.node_mut(id).kind {
            NodeKind::Type(TypeKind::Object { fields, .. }) => fields[i].nullable = true,
            NodeKind::AllOf(pending) => pending.local_fields[i].nullable = true,
            _ => {}
        }
    }
}

/// Stable sort by `x-order`; unordered fields keep their place after the
/// ordered ones.
fn sort_fields_by_order(arena: &mut SchemaArena) {
    for node in &mut arena.nodes {
        if let NodeKind::Type(TypeKind::Object { fields, .. }) = &mut node.kind {
            if fields.iter().any(|f| f.options.order.is_some()) {
                fields.sort_by_key(|f| f.options.order.unwrap_or(i64::MAX));
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
