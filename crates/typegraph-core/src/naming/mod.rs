//! Name allocation: type names, field identifiers, enum constants and
//! union variant accessors.
//!
//! Declared types are named in a fixed order so the result only depends on
//! the document: schema components, then parameter, response, request-body
//! and header components, then operation-synthesised types, then inline
//! types (whose names extend their parent's final name). Enum constants are
//! allocated last, in the same identifier space as types.

pub mod allocator;
pub mod casing;
pub mod sanitize;

use std::collections::HashSet;

use indexmap::IndexMap;

pub use allocator::{Claim, NameAllocator};
pub use casing::{IdentifierCasing, StyleCasing};
pub use sanitize::enum_constant_names;

use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::ir::{Namespace, NodeId, NodeKind, SchemaArena, TypeKind};

/// Assign identifiers to every declared node, field, variant and constant.
pub(crate) fn allocate_names(
    arena: &mut SchemaArena,
    casing: &dyn IdentifierCasing,
    options: &CompileOptions,
) -> Result<(), CompileError> {
    // One identifier space per package; the root document's is `None`.
    let mut spaces: IndexMap<Option<String>, NameAllocator> = IndexMap::new();

    for id in naming_order(arena) {
        let (base, qualified) = type_base(arena, id, casing);
        let node = arena.node(id);
        let origin = node.origin.to_string();
        let namespace = node.namespace;
        let allocator = spaces
            .entry(node.package.clone())
            .or_insert_with(|| NameAllocator::new(options.max_name_attempts));
        let name = allocator.claim(
            &reserved_safe(base, casing),
            qualified.map(|q| reserved_safe(q, casing)).as_deref(),
            namespace,
            &origin,
        )?;
        arena.node_mut(id).name = Some(name);
    }

    for index in 0..arena.len() {
        let id = NodeId(index);
        name_members(arena, id, casing);
    }

    for index in 0..arena.len() {
        let id = NodeId(index);
        let package = arena.node(id).package.clone();
        let allocator = spaces
            .entry(package)
            .or_insert_with(|| NameAllocator::new(options.max_name_attempts));
        name_enum_constants(arena, id, casing, allocator)?;
    }

    tracing::debug!(
        types = spaces.values().map(|s| s.claimed().count()).sum::<usize>(),
        "allocated identifiers"
    );
    Ok(())
}

/// Declared nodes: components (section order), operations, then inline.
fn naming_order(arena: &SchemaArena) -> Vec<NodeId> {
    let rank = |ns: Namespace| match ns {
        Namespace::Schema
        | Namespace::Parameter
        | Namespace::Response
        | Namespace::RequestBody
        | Namespace::Header => 0,
        Namespace::Operation => 1,
        Namespace::Inline => 2,
    };
    let section = |ns: Namespace| match ns {
        Namespace::Schema => 0,
        Namespace::Parameter => 1,
        Namespace::Response => 2,
        Namespace::RequestBody => 3,
        Namespace::Header => 4,
        Namespace::Operation | Namespace::Inline => 5,
    };
    let mut order: Vec<&crate::ir::SchemaNode> =
        arena.nodes.iter().filter(|n| n.declared).collect();
    // Stable: arena order within a rank. Late-discovered components (other
    // documents) keep their discovery order after the root's sections.
    order.sort_by_key(|n| {
        let late = n.namespace != Namespace::Inline
            && n.namespace != Namespace::Operation
            && n.package.is_some();
        (rank(n.namespace), late, if late { 0 } else { section(n.namespace) })
    });
    order.into_iter().map(|n| n.id).collect()
}

/// Base identifier for a node plus its namespace-qualified alternative.
fn type_base(
    arena: &SchemaArena,
    id: NodeId,
    casing: &dyn IdentifierCasing,
) -> (String, Option<String>) {
    let node = arena.node(id);
    let raw = match &node.extensions.type_name {
        Some(explicit) => explicit.clone(),
        None if node.namespace == Namespace::Inline => inline_raw_name(arena, id),
        None => node.base_name.clone(),
    };
    let base = non_empty(casing.type_name(&raw), "Type");
    let qualified = node
        .namespace
        .qualifier()
        .map(|q| non_empty(casing.type_name(&format!("{raw} {q}")), "Type"));
    (base, qualified)
}

/// `{nearest named ancestor} {suffixes...}` for an inline node.
fn inline_raw_name(arena: &SchemaArena, id: NodeId) -> String {
    let mut suffixes = vec![arena.node(id).base_name.as_str()];
    let mut current = arena.node(id).parent;
    let mut guard = 0;
    while let Some(parent) = current {
        let node = arena.node(parent);
        if let Some(name) = &node.name {
            suffixes.push(name.as_str());
            break;
        }
        suffixes.push(node.base_name.as_str());
        current = node.parent;
        guard += 1;
        if guard > arena.len() {
            break;
        }
    }
    suffixes.reverse();
    suffixes
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(ident: String, fallback: &str) -> String {
    if ident.is_empty() {
        fallback.to_string()
    } else {
        ident
    }
}

fn reserved_safe(ident: String, casing: &dyn IdentifierCasing) -> String {
    if casing.is_reserved(&ident) {
        format!("{ident}_")
    } else {
        ident
    }
}

fn unique_in(ident: String, seen: &mut HashSet<String>) -> String {
    if seen.insert(ident.clone()) {
        return ident;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{ident}{n}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Field identifiers (unique per record) and variant accessors (unique per union).
fn name_members(arena: &mut SchemaArena, id: NodeId, casing: &dyn IdentifierCasing) {
    let NodeKind::Type(kind) = &mut arena.node_mut(id).kind else {
        return;
    };
    match kind {
        TypeKind::Object { fields, .. } => {
            let mut seen = HashSet::new();
            for field in fields.iter_mut() {
                let ident = match &field.options.field_name {
                    Some(explicit) => explicit.clone(),
                    None => non_empty(casing.field_name(&field.name), "Field"),
                };
                field.ident = unique_in(reserved_safe(ident, casing), &mut seen);
            }
        }
        TypeKind::Union { variants, .. } => {
            let mut seen = HashSet::new();
            for variant in variants.iter_mut() {
                let ident = non_empty(casing.type_name(&variant.name), "Variant");
                variant.accessor = unique_in(ident, &mut seen);
            }
        }
        _ => {}
    }
}

/// Sanitize constants; prefix them all with the type name when one of them
/// would shadow the type itself or another identifier.
fn name_enum_constants(
    arena: &mut SchemaArena,
    id: NodeId,
    casing: &dyn IdentifierCasing,
    allocator: &mut NameAllocator,
) -> Result<(), CompileError> {
    let node = arena.node(id);
    let Some(TypeKind::Enum { values, .. }) = node.kind.as_type() else {
        return Ok(());
    };
    let literals: Vec<serde_json::Value> = values.iter().map(|c| c.literal.clone()).collect();
    let mut idents = enum_constant_names(&literals, node.extensions.enum_names.as_deref(), casing);

    if node.declared {
        let type_name = node.name.clone().unwrap_or_default();
        let shadows = idents
            .iter()
            .any(|ident| *ident == type_name || allocator.is_taken(ident));
        if shadows {
            tracing::debug!(enum_type = %type_name, "enum constants prefixed with their type name");
            idents = idents
                .into_iter()
                .map(|ident| casing.constant_name(&format!("{type_name} {ident}")))
                .collect();
        }
        let origin = node.origin.to_string();
        let mut claimed = Vec::with_capacity(idents.len());
        for ident in idents {
            claimed.push(allocator.claim(&ident, None, Namespace::Inline, &origin)?);
        }
        idents = claimed;
    }

    if let NodeKind::Type(TypeKind::Enum { values, .. }) = &mut arena.node_mut(id).kind {
        for (constant, ident) in values.iter_mut().zip(idents) {
            constant.ident = ident;
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
