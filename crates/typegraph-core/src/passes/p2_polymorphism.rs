//! Pass 2: Union Resolution (`oneOf` / `anyOf`)
//!
//! Turns every pending union into a `Union` with one [`Variant`] per listed
//! member. Variant names are unique within the union; discriminator
//! mappings are resolved to variant indices, and several discriminator
//! values may select the same variant.

use indexmap::{IndexMap, IndexSet};

use crate::error::CompileError;
use crate::ir::{
    Discriminator, NodeId, NodeKind, NodeRef, PendingUnion, RawDiscriminator, SchemaArena,
    TypeKind, UnionMember, Variant,
};
use crate::resolver::{ResolverEngine, SchemaPath};
use crate::schema_utils::build_path;

/// Resolve every pending union in the arena.
pub(crate) fn resolve_unions(
    arena: &mut SchemaArena,
    engine: &ResolverEngine<'_>,
) -> Result<(), CompileError> {
    let pending: Vec<NodeId> = arena
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Union(_)))
        .map(|n| n.id)
        .collect();
    tracing::debug!(count = pending.len(), "resolving unions");

    for id in pending {
        let NodeKind::Union(union) = &arena.node(id).kind else {
            continue;
        };
        let union = union.clone();
        let kind = build_union(arena, engine, &union)?;
        arena.node_mut(id).kind = NodeKind::Type(kind);
    }
    Ok(())
}

fn build_union(
    arena: &SchemaArena,
    engine: &ResolverEngine<'_>,
    union: &PendingUnion,
) -> Result<TypeKind, CompileError> {
    let mut taken: IndexSet<String> = IndexSet::new();
    let mut variants = Vec::with_capacity(union.members.len());

    for member in &union.members {
        let name = unique_variant_name(&variant_base_name(arena, member), &mut taken);
        variants.push(Variant {
            name,
            accessor: String::new(),
            schema: member.schema,
            discriminator_values: IndexSet::new(),
        });
    }

    let discriminator = match &union.discriminator {
        Some(raw) => Some(resolve_discriminator(arena, engine, raw, &mut variants)?),
        None => None,
    };

    Ok(TypeKind::Union {
        mode: union.mode,
        variants,
        discriminator,
    })
}

/// Component key for `$ref` members, else the member title, else a kind word.
fn variant_base_name(arena: &SchemaArena, member: &UnionMember) -> String {
    match member.schema {
        NodeRef::Named(target) | NodeRef::Reference(target) => arena.node(target).base_name.clone(),
        NodeRef::Inline(child) => member.title.clone().unwrap_or_else(|| {
            let word = match &arena.node(child).kind {
                NodeKind::Type(kind) => kind.kind_word(),
                NodeKind::AllOf(_) => "Object",
                NodeKind::Union(_) => "Union",
                NodeKind::Placeholder => "Value",
            };
            word.to_string()
        }),
    }
}

fn unique_variant_name(base: &str, taken: &mut IndexSet<String>) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn resolve_discriminator(
    arena: &SchemaArena,
    engine: &ResolverEngine<'_>,
    raw: &RawDiscriminator,
    variants: &mut [Variant],
) -> Result<Discriminator, CompileError> {
    let mut mapping: IndexMap<String, usize> = IndexMap::new();

    for (value, target) in &raw.mapping {
        let target_path = mapping_target_path(engine, target, &raw.path)?;
        let index = arena
            .components
            .get(&target_path)
            .and_then(|node| variant_for(arena, variants, *node))
            .ok_or_else(|| {
                CompileError::union(
                    &raw.path,
                    format!("mapping '{value}' targets '{target}', which is not a member of this union"),
                )
            })?;
        mapping.insert(value.clone(), index);
        variants[index].discriminator_values.insert(value.clone());
    }

    // Unmapped `$ref` variants are selected by their component name.
    for (index, variant) in variants.iter_mut().enumerate() {
        if !variant.discriminator_values.is_empty() {
            continue;
        }
        let NodeRef::Named(target) = variant.schema else {
            continue;
        };
        let implicit = arena.node(target).base_name.clone();
        if !mapping.contains_key(&implicit) {
            mapping.insert(implicit.clone(), index);
            variant.discriminator_values.insert(implicit);
        }
    }

    tracing::debug!(
        path = %raw.path,
        property = %raw.property_name,
        values = mapping.len(),
        "resolved discriminator"
    );
    Ok(Discriminator {
        property_name: raw.property_name.clone(),
        mapping,
    })
}

/// A mapping target is a `$ref` string or a bare schema component name.
fn mapping_target_path(
    engine: &ResolverEngine<'_>,
    target: &str,
    site: &SchemaPath,
) -> Result<SchemaPath, CompileError> {
    if target.contains('#') || target.contains('/') {
        return engine.resolve_ref(target, site).map_err(|_| {
            CompileError::union(site, format!("discriminator mapping target '{target}' does not resolve"))
        });
    }
    Ok(SchemaPath::new(
        site.document.clone(),
        build_path("#", &["components", "schemas", target]),
    )
    .with_package(site.package.clone()))
}

/// Index of the variant whose schema is `node`, looking through aliases.
fn variant_for(arena: &SchemaArena, variants: &[Variant], node: NodeId) -> Option<usize> {
    variants
        .iter()
        .position(|v| v.schema.id() == node)
        .or_else(|| {
            let resolved = arena.resolve_alias(node)?;
            variants
                .iter()
                .position(|v| arena.resolve_alias(v.schema.id()) == Some(resolved))
        })
}

// ===========================================================================
// Tests
// ===========================================================================
