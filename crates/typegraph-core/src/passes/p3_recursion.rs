//! Pass 3: Recursion Breaking
//!
//! Depth-first walk over the finished arena with an on-path set. An edge to
//! a node already on the current path closes a cycle; the last breakable
//! edge of that cycle is rewritten to [`NodeRef::Reference`], so emitters
//! hold the target by indirection. Alias edges are not breakable: a cycle
//! made only of aliases (`A: $ref A`) has no finite representation and is a
//! [`CompileError::CyclicSchema`].

use crate::error::CompileError;
use crate::ir::{NodeId, NodeKind, NodeRef, SchemaArena, TypeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Rewrite back-edges to `Reference`. Returns the number of edges rewritten.
pub(crate) fn break_cycles(arena: &mut SchemaArena) -> Result<usize, CompileError> {
    let mut marks = vec![Mark::Unvisited; arena.len()];
    let mut broken = 0;
    for index in 0..arena.len() {
        if marks[index] == Mark::Unvisited {
            broken += visit(arena, NodeId(index), &mut marks)?;
        }
    }
    tracing::debug!(broken, "recursion edges rewritten");
    Ok(broken)
}

fn visit(arena: &mut SchemaArena, root: NodeId, marks: &mut [Mark]) -> Result<usize, CompileError> {
    // (node, index of the next edge to follow)
    let mut path: Vec<(NodeId, usize)> = vec![(root, 0)];
    marks[root.0] = Mark::OnPath;
    let mut broken = 0;

    while let Some(top) = path.len().checked_sub(1) {
        let (node, next) = path[top];
        let edges = edges_of(arena, node);
        if next >= edges.len() {
            marks[node.0] = Mark::Done;
            path.pop();
            continue;
        }
        path[top].1 += 1;

        let edge = edges[next];
        if edge.is_reference() {
            continue;
        }
        let target = edge.id();
        match marks[target.0] {
            Mark::Done => {}
            Mark::Unvisited => {
                marks[target.0] = Mark::OnPath;
                path.push((target, 0));
            }
            Mark::OnPath => {
                let start = path.iter().position(|(n, _)| *n == target).unwrap_or(0);
                // Every entry on the path has advanced past the edge it followed.
                let segment: Vec<(NodeId, usize)> =
                    path[start..].iter().map(|(n, next)| (*n, next - 1)).collect();

                let Some(&(from, edge_index)) = segment.iter().rev().find(|(n, _)| !is_alias(arena, *n))
                else {
                    let cycle = segment
                        .iter()
                        .map(|(n, _)| arena.node(*n).base_name.as_str())
                        .chain(std::iter::once(arena.node(target).base_name.as_str()))
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    return Err(CompileError::CyclicSchema {
                        path: arena.node(target).origin.to_string(),
                        cycle,
                    });
                };

                rewrite_as_reference(arena, from, edge_index);
                broken += 1;
                tracing::debug!(
                    from = %arena.node(from).origin,
                    to = %arena.node(target).origin,
                    "cycle broken with a reference edge"
                );
            }
        }
    }
    Ok(broken)
}

fn edges_of(arena: &SchemaArena, id: NodeId) -> Vec<NodeRef> {
    match &arena.node(id).kind {
        NodeKind::Type(kind) => kind.edges(),
        _ => Vec::new(),
    }
}

fn is_alias(arena: &SchemaArena, id: NodeId) -> bool {
    matches!(arena.node(id).kind, NodeKind::Type(TypeKind::Alias { .. }))
}

fn rewrite_as_reference(arena: &mut SchemaArena, id: NodeId, edge_index: usize) {
    if let NodeKind::Type(kind) = &mut arena.node_mut(id).kind {
        if let Some(edge) = kind.edges_mut().into_iter().nth(edge_index) {
            *edge = NodeRef::Reference(edge.id());
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileOptions;
    use crate::passes::{
        p0_normalize::normalize, p1_composition::merge_compositions,
        p2_polymorphism::resolve_unions,
    };
    use crate::resolver::{DocumentSet, ResolverEngine};
    use serde_json::{json, Value};

    fn run(doc: Value) -> Result<(SchemaArena, usize), CompileError> {
        let docs = DocumentSet::single(doc);
        let engine = ResolverEngine::new(&docs)?;
        let mut arena = normalize(&engine, &CompileOptions::default())?;
        merge_compositions(&mut arena)?;
        resolve_unions(&mut arena, &engine)?;
        let broken = break_cycles(&mut arena)?;
        Ok((arena, broken))
    }

    fn all_edges(arena: &SchemaArena) -> Vec<NodeRef> {
        arena.nodes.iter().flat_map(|n| edges_of(arena, n.id)).collect()
    }

    #[test]
    fn test_self_referencing_array_gets_reference() {
        let (arena, broken) = run(json!({ "components": { "schemas": {
            "Node": { "type": "object", "properties": {
                "value": { "type": "string" },
                "children": { "type": "array", "items": { "$ref": "#/components/schemas/Node" } }
            } }
        } } }))
        .unwrap();
        assert_eq!(broken, 1);
        let node = arena.components.values().next().copied().unwrap();
        assert!(all_edges(&arena).contains(&NodeRef::Reference(node)));
    }

    #[test]
    fn test_mutual_recursion_broken_once() {
        let (arena, broken) = run(json!({ "components": { "schemas": {
            "A": { "type": "object", "properties": { "b": { "$ref": "#/components/schemas/B" } } },
            "B": { "type": "object", "properties": { "a": { "$ref": "#/components/schemas/A" } } }
        } } }))
        .unwrap();
        assert_eq!(broken, 1);
        let refs: Vec<_> = all_edges(&arena).into_iter().filter(NodeRef::is_reference).collect();
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_cycle_through_alias_breaks_at_object_edge() {
        let (arena, broken) = run(json!({ "components": { "schemas": {
            "Alias": { "$ref": "#/components/schemas/Tree" },
            "Tree": { "type": "object", "properties": { "next": { "$ref": "#/components/schemas/Alias" } } }
        } } }))
        .unwrap();
        assert_eq!(broken, 1);
        let alias = arena.components.values().next().copied().unwrap();
        assert!(matches!(
            arena.node(alias).kind,
            NodeKind::Type(TypeKind::Alias { target: NodeRef::Named(_) })
        ));
    }

    #[test]
    fn test_alias_only_cycle_is_error() {
        let err = run(json!({ "components": { "schemas": {
            "A": { "$ref": "#/components/schemas/B" },
            "B": { "$ref": "#/components/schemas/A" }
        } } }))
        .unwrap_err();
        assert!(matches!(err, CompileError::CyclicSchema { .. }), "{err:?}");
    }

    #[test]
    fn test_acyclic_graph_untouched() {
        let (_, broken) = run(json!({ "components": { "schemas": {
            "Leaf": { "type": "string" },
            "Pair": { "type": "object", "properties": {
                "l": { "$ref": "#/components/schemas/Leaf" },
                "r": { "$ref": "#/components/schemas/Leaf" }
            } }
        } } }))
        .unwrap();
        assert_eq!(broken, 0);
    }
}
