//! The frozen type graph handed to emitters and to [`crate::runtime`].
//!
//! A [`TypeGraph`] is immutable: it has no mutating methods, and the only
//! way to build one is [`crate::compile`]. It serializes to JSON so
//! out-of-process emitters can consume it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::extensions::SchemaExtensions;
use crate::ir::{NodeId, NodeKind, NodeRef, OperationTypes, SchemaArena, TypeKind};
use crate::ir::{Namespace, Variant};
use crate::resolver::SchemaPath;

/// One resolved node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeNode {
    pub id: NodeId,
    /// Allocated identifier; `None` for nodes the emitter writes inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub origin: SchemaPath,
    pub namespace: Namespace,
    /// Package of a type declared in another document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Whether the emitter declares a named type for this node.
    pub declared: bool,
    #[serde(flatten)]
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub write_only: bool,
    #[serde(default, skip_serializing_if = "is_default_extensions")]
    pub extensions: SchemaExtensions,
}

fn is_default_extensions(ext: &SchemaExtensions) -> bool {
    *ext == SchemaExtensions::default()
}

impl TypeNode {
    /// Name qualified by package (`common.Error`), if named.
    pub fn qualified_name(&self) -> Option<String> {
        let name = self.name.as_ref()?;
        Some(match &self.package {
            Some(package) => format!("{package}.{name}"),
            None => name.clone(),
        })
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum { .. })
    }

    /// The variant of a union node with the given name.
    pub fn variant(&self, name: &str) -> Option<(usize, &Variant)> {
        match &self.kind {
            TypeKind::Union { variants, .. } => {
                variants.iter().enumerate().find(|(_, v)| v.name == name)
            }
            _ => None,
        }
    }
}

/// Immutable, emission-ready type model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeGraph {
    nodes: Vec<TypeNode>,
    /// Qualified name → node, in allocation order.
    types: IndexMap<String, NodeId>,
    operations: Vec<OperationTypes>,
}

impl TypeGraph {
    /// Freeze a fully processed arena. Fails if any node is still pending.
    pub(crate) fn freeze(arena: SchemaArena) -> Result<Self, CompileError> {
        let mut nodes = Vec::with_capacity(arena.nodes.len());
        for node in arena.nodes {
            let kind = match node.kind {
                NodeKind::Type(kind) => kind,
                NodeKind::Placeholder | NodeKind::AllOf(_) | NodeKind::Union(_) => {
                    return Err(CompileError::invalid(
                        &node.origin,
                        "schema node left unresolved after all passes",
                    ));
                }
            };
            nodes.push(TypeNode {
                id: node.id,
                name: node.name,
                origin: node.origin,
                namespace: node.namespace,
                package: node.package,
                declared: node.declared,
                kind,
                nullable: node.nullable,
                description: node.description,
                deprecated: node.deprecated,
                read_only: node.read_only,
                write_only: node.write_only,
                extensions: node.extensions,
            });
        }

        let mut types = IndexMap::new();
        for node in nodes.iter().filter(|n| n.declared) {
            if let Some(name) = node.qualified_name() {
                types.insert(name, node.id);
            }
        }

        Ok(Self {
            nodes,
            types,
            operations: arena.operations,
        })
    }

    /// Declared types in allocation order.
    pub fn types(&self) -> impl Iterator<Item = &TypeNode> {
        self.types.values().map(|id| &self.nodes[id.0])
    }

    /// Declared type by (package-qualified) name.
    pub fn get(&self, name: &str) -> Option<&TypeNode> {
        self.types.get(name).map(|id| &self.nodes[id.0])
    }

    /// Any node, declared or inline.
    ///
    /// # Panics
    /// If `id` did not come from this graph.
    pub fn node(&self, id: NodeId) -> &TypeNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[TypeNode] {
        &self.nodes
    }

    /// Declared enums, with constants paired to their literals.
    pub fn enums(&self) -> impl Iterator<Item = &TypeNode> {
        self.types().filter(|n| n.is_enum())
    }

    pub fn operations(&self) -> &[OperationTypes] {
        &self.operations
    }

    pub fn operation(&self, operation_id: &str) -> Option<&OperationTypes> {
        self.operations.iter().find(|op| op.operation_id == operation_id)
    }

    /// Follow `Alias` edges to the node that defines the shape.
    pub fn resolve(&self, edge: NodeRef) -> &TypeNode {
        let mut current = self.node(edge.id());
        for _ in 0..self.nodes.len() {
            match &current.kind {
                TypeKind::Alias { target } => current = self.node(target.id()),
                _ => break,
            }
        }
        current
    }

    /// Whether a use of `edge` may hold null: the edge's node or any alias
    /// on the way is nullable.
    pub fn is_nullable(&self, edge: NodeRef) -> bool {
        let mut current = self.node(edge.id());
        for _ in 0..=self.nodes.len() {
            if current.nullable {
                return true;
            }
            match &current.kind {
                TypeKind::Alias { target } => current = self.node(target.id()),
                _ => return false,
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use crate::config::CompileOptions;
    use crate::ir::{FieldPresence, TypeKind};
    use crate::compile_document;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({ "components": { "schemas": {
            "Color": { "type": "string", "enum": ["red", "green"] },
            "Paint": { "type": "object", "required": ["color"], "properties": {
                "color": { "$ref": "#/components/schemas/Color" },
                "note": { "type": "string", "nullable": true }
            } }
        } } })
    }

    #[test]
    fn test_lookup_and_enums() {
        let graph = compile_document(&sample(), &CompileOptions::default()).unwrap();
        let names: Vec<&str> = graph.types().filter_map(|t| t.name.as_deref()).collect();
        assert_eq!(names, vec!["Color", "Paint"]);

        let enums: Vec<_> = graph.enums().collect();
        assert_eq!(enums.len(), 1);
        let TypeKind::Enum { values, .. } = &enums[0].kind else {
            panic!("Color should be an enum");
        };
        let pairs: Vec<(&str, &serde_json::Value)> =
            values.iter().map(|c| (c.ident.as_str(), &c.literal)).collect();
        assert_eq!(pairs, vec![("Red", &json!("red")), ("Green", &json!("green"))]);
    }

    #[test]
    fn test_field_presence_exposed() {
        let graph = compile_document(&sample(), &CompileOptions::default()).unwrap();
        let TypeKind::Object { fields, .. } = &graph.get("Paint").unwrap().kind else {
            panic!("Paint should be an object");
        };
        assert_eq!(fields[0].presence(), FieldPresence::Required);
        assert_eq!(fields[1].presence(), FieldPresence::OptionalNullable);
    }

    #[test]
    fn test_graph_serializes_and_round_trips() {
        let graph = compile_document(&sample(), &CompileOptions::default()).unwrap();
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["nodes"][0]["name"], json!("Color"));
        assert_eq!(json["nodes"][0]["kind"], json!("enum"));
        let back: super::TypeGraph = serde_json::from_value(json).unwrap();
        assert_eq!(back, graph);
    }
}
