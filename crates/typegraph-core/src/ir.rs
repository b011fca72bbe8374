//! Schema IR: node identities, edges, and type kinds.
//!
//! Nodes live in an arena addressed by [`NodeId`]; parents point at children
//! through [`NodeRef`] edges, so recursive schemas never need
//! self-referential values. The public types here are exactly what the
//! frozen [`crate::graph::TypeGraph`] exposes; the `pub(crate)` half is the
//! mutable arena the passes work on.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extensions::{FieldOptions, SchemaExtensions};
use crate::resolver::SchemaPath;

// ---------------------------------------------------------------------------
// Identity and edges
// ---------------------------------------------------------------------------

/// Stable identity of an IR node (its arena index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a parent refers to a child node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "edge", content = "node", rename_all = "snake_case")]
pub enum NodeRef {
    /// Anonymous child owned by this parent alone.
    Inline(NodeId),
    /// By-value use of a named component.
    Named(NodeId),
    /// Back-edge closing a cycle; the target is held by indirection.
    Reference(NodeId),
}

impl NodeRef {
    pub fn id(&self) -> NodeId {
        match self {
            NodeRef::Inline(id) | NodeRef::Named(id) | NodeRef::Reference(id) => *id,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, NodeRef::Reference(_))
    }
}

/// Naming namespace a declared type was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Schema,
    Parameter,
    Response,
    RequestBody,
    Header,
    Operation,
    Inline,
}

impl Namespace {
    /// Suffix appended when a later namespace collides with an earlier one.
    pub fn qualifier(&self) -> Option<&'static str> {
        match self {
            Namespace::Parameter => Some("Parameter"),
            Namespace::Response => Some("Response"),
            Namespace::RequestBody => Some("RequestBody"),
            Namespace::Header => Some("Header"),
            Namespace::Schema | Namespace::Operation | Namespace::Inline => None,
        }
    }

    /// The `components` section backing this namespace, if any.
    pub fn component_section(&self) -> Option<&'static str> {
        match self {
            Namespace::Schema => Some("schemas"),
            Namespace::Parameter => Some("parameters"),
            Namespace::Response => Some("responses"),
            Namespace::RequestBody => Some("requestBodies"),
            Namespace::Header => Some("headers"),
            Namespace::Operation | Namespace::Inline => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Type kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    String,
    Integer,
    Number,
    Boolean,
    /// Untyped value; operations on it are deferred to the target's native
    /// dynamic representation.
    Dynamic,
}

impl ScalarKind {
    pub fn from_type_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "string" => Some(ScalarKind::String),
            "integer" => Some(ScalarKind::Integer),
            "number" => Some(ScalarKind::Number),
            "boolean" => Some(ScalarKind::Boolean),
            _ => None,
        }
    }
}

/// `format` tag of a string (or numeric) scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Format {
    Date,
    DateTime,
    Uuid,
    Byte,
    Email,
    Custom(String),
}

impl From<String> for Format {
    fn from(s: String) -> Self {
        match s.as_str() {
            "date" => Format::Date,
            "date-time" => Format::DateTime,
            "uuid" => Format::Uuid,
            "byte" => Format::Byte,
            "email" => Format::Email,
            _ => Format::Custom(s),
        }
    }
}

impl From<Format> for String {
    fn from(f: Format) -> Self {
        match f {
            Format::Date => "date".to_string(),
            Format::DateTime => "date-time".to_string(),
            Format::Uuid => "uuid".to_string(),
            Format::Byte => "byte".to_string(),
            Format::Email => "email".to_string(),
            Format::Custom(s) => s,
        }
    }
}

/// One enum constant: allocated identifier plus the original literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumConstant {
    pub ident: String,
    pub literal: Value,
}

/// Policy for object properties not declared in the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "schema", rename_all = "snake_case")]
pub enum AdditionalProperties {
    /// `additionalProperties: false`.
    Forbidden,
    /// Not declared; modelled like `Forbidden` for backward compatibility.
    #[default]
    Unspecified,
    /// `additionalProperties: true` (or `{}`).
    Any,
    /// `additionalProperties: <schema>`.
    Typed(NodeRef),
}

impl AdditionalProperties {
    /// Whether undeclared keys are carried in the generated type.
    pub fn allows_extra(&self) -> bool {
        matches!(self, AdditionalProperties::Any | AdditionalProperties::Typed(_))
    }
}

/// The four presence states of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPresence {
    /// Always present, never null.
    Required,
    /// May be absent; never an explicit null.
    Optional,
    /// Always present as a key; the value may be null.
    RequiredNullable,
    /// Absent, explicit null, or a value.
    OptionalNullable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Wire name (the property key).
    pub name: String,
    /// Allocated identifier.
    pub ident: String,
    pub schema: NodeRef,
    pub required: bool,
    pub nullable: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub options: FieldOptions,
    pub origin: SchemaPath,
}

impl Field {
    pub fn presence(&self) -> FieldPresence {
        match (self.required, self.nullable) {
            (true, false) => FieldPresence::Required,
            (false, false) => FieldPresence::Optional,
            (true, true) => FieldPresence::RequiredNullable,
            (false, true) => FieldPresence::OptionalNullable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionMode {
    /// Exactly one variant holds.
    OneOf,
    /// Any number of variants may hold at once.
    AnyOf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant name, unique within its union.
    pub name: String,
    /// Allocated accessor identifier (`From{accessor}` / `As{accessor}`).
    pub accessor: String,
    pub schema: NodeRef,
    /// Discriminator strings selecting this variant (possibly several).
    pub discriminator_values: IndexSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    pub property_name: String,
    /// Discriminator value → index into the union's variants.
    pub mapping: IndexMap<String, usize>,
}

/// A resolved type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    Scalar {
        scalar: ScalarKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<Format>,
    },
    Enum {
        scalar: ScalarKind,
        values: Vec<EnumConstant>,
    },
    Array {
        element: NodeRef,
    },
    Object {
        fields: Vec<Field>,
        additional_properties: AdditionalProperties,
    },
    Union {
        mode: UnionMode,
        variants: Vec<Variant>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discriminator: Option<Discriminator>,
    },
    Alias {
        target: NodeRef,
    },
}

impl TypeKind {
    pub fn dynamic() -> Self {
        TypeKind::Scalar {
            scalar: ScalarKind::Dynamic,
            format: None,
        }
    }

    /// Outgoing edges in declaration order.
    pub fn edges(&self) -> Vec<NodeRef> {
        match self {
            TypeKind::Scalar { .. } | TypeKind::Enum { .. } => Vec::new(),
            TypeKind::Array { element } => vec![*element],
            TypeKind::Object {
                fields,
                additional_properties,
            } => {
                let mut edges: Vec<NodeRef> = fields.iter().map(|f| f.schema).collect();
                if let AdditionalProperties::Typed(r) = additional_properties {
                    edges.push(*r);
                }
                edges
            }
            TypeKind::Union { variants, .. } => variants.iter().map(|v| v.schema).collect(),
            TypeKind::Alias { target } => vec![*target],
        }
    }

    /// Mutable access to the outgoing edges, in the same order as [`edges`](Self::edges).
    pub(crate) fn edges_mut(&mut self) -> Vec<&mut NodeRef> {
        match self {
            TypeKind::Scalar { .. } | TypeKind::Enum { .. } => Vec::new(),
            TypeKind::Array { element } => vec![element],
            TypeKind::Object {
                fields,
                additional_properties,
            } => {
                let mut edges: Vec<&mut NodeRef> = fields.iter_mut().map(|f| &mut f.schema).collect();
                if let AdditionalProperties::Typed(r) = additional_properties {
                    edges.push(r);
                }
                edges
            }
            TypeKind::Union { variants, .. } => variants.iter_mut().map(|v| &mut v.schema).collect(),
            TypeKind::Alias { target } => vec![target],
        }
    }

    /// Short kind word, used for diagnostics and variant names.
    pub fn kind_word(&self) -> &'static str {
        match self {
            TypeKind::Scalar { scalar, .. } | TypeKind::Enum { scalar, .. } => match scalar {
                ScalarKind::String => "String",
                ScalarKind::Integer => "Integer",
                ScalarKind::Number => "Number",
                ScalarKind::Boolean => "Boolean",
                ScalarKind::Dynamic => "Value",
            },
            TypeKind::Array { .. } => "Array",
            TypeKind::Object { .. } => "Object",
            TypeKind::Union { .. } => "Union",
            TypeKind::Alias { .. } => "Alias",
        }
    }
}

/// Types synthesised for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationTypes {
    pub operation_id: String,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Record of all path/query/header/cookie parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<NodeRef>,
    /// Status code (or `default`) → JSON response body type.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub responses: IndexMap<String, NodeRef>,
}

// ---------------------------------------------------------------------------
// Arena (mutable, crate-internal)
// ---------------------------------------------------------------------------

/// `allOf` awaiting the composition pass.
#[derive(Debug, Clone)]
pub(crate) struct PendingAllOf {
    pub members: Vec<AllOfMember>,
    /// Properties declared directly alongside `allOf`.
    pub local_fields: Vec<Field>,
    pub local_additional: AdditionalProperties,
}

#[derive(Debug, Clone)]
pub(crate) struct AllOfMember {
    pub schema: NodeRef,
    pub path: SchemaPath,
}

/// `oneOf`/`anyOf` awaiting the union pass.
#[derive(Debug, Clone)]
pub(crate) struct PendingUnion {
    pub mode: UnionMode,
    pub members: Vec<UnionMember>,
    pub discriminator: Option<RawDiscriminator>,
}

#[derive(Debug, Clone)]
pub(crate) struct UnionMember {
    pub schema: NodeRef,
    pub title: Option<String>,
    pub path: SchemaPath,
}

#[derive(Debug, Clone)]
pub(crate) struct RawDiscriminator {
    pub property_name: String,
    /// Discriminator value → `$ref` string or bare component name.
    pub mapping: IndexMap<String, String>,
    pub path: SchemaPath,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    /// Allocated, body not normalized yet.
    Placeholder,
    Type(TypeKind),
    AllOf(PendingAllOf),
    Union(PendingUnion),
}

impl NodeKind {
    pub fn as_type(&self) -> Option<&TypeKind> {
        match self {
            NodeKind::Type(kind) => Some(kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SchemaNode {
    pub id: NodeId,
    pub origin: SchemaPath,
    pub namespace: Namespace,
    /// Component key, synthesised operation name, or (for inline nodes) the
    /// suffix appended to the parent's final name.
    pub base_name: String,
    /// Parent whose final name prefixes an inline node's name.
    pub parent: Option<NodeId>,
    /// Whether the emitter declares a type for this node.
    pub declared: bool,
    pub name: Option<String>,
    pub package: Option<String>,
    pub kind: NodeKind,
    pub nullable: bool,
    pub description: Option<String>,
    pub deprecated: bool,
    pub read_only: bool,
    pub write_only: bool,
    /// The raw `required` list; for `allOf` it may name fields declared by
    /// another member.
    pub required: IndexSet<String>,
    pub extensions: SchemaExtensions,
}

/// Parameters for [`SchemaArena::alloc`].
pub(crate) struct NewNode {
    pub origin: SchemaPath,
    pub namespace: Namespace,
    pub base_name: String,
    pub parent: Option<NodeId>,
    pub declared: bool,
    pub package: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct SchemaArena {
    pub nodes: Vec<SchemaNode>,
    /// Component location → node, so every `$ref` to it shares one node.
    pub components: IndexMap<SchemaPath, NodeId>,
    pub operations: Vec<OperationTypes>,
}

impl SchemaArena {
    pub fn alloc(&mut self, new: NewNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SchemaNode {
            id,
            origin: new.origin,
            namespace: new.namespace,
            base_name: new.base_name,
            parent: new.parent,
            declared: new.declared,
            name: None,
            package: new.package,
            kind: NodeKind::Placeholder,
            nullable: false,
            description: None,
            deprecated: false,
            read_only: false,
            write_only: false,
            required: IndexSet::new(),
            extensions: SchemaExtensions::default(),
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Follow `Alias` edges until a non-alias node; `None` on an alias loop.
    pub fn resolve_alias(&self, start: NodeId) -> Option<NodeId> {
        let mut current = start;
        for _ in 0..=self.nodes.len() {
            match &self.node(current).kind {
                NodeKind::Type(TypeKind::Alias { target }) => current = target.id(),
                _ => return Some(current),
            }
        }
        None
    }
}
