//! Pass 0: Schema Normalization
//!
//! Walks the root document's component sections and operations and builds
//! the IR arena. This is the foundational pass; every later pass assumes:
//!
//! 1. Every component reachable through `$ref` has exactly one node,
//!    allocated before its body is normalized, so cyclic references simply
//!    point back at an existing node.
//! 2. `allOf` and `oneOf`/`anyOf` are recorded as pending kinds for
//!    Pass 1 and Pass 2; everything else is already a final [`TypeKind`].
//! 3. Nullability from `nullable`, `x-nullable`, `type: [T, "null"]` and
//!    `null` union members/enum literals is folded into the node flag.
//!
//! Traversal order is document order: `components/schemas`, `parameters`,
//! `responses`, `requestBodies`, `headers`, then `paths`.

use std::collections::VecDeque;

use indexmap::IndexSet;
use serde_json::{Map, Value};

use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::extensions::{parse_field_options, parse_schema_extensions};
use crate::ir::{
    AdditionalProperties, AllOfMember, Field, Format, Namespace, NewNode, NodeId, NodeKind,
    NodeRef, OperationTypes, PendingAllOf, PendingUnion, RawDiscriminator, ScalarKind,
    SchemaArena, TypeKind, UnionMember, UnionMode,
};
use crate::resolver::{ResolverEngine, SchemaPath};
use crate::schema_utils::{last_segment, split_path};

const COMPONENT_SECTIONS: &[Namespace] = &[
    Namespace::Schema,
    Namespace::Parameter,
    Namespace::Response,
    Namespace::RequestBody,
    Namespace::Header,
];

const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// How an inline child is attached to its parent.
#[derive(Clone, Copy)]
struct InlineCtx<'s> {
    parent: NodeId,
    /// Appended to the parent's final name to name the child.
    suffix: &'s str,
    /// Whether an object/enum/union child gets its own declared type.
    declare: bool,
}

/// Build the IR arena for every type reachable from the root document.
pub(crate) fn normalize(
    engine: &ResolverEngine<'_>,
    options: &CompileOptions,
) -> Result<SchemaArena, CompileError> {
    let mut normalizer = Normalizer {
        engine,
        options,
        arena: SchemaArena::default(),
        queue: VecDeque::new(),
    };

    normalizer.allocate_components()?;
    normalizer.drain()?;
    normalizer.walk_operations()?;
    normalizer.drain()?;

    tracing::debug!(
        nodes = normalizer.arena.len(),
        components = normalizer.arena.components.len(),
        operations = normalizer.arena.operations.len(),
        "normalized schema graph"
    );
    Ok(normalizer.arena)
}

struct Normalizer<'a> {
    engine: &'a ResolverEngine<'a>,
    options: &'a CompileOptions,
    arena: SchemaArena,
    /// Components allocated but not yet normalized.
    queue: VecDeque<NodeId>,
}

impl<'a> Normalizer<'a> {
    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    /// Allocate a node for every root-document component, in section order,
    /// so the name allocator later sees them in document order.
    fn allocate_components(&mut self) -> Result<(), CompileError> {
        let root = self.engine.root_document();
        let Some(components) = root.root.get("components").and_then(Value::as_object) else {
            return Ok(());
        };
        let base = SchemaPath::root(root.url.clone()).child(&["components"]);

        for namespace in COMPONENT_SECTIONS {
            let Some(section) = namespace.component_section() else {
                continue;
            };
            let Some(entries) = components.get(section).and_then(Value::as_object) else {
                continue;
            };
            for (key, raw) in entries {
                let path = base.child(&[section, key]);
                if raw.get("$ref").is_none() && self.entry_schema(*namespace, raw, &path).is_none() {
                    tracing::debug!(component = %path, "component carries no schema, no type emitted");
                    continue;
                }
                self.component_node(&path)?;
            }
        }
        Ok(())
    }

    /// The node for the component at `target`, allocating it on first use.
    fn component_node(&mut self, target: &SchemaPath) -> Result<NodeId, CompileError> {
        if let Some(id) = self.arena.components.get(target) {
            return Ok(*id);
        }

        let (namespace, base_name) = match component_key(&target.pointer) {
            Some(found) => found,
            None => (
                Namespace::Schema,
                last_segment(&target.pointer).unwrap_or_else(|| "Root".to_string()),
            ),
        };

        let id = self.arena.alloc(NewNode {
            origin: target.clone(),
            namespace,
            base_name,
            parent: None,
            declared: true,
            package: self.engine.package_of(&target.document).map(String::from),
        });
        self.arena.components.insert(target.clone(), id);
        self.queue.push_back(id);
        Ok(id)
    }

    fn drain(&mut self) -> Result<(), CompileError> {
        while let Some(id) = self.queue.pop_front() {
            self.normalize_component(id)?;
        }
        Ok(())
    }

    fn normalize_component(&mut self, id: NodeId) -> Result<(), CompileError> {
        let origin = self.arena.node(id).origin.clone();
        let namespace = self.arena.node(id).namespace;
        let raw = self.engine.lookup(&origin).ok_or_else(|| CompileError::RefResolution {
            path: origin.to_string(),
            reference: origin.pointer.clone(),
        })?;

        // A component that is itself a `$ref` is a pure rename.
        if let Some(reference) = raw.get("$ref").and_then(Value::as_str) {
            let target = self.engine.resolve_ref(reference, &origin)?;
            let target_id = self.component_node(&target)?;
            self.apply_metadata(id, raw, &origin)?;
            self.arena.node_mut(id).kind = NodeKind::Type(TypeKind::Alias {
                target: NodeRef::Named(target_id),
            });
            return Ok(());
        }

        let is_entry = component_key(&origin.pointer).is_some();
        let (schema_path, schema) = if is_entry && namespace != Namespace::Schema {
            match self.entry_schema(namespace, raw, &origin) {
                Some(found) => found,
                None => {
                    tracing::warn!(component = %origin, "referenced component has no schema, typed as dynamic");
                    self.arena.node_mut(id).kind = NodeKind::Type(TypeKind::dynamic());
                    return Ok(());
                }
            }
        } else {
            (origin.clone(), raw)
        };

        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            let target = self.engine.resolve_ref(reference, &schema_path)?;
            let target_id = self.component_node(&target)?;
            self.apply_metadata(id, schema, &schema_path)?;
            self.arena.node_mut(id).kind = NodeKind::Type(TypeKind::Alias {
                target: NodeRef::Named(target_id),
            });
            return Ok(());
        }

        self.fill_node(id, schema, &schema_path, 0)
    }

    /// The schema carried by a non-schema component entry (parameter,
    /// header, response, request body).
    fn entry_schema<'v>(
        &self,
        namespace: Namespace,
        raw: &'v Value,
        path: &SchemaPath,
    ) -> Option<(SchemaPath, &'v Value)> {
        match namespace {
            Namespace::Schema => Some((path.clone(), raw)),
            Namespace::Parameter | Namespace::Header => {
                if let Some(schema) = raw.get("schema") {
                    return Some((path.child(&["schema"]), schema));
                }
                media_schema(raw, path)
            }
            Namespace::Response | Namespace::RequestBody => media_schema(raw, path),
            Namespace::Operation | Namespace::Inline => None,
        }
    }

    // -----------------------------------------------------------------------
    // Schemas
    // -----------------------------------------------------------------------

    /// Normalize a schema occurring as a child of `ctx.parent`.
    fn schema_ref(
        &mut self,
        raw: &Value,
        path: &SchemaPath,
        ctx: InlineCtx<'_>,
        depth: usize,
    ) -> Result<NodeRef, CompileError> {
        if let Some(reference) = raw.get("$ref").and_then(Value::as_str) {
            let target = self.engine.resolve_ref(reference, path)?;
            return Ok(NodeRef::Named(self.component_node(&target)?));
        }

        let package = self.arena.node(ctx.parent).package.clone();
        let id = self.arena.alloc(NewNode {
            origin: path.clone(),
            namespace: Namespace::Inline,
            base_name: ctx.suffix.to_string(),
            parent: Some(ctx.parent),
            declared: false,
            package,
        });
        self.fill_node(id, raw, path, depth + 1)?;

        let node = self.arena.node_mut(id);
        node.declared = ctx.declare
            && match &node.kind {
                NodeKind::Type(TypeKind::Object { fields, .. }) => !fields.is_empty(),
                NodeKind::Type(TypeKind::Enum { .. })
                | NodeKind::Type(TypeKind::Union { .. })
                | NodeKind::AllOf(_)
                | NodeKind::Union(_) => true,
                _ => false,
            };
        Ok(NodeRef::Inline(id))
    }

    /// Copy annotations, nullability and extensions onto a node.
    fn apply_metadata(&mut self, id: NodeId, raw: &Value, path: &SchemaPath) -> Result<(), CompileError> {
        let Some(obj) = raw.as_object() else {
            return Ok(());
        };
        let extensions = parse_schema_extensions(obj, path)?;
        let node = self.arena.node_mut(id);
        node.nullable |= flag(obj, "nullable") || extensions.nullable;
        if let Some(description) = obj.get("description").and_then(Value::as_str) {
            node.description = Some(description.to_string());
        }
        node.deprecated |= flag(obj, "deprecated");
        node.read_only |= flag(obj, "readOnly");
        node.write_only |= flag(obj, "writeOnly");
        if let Some(required) = obj.get("required").and_then(Value::as_array) {
            node.required
                .extend(required.iter().filter_map(Value::as_str).map(String::from));
        }
        node.extensions = extensions;
        Ok(())
    }

    fn fill_node(
        &mut self,
        id: NodeId,
        raw: &Value,
        path: &SchemaPath,
        depth: usize,
    ) -> Result<(), CompileError> {
        if depth > self.options.max_depth {
            return Err(CompileError::RecursionDepthExceeded {
                path: path.to_string(),
                max_depth: self.options.max_depth,
            });
        }

        let obj = match raw {
            Value::Object(obj) => obj,
            Value::Bool(true) => {
                self.arena.node_mut(id).kind = NodeKind::Type(TypeKind::dynamic());
                return Ok(());
            }
            Value::Bool(false) => {
                return Err(CompileError::invalid(path, "the `false` schema admits no values"));
            }
            other => {
                return Err(CompileError::invalid(
                    path,
                    format!("expected a schema object, found {other}"),
                ));
            }
        };

        self.apply_metadata(id, raw, path)?;
        let kind = self.build_kind(id, obj, path, depth)?;
        self.arena.node_mut(id).kind = kind;
        Ok(())
    }

    fn build_kind(
        &mut self,
        id: NodeId,
        obj: &Map<String, Value>,
        path: &SchemaPath,
        depth: usize,
    ) -> Result<NodeKind, CompileError> {
        let (types, type_nullable) = parse_type(obj.get("type"), path)?;
        if type_nullable {
            self.arena.node_mut(id).nullable = true;
        }

        let has_all_of = obj.contains_key("allOf");
        let one_of = obj.get("oneOf");
        let any_of = obj.get("anyOf");

        if has_all_of {
            if one_of.is_some() || any_of.is_some() {
                return Err(CompileError::merge(
                    path,
                    "allOf combined with oneOf/anyOf on one schema is not supported",
                ));
            }
            return self.build_all_of(id, obj, path, depth);
        }

        match (one_of, any_of) {
            (Some(_), Some(_)) => {
                return Err(CompileError::union(
                    path,
                    "oneOf and anyOf on the same schema are not supported",
                ));
            }
            (Some(members), None) => {
                return self.build_union(id, obj, members, UnionMode::OneOf, path, depth);
            }
            (None, Some(members)) => {
                return self.build_union(id, obj, members, UnionMode::AnyOf, path, depth);
            }
            (None, None) => {}
        }

        if let Some(values) = obj.get("enum").and_then(Value::as_array) {
            return self.build_enum(id, values, &types, path);
        }
        if let Some(value) = obj.get("const") {
            return self.build_enum(id, std::slice::from_ref(value), &types, path);
        }

        let looks_like_object = obj.contains_key("properties") || obj.contains_key("additionalProperties");
        match types.as_slice() {
            [] if looks_like_object => self.build_object(id, obj, path, depth),
            [] => Ok(NodeKind::Type(TypeKind::dynamic())),
            [single] => match single.as_str() {
                "object" => self.build_object(id, obj, path, depth),
                "array" => self.build_array(id, obj, path, depth),
                keyword => match ScalarKind::from_type_keyword(keyword) {
                    Some(scalar) => Ok(NodeKind::Type(TypeKind::Scalar {
                        scalar,
                        format: obj
                            .get("format")
                            .and_then(Value::as_str)
                            .map(|f| Format::from(f.to_string())),
                    })),
                    None => Err(CompileError::invalid(path, format!("unknown type '{keyword}'"))),
                },
            },
            many => {
                tracing::debug!(path = %path, types = ?many, "multi-type schema typed as dynamic");
                Ok(NodeKind::Type(TypeKind::dynamic()))
            }
        }
    }

    fn build_object(
        &mut self,
        id: NodeId,
        obj: &Map<String, Value>,
        path: &SchemaPath,
        depth: usize,
    ) -> Result<NodeKind, CompileError> {
        let fields = self.build_fields(id, obj, path, depth)?;
        let additional_properties = self.build_additional(id, obj, path, depth)?;
        Ok(NodeKind::Type(TypeKind::Object {
            fields,
            additional_properties,
        }))
    }

    fn build_fields(
        &mut self,
        owner: NodeId,
        obj: &Map<String, Value>,
        path: &SchemaPath,
        depth: usize,
    ) -> Result<Vec<Field>, CompileError> {
        let Some(properties) = obj.get("properties") else {
            return Ok(Vec::new());
        };
        let properties = properties
            .as_object()
            .ok_or_else(|| CompileError::invalid(path, "`properties` must be an object"))?;
        let required: IndexSet<&str> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut fields = Vec::with_capacity(properties.len());
        for (key, prop) in properties {
            let prop_path = path.child(&["properties", key]);
            let empty = Map::new();
            let prop_obj = prop.as_object().unwrap_or(&empty);
            let options = parse_field_options(prop_obj, &prop_path)?;
            if options.ignore {
                tracing::debug!(field = %prop_path, "field ignored by extension");
                continue;
            }

            let schema = self.schema_ref(
                prop,
                &prop_path,
                InlineCtx {
                    parent: owner,
                    suffix: key,
                    declare: true,
                },
                depth,
            )?;
            let inline_nullable = match schema {
                NodeRef::Inline(child) => self.arena.node(child).nullable,
                _ => false,
            };

            fields.push(Field {
                name: key.clone(),
                ident: String::new(),
                schema,
                required: required.contains(key.as_str()),
                nullable: inline_nullable
                    || flag(prop_obj, "nullable")
                    || flag(prop_obj, crate::extensions::X_NULLABLE),
                read_only: flag(prop_obj, "readOnly"),
                write_only: flag(prop_obj, "writeOnly"),
                deprecated: flag(prop_obj, "deprecated"),
                description: prop_obj
                    .get("description")
                    .and_then(Value::as_str)
                    .map(String::from),
                options,
                origin: prop_path,
            });
        }
        Ok(fields)
    }

    fn build_additional(
        &mut self,
        owner: NodeId,
        obj: &Map<String, Value>,
        path: &SchemaPath,
        depth: usize,
    ) -> Result<AdditionalProperties, CompileError> {
        match obj.get("additionalProperties") {
            None => Ok(AdditionalProperties::Unspecified),
            Some(Value::Bool(true)) => Ok(AdditionalProperties::Any),
            Some(Value::Bool(false)) => Ok(AdditionalProperties::Forbidden),
            Some(Value::Object(schema)) if schema.is_empty() => Ok(AdditionalProperties::Any),
            Some(schema @ Value::Object(_)) => {
                let child_path = path.child(&["additionalProperties"]);
                let child = self.schema_ref(
                    schema,
                    &child_path,
                    InlineCtx {
                        parent: owner,
                        suffix: "AdditionalProperties",
                        declare: true,
                    },
                    depth,
                )?;
                Ok(AdditionalProperties::Typed(child))
            }
            Some(other) => Err(CompileError::invalid(
                path,
                format!("additionalProperties must be a boolean or schema, found {other}"),
            )),
        }
    }

    fn build_array(
        &mut self,
        id: NodeId,
        obj: &Map<String, Value>,
        path: &SchemaPath,
        depth: usize,
    ) -> Result<NodeKind, CompileError> {
        let element = match obj.get("items") {
            Some(items) => self.schema_ref(
                items,
                &path.child(&["items"]),
                InlineCtx {
                    parent: id,
                    suffix: "Item",
                    declare: true,
                },
                depth,
            )?,
            None => {
                let package = self.arena.node(id).package.clone();
                let child = self.arena.alloc(NewNode {
                    origin: path.child(&["items"]),
                    namespace: Namespace::Inline,
                    base_name: "Item".to_string(),
                    parent: Some(id),
                    declared: false,
                    package,
                });
                self.arena.node_mut(child).kind = NodeKind::Type(TypeKind::dynamic());
                NodeRef::Inline(child)
            }
        };
        Ok(NodeKind::Type(TypeKind::Array { element }))
    }

    fn build_enum(
        &mut self,
        id: NodeId,
        values: &[Value],
        types: &[String],
        path: &SchemaPath,
    ) -> Result<NodeKind, CompileError> {
        let literals: Vec<Value> = values.iter().filter(|v| !v.is_null()).cloned().collect();
        if literals.len() != values.len() {
            self.arena.node_mut(id).nullable = true;
        }
        if literals.is_empty() {
            return Err(CompileError::invalid(path, "enum has no non-null values"));
        }

        let scalar = match types.first().and_then(|t| ScalarKind::from_type_keyword(t)) {
            Some(kind) => kind,
            None => infer_scalar(&literals),
        };

        if let Some(names) = &self.arena.node(id).extensions.enum_names {
            if names.len() != literals.len() {
                return Err(CompileError::invalid(
                    path,
                    format!(
                        "x-enum-names has {} entries for {} enum values",
                        names.len(),
                        literals.len()
                    ),
                ));
            }
        }

        Ok(NodeKind::Type(TypeKind::Enum {
            scalar,
            values: literals
                .into_iter()
                .map(|literal| crate::ir::EnumConstant {
                    ident: String::new(),
                    literal,
                })
                .collect(),
        }))
    }

    fn build_all_of(
        &mut self,
        id: NodeId,
        obj: &Map<String, Value>,
        path: &SchemaPath,
        depth: usize,
    ) -> Result<NodeKind, CompileError> {
        let members_raw = obj
            .get("allOf")
            .and_then(Value::as_array)
            .ok_or_else(|| CompileError::invalid(path, "`allOf` must be an array"))?;

        let mut members = Vec::with_capacity(members_raw.len());
        for (i, member) in members_raw.iter().enumerate() {
            let member_path = path.child(&["allOf", &i.to_string()]);
            let schema = self.schema_ref(
                member,
                &member_path,
                InlineCtx {
                    parent: id,
                    suffix: "",
                    declare: false,
                },
                depth,
            )?;
            members.push(AllOfMember {
                schema,
                path: member_path,
            });
        }

        let local_fields = self.build_fields(id, obj, path, depth)?;
        let local_additional = self.build_additional(id, obj, path, depth)?;
        Ok(NodeKind::AllOf(PendingAllOf {
            members,
            local_fields,
            local_additional,
        }))
    }

    fn build_union(
        &mut self,
        id: NodeId,
        obj: &Map<String, Value>,
        members_raw: &Value,
        mode: UnionMode,
        path: &SchemaPath,
        depth: usize,
    ) -> Result<NodeKind, CompileError> {
        let keyword = match mode {
            UnionMode::OneOf => "oneOf",
            UnionMode::AnyOf => "anyOf",
        };
        let members_raw = members_raw
            .as_array()
            .ok_or_else(|| CompileError::invalid(path, format!("`{keyword}` must be an array")))?;
        if obj.contains_key("properties") {
            tracing::warn!(path = %path, "properties declared alongside {keyword} are ignored");
        }

        let discriminator = match obj.get("discriminator") {
            Some(raw) => Some(parse_discriminator(raw, &path.child(&["discriminator"]))?),
            None => None,
        };

        // `{type: "null"}` members only make the union nullable.
        let mut live: Vec<(usize, &Value)> = Vec::new();
        for (i, member) in members_raw.iter().enumerate() {
            if member.get("type").and_then(Value::as_str) == Some("null") {
                self.arena.node_mut(id).nullable = true;
            } else {
                live.push((i, member));
            }
        }

        if live.is_empty() {
            return Ok(NodeKind::Type(TypeKind::dynamic()));
        }
        if live.len() == 1 && discriminator.is_none() {
            let (i, member) = live[0];
            let member_path = path.child(&[keyword, &i.to_string()]);
            if let Some(reference) = member.get("$ref").and_then(Value::as_str) {
                let target = self.engine.resolve_ref(reference, &member_path)?;
                return Ok(NodeKind::Type(TypeKind::Alias {
                    target: NodeRef::Named(self.component_node(&target)?),
                }));
            }
            let member_obj = member
                .as_object()
                .ok_or_else(|| CompileError::invalid(&member_path, "union member must be a schema object"))?;
            self.apply_metadata(id, member, &member_path)?;
            return self.build_kind(id, member_obj, &member_path, depth + 1);
        }

        let mut members = Vec::with_capacity(live.len());
        for (i, member) in live {
            let member_path = path.child(&[keyword, &i.to_string()]);
            let title = member.get("title").and_then(Value::as_str).map(String::from);
            let suffix = title.clone().unwrap_or_else(|| member_hint(member).to_string());
            let schema = self.schema_ref(
                member,
                &member_path,
                InlineCtx {
                    parent: id,
                    suffix: &suffix,
                    declare: true,
                },
                depth,
            )?;
            members.push(UnionMember {
                schema,
                title,
                path: member_path,
            });
        }

        Ok(NodeKind::Union(PendingUnion {
            mode,
            members,
            discriminator,
        }))
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    fn walk_operations(&mut self) -> Result<(), CompileError> {
        let root = self.engine.root_document();
        let Some(paths) = root.root.get("paths").and_then(Value::as_object) else {
            return Ok(());
        };
        let paths_base = SchemaPath::root(root.url.clone()).child(&["paths"]);

        for (route, item) in paths {
            let mut item_path = paths_base.child(&[route]);
            let mut item = item;
            if let Some(reference) = item.get("$ref").and_then(Value::as_str) {
                item_path = self.engine.resolve_ref(reference, &item_path)?;
                item = self.engine.lookup(&item_path).ok_or_else(|| CompileError::RefResolution {
                    path: item_path.to_string(),
                    reference: reference.to_string(),
                })?;
            }

            let shared_params = item.get("parameters").and_then(Value::as_array);
            for method in HTTP_METHODS {
                let Some(operation) = item.get(*method) else {
                    continue;
                };
                let op_path = item_path.child(&[method]);
                let shared = shared_params.map(|p| (p, item_path.child(&["parameters"])));
                self.walk_operation(route, method, operation, shared, &op_path)?;
            }
        }
        Ok(())
    }

    fn walk_operation(
        &mut self,
        route: &str,
        method: &str,
        operation: &Value,
        shared_params: Option<(&Vec<Value>, SchemaPath)>,
        op_path: &SchemaPath,
    ) -> Result<(), CompileError> {
        let operation_id = operation
            .get("operationId")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("{method} {route}"));
        let tags: Vec<String> = operation
            .get("tags")
            .and_then(Value::as_array)
            .map(|t| t.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();

        if !self.options.operations.accepts(&operation_id, &tags) {
            tracing::debug!(operation = %operation_id, "operation filtered out");
            return Ok(());
        }

        let params = self.operation_params(&operation_id, operation, shared_params, op_path)?;
        let request_body = match operation.get("requestBody") {
            Some(body) => self.operation_body(
                &format!("{operation_id} RequestBody"),
                body,
                Namespace::RequestBody,
                &op_path.child(&["requestBody"]),
            )?,
            None => None,
        };

        let mut responses = indexmap::IndexMap::new();
        if let Some(raw_responses) = operation.get("responses").and_then(Value::as_object) {
            for (status, response) in raw_responses {
                let name = format!("{operation_id} {status} Response");
                if let Some(body) = self.operation_body(
                    &name,
                    response,
                    Namespace::Response,
                    &op_path.child(&["responses", status]),
                )? {
                    responses.insert(status.clone(), body);
                }
            }
        }

        self.arena.operations.push(OperationTypes {
            operation_id,
            method: method.to_string(),
            path: route.to_string(),
            tags,
            params,
            request_body,
            responses,
        });
        Ok(())
    }

    /// Synthesise the `{OperationId}Params` record.
    fn operation_params(
        &mut self,
        operation_id: &str,
        operation: &Value,
        shared_params: Option<(&Vec<Value>, SchemaPath)>,
        op_path: &SchemaPath,
    ) -> Result<Option<NodeId>, CompileError> {
        // (location, name) → (raw parameter, its path, component it came from)
        let mut merged: indexmap::IndexMap<(String, String), (&Value, SchemaPath, Option<SchemaPath>)> =
            indexmap::IndexMap::new();
        let own_params = operation
            .get("parameters")
            .and_then(Value::as_array)
            .map(|p| (p, op_path.child(&["parameters"])));
        for (list, list_path) in shared_params.into_iter().chain(own_params) {
            for (i, raw) in list.iter().enumerate() {
                let mut param_path = list_path.child(&[&i.to_string()]);
                let mut param = raw;
                let mut component = None;
                if let Some(reference) = raw.get("$ref").and_then(Value::as_str) {
                    param_path = self.engine.resolve_ref(reference, &param_path)?;
                    param = self.engine.lookup(&param_path).ok_or_else(|| CompileError::RefResolution {
                        path: param_path.to_string(),
                        reference: reference.to_string(),
                    })?;
                    component = Some(param_path.clone());
                }
                let name = param
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CompileError::invalid(&param_path, "parameter without a name"))?;
                let location = param.get("in").and_then(Value::as_str).unwrap_or("query");
                merged.insert(
                    (location.to_string(), name.to_string()),
                    (param, param_path, component),
                );
            }
        }

        if merged.is_empty() {
            return Ok(None);
        }

        let params_id = self.arena.alloc(NewNode {
            origin: op_path.child(&["parameters"]),
            namespace: Namespace::Operation,
            base_name: format!("{operation_id} Params"),
            parent: None,
            declared: true,
            package: None,
        });

        let mut fields = Vec::with_capacity(merged.len());
        for ((location, name), (param, param_path, component)) in merged {
            let empty = Map::new();
            let param_obj = param.as_object().unwrap_or(&empty);
            let schema = match (&component, self.entry_schema(Namespace::Parameter, param, &param_path)) {
                (Some(entry), Some(_)) => NodeRef::Named(self.component_node(entry)?),
                (None, Some((schema_path, schema))) => self.schema_ref(
                    schema,
                    &schema_path,
                    InlineCtx {
                        parent: params_id,
                        suffix: &name,
                        declare: true,
                    },
                    0,
                )?,
                (_, None) => {
                    return Err(CompileError::invalid(
                        &param_path,
                        "parameter has neither `schema` nor `content`",
                    ));
                }
            };
            let schema_nullable = match schema {
                NodeRef::Inline(child) => self.arena.node(child).nullable,
                _ => false,
            };
            fields.push(Field {
                name,
                ident: String::new(),
                schema,
                required: location == "path" || flag(param_obj, "required"),
                nullable: schema_nullable,
                read_only: false,
                write_only: false,
                deprecated: flag(param_obj, "deprecated"),
                description: param_obj
                    .get("description")
                    .and_then(Value::as_str)
                    .map(String::from),
                options: parse_field_options(param_obj, &param_path)?,
                origin: param_path,
            });
        }

        self.arena.node_mut(params_id).kind = NodeKind::Type(TypeKind::Object {
            fields,
            additional_properties: AdditionalProperties::Forbidden,
        });
        Ok(Some(params_id))
    }

    /// Type of a request body or response: a component use, or a
    /// synthesised declared node for an inline schema.
    fn operation_body(
        &mut self,
        name: &str,
        raw: &Value,
        section: Namespace,
        path: &SchemaPath,
    ) -> Result<Option<NodeRef>, CompileError> {
        if let Some(reference) = raw.get("$ref").and_then(Value::as_str) {
            let entry = self.engine.resolve_ref(reference, path)?;
            let Some(entry_raw) = self.engine.lookup(&entry) else {
                return Ok(None);
            };
            if entry_raw.get("$ref").is_none() && self.entry_schema(section, entry_raw, &entry).is_none() {
                return Ok(None);
            }
            return Ok(Some(NodeRef::Named(self.component_node(&entry)?)));
        }

        let Some((schema_path, schema)) = media_schema(raw, path) else {
            return Ok(None);
        };
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            let target = self.engine.resolve_ref(reference, &schema_path)?;
            return Ok(Some(NodeRef::Named(self.component_node(&target)?)));
        }

        let id = self.arena.alloc(NewNode {
            origin: schema_path.clone(),
            namespace: Namespace::Operation,
            base_name: name.to_string(),
            parent: None,
            declared: true,
            package: None,
        });
        self.fill_node(id, schema, &schema_path, 0)?;
        Ok(Some(NodeRef::Named(id)))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// `(namespace, key)` for a pointer of the form `#/components/{section}/{key}`.
fn component_key(pointer: &str) -> Option<(Namespace, String)> {
    let segments = split_path(pointer);
    let [components, section, key] = segments.as_slice() else {
        return None;
    };
    if components != "components" {
        return None;
    }
    let namespace = COMPONENT_SECTIONS
        .iter()
        .find(|ns| ns.component_section() == Some(section.as_str()))?;
    Some((*namespace, key.clone()))
}

/// Pick the schema of the preferred media type in a `content` map: JSON
/// first (`application/json`, then any `+json`/`json` type), else the first.
fn media_schema<'v>(raw: &'v Value, path: &SchemaPath) -> Option<(SchemaPath, &'v Value)> {
    let content = raw.get("content")?.as_object()?;
    let chosen = content
        .iter()
        .find(|(media, _)| media.as_str() == "application/json")
        .or_else(|| content.iter().find(|(media, _)| media.contains("json")))
        .or_else(|| content.iter().next())?;
    let (media, entry) = chosen;
    let schema = entry.get("schema")?;
    Some((path.child(&["content", media, "schema"]), schema))
}

/// Parse `type` (string or array) into non-null keywords plus a null flag.
fn parse_type(raw: Option<&Value>, path: &SchemaPath) -> Result<(Vec<String>, bool), CompileError> {
    match raw {
        None => Ok((Vec::new(), false)),
        Some(Value::String(s)) if s == "null" => Ok((Vec::new(), true)),
        Some(Value::String(s)) => Ok((vec![s.clone()], false)),
        Some(Value::Array(items)) => {
            let mut types = Vec::new();
            let mut nullable = false;
            for item in items {
                match item.as_str() {
                    Some("null") => nullable = true,
                    Some(t) => types.push(t.to_string()),
                    None => return Err(CompileError::invalid(path, "`type` entries must be strings")),
                }
            }
            Ok((types, nullable))
        }
        Some(other) => Err(CompileError::invalid(
            path,
            format!("`type` must be a string or array, found {other}"),
        )),
    }
}

fn parse_discriminator(raw: &Value, path: &SchemaPath) -> Result<RawDiscriminator, CompileError> {
    let property_name = raw
        .get("propertyName")
        .and_then(Value::as_str)
        .ok_or_else(|| CompileError::invalid(path, "discriminator needs a propertyName"))?;
    let mapping = match raw.get("mapping") {
        None => indexmap::IndexMap::new(),
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(value, target)| {
                target
                    .as_str()
                    .map(|t| (value.clone(), t.to_string()))
                    .ok_or_else(|| CompileError::invalid(path, "discriminator mapping targets must be strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(CompileError::invalid(path, "discriminator mapping must be an object")),
    };
    Ok(RawDiscriminator {
        property_name: property_name.to_string(),
        mapping,
        path: path.clone(),
    })
}

fn infer_scalar(literals: &[Value]) -> ScalarKind {
    let kind_of = |v: &Value| match v {
        Value::String(_) => ScalarKind::String,
        Value::Bool(_) => ScalarKind::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => ScalarKind::Integer,
        Value::Number(_) => ScalarKind::Number,
        _ => ScalarKind::Dynamic,
    };
    let first = kind_of(&literals[0]);
    if literals.iter().all(|v| kind_of(v) == first) {
        first
    } else {
        ScalarKind::Dynamic
    }
}

/// Name hint for an inline union member without a title.
fn member_hint(raw: &Value) -> &'static str {
    match raw.get("type").and_then(Value::as_str) {
        Some("string") => "String",
        Some("integer") => "Integer",
        Some("number") => "Number",
        Some("boolean") => "Boolean",
        Some("array") => "Array",
        Some("object") => "Object",
        _ if raw.get("properties").is_some() => "Object",
        _ => "Value",
    }
}

// ===========================================================================
// Tests
// ===========================================================================
