//! JSON → [`Instance`] against a frozen [`TypeGraph`].

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{DecodeOptions, ProbeOrder};
use crate::graph::TypeGraph;
use crate::ir::{
    AdditionalProperties, Discriminator, Field, NodeId, NodeRef, ScalarKind, TypeKind, UnionMode,
    Variant,
};
use crate::schema_utils::{build_path, json_type_name};

use super::formats::check_format;
use super::union::{UnionError, UnionValue};
use super::value::{Instance, Presence, Record};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{path}: missing required field '{field}'")]
    MissingField { path: String, field: String },

    #[error("{path}: null is not allowed here")]
    UnexpectedNull { path: String },

    #[error("{path}: unknown field '{field}'")]
    UnknownField { path: String, field: String },

    #[error("{path}: {value} is not a member of the enum")]
    NotInEnum { path: String, value: Value },

    #[error("{path}: '{value}' is not a valid {format}")]
    InvalidFormat {
        path: String,
        format: String,
        value: String,
    },

    #[error("{path}: no union variant matched")]
    NoVariantMatched { path: String },

    #[error("{path}: {source}")]
    Union {
        path: String,
        #[source]
        source: UnionError,
    },

    #[error("{path}: payload nested deeper than {max_depth}")]
    DepthExceeded { path: String, max_depth: usize },

    #[error("no declared type named '{name}'")]
    UnknownType { name: String },
}

/// Decodes JSON payloads into [`Instance`]s.
pub struct Decoder<'g> {
    graph: &'g TypeGraph,
    options: &'g DecodeOptions,
}

impl<'g> Decoder<'g> {
    pub fn new(graph: &'g TypeGraph, options: &'g DecodeOptions) -> Self {
        Self { graph, options }
    }

    /// Decode `value` as the declared type `type_name`.
    pub fn decode_type(&self, type_name: &str, value: &Value) -> Result<Instance, DecodeError> {
        let node = self.graph.get(type_name).ok_or_else(|| DecodeError::UnknownType {
            name: type_name.to_string(),
        })?;
        self.decode(node.id, value)
    }

    /// Decode `value` as the node `id`.
    pub fn decode(&self, id: NodeId, value: &Value) -> Result<Instance, DecodeError> {
        self.decode_node(id, value, "#", 0)
    }

    fn decode_node(
        &self,
        id: NodeId,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Instance, DecodeError> {
        if depth > self.options.max_depth {
            return Err(DecodeError::DepthExceeded {
                path: path.to_string(),
                max_depth: self.options.max_depth,
            });
        }
        let node = self.graph.node(id);

        if value.is_null() {
            return match &node.kind {
                TypeKind::Union { .. } => UnionValue::empty(self.graph, id)
                    .map(Instance::Union)
                    .map_err(|source| union_error(path, source)),
                TypeKind::Scalar {
                    scalar: ScalarKind::Dynamic,
                    ..
                } => Ok(Instance::Dynamic(Value::Null)),
                _ if self.graph.is_nullable(NodeRef::Named(id)) => Ok(Instance::Null),
                TypeKind::Alias { target } => self.decode_node(target.id(), value, path, depth),
                _ => Err(DecodeError::UnexpectedNull {
                    path: path.to_string(),
                }),
            };
        }

        match &node.kind {
            TypeKind::Scalar { scalar, format } => {
                let instance = decode_scalar(*scalar, value, path)?;
                if let (Some(format), Instance::String(s)) = (format, &instance) {
                    if self.options.check_formats && !check_format(format, s) {
                        return Err(DecodeError::InvalidFormat {
                            path: path.to_string(),
                            format: String::from(format.clone()),
                            value: s.clone(),
                        });
                    }
                }
                Ok(instance)
            }
            TypeKind::Enum { values, .. } => values
                .iter()
                .find(|c| literal_matches(&c.literal, value))
                .map(|c| Instance::Enum {
                    constant: c.ident.clone(),
                    literal: c.literal.clone(),
                })
                .ok_or_else(|| DecodeError::NotInEnum {
                    path: path.to_string(),
                    value: value.clone(),
                }),
            TypeKind::Array { element } => {
                let items = value.as_array().ok_or_else(|| mismatch(path, "array", value))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let item_path = build_path(path, &[&i.to_string()]);
                        self.decode_node(element.id(), item, &item_path, depth + 1)
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Instance::Array)
            }
            TypeKind::Object {
                fields,
                additional_properties,
            } => {
                let object = value.as_object().ok_or_else(|| mismatch(path, "object", value))?;
                self.decode_record(id, fields, additional_properties, object, path, depth, None)
                    .map(Instance::Record)
            }
            TypeKind::Union {
                mode,
                variants,
                discriminator,
            } => self.decode_union(id, *mode, variants, discriminator.as_ref(), value, path, depth),
            TypeKind::Alias { target } => self.decode_node(target.id(), value, path, depth),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_record(
        &self,
        id: NodeId,
        fields: &[Field],
        additional: &AdditionalProperties,
        object: &Map<String, Value>,
        path: &str,
        depth: usize,
        discriminator_key: Option<&str>,
    ) -> Result<Record, DecodeError> {
        let mut record = Record::new(id);

        for field in fields {
            let field_path = build_path(path, &[&field.name]);
            let presence = match object.get(&field.name) {
                None if field.required => {
                    return Err(DecodeError::MissingField {
                        path: path.to_string(),
                        field: field.name.clone(),
                    });
                }
                None => Presence::Absent,
                Some(Value::Null) if field.nullable => Presence::Null,
                Some(Value::Null) => {
                    match self.decode_node(field.schema.id(), &Value::Null, &field_path, depth + 1) {
                        Ok(instance) => Presence::Value(instance),
                        // Lenient: an explicit null on an optional field reads as absent.
                        Err(DecodeError::UnexpectedNull { .. }) if !field.required => Presence::Absent,
                        Err(err) => return Err(err),
                    }
                }
                Some(v) => Presence::Value(self.decode_node(
                    field.schema.id(),
                    v,
                    &field_path,
                    depth + 1,
                )?),
            };
            record.fields.insert(field.name.clone(), presence);
        }

        for (key, v) in object {
            if fields.iter().any(|f| &f.name == key) || discriminator_key == Some(key.as_str()) {
                continue;
            }
            match additional {
                AdditionalProperties::Any => {
                    record.additional.insert(key.clone(), Instance::Dynamic(v.clone()));
                }
                AdditionalProperties::Typed(schema) => {
                    let key_path = build_path(path, &[key]);
                    let instance = self.decode_node(schema.id(), v, &key_path, depth + 1)?;
                    record.additional.insert(key.clone(), instance);
                }
                AdditionalProperties::Forbidden | AdditionalProperties::Unspecified => {
                    if self.options.deny_unknown_fields {
                        return Err(DecodeError::UnknownField {
                            path: path.to_string(),
                            field: key.clone(),
                        });
                    }
                }
            }
        }
        Ok(record)
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_union(
        &self,
        id: NodeId,
        mode: UnionMode,
        variants: &[Variant],
        discriminator: Option<&Discriminator>,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Instance, DecodeError> {
        let mut union = UnionValue::empty(self.graph, id).map_err(|e| union_error(path, e))?;

        if let (Some(discriminator), Some(object)) = (discriminator, value.as_object()) {
            let property = discriminator.property_name.as_str();
            let tag = match object.get(property) {
                None => {
                    return Err(union_error(
                        path,
                        UnionError::MissingDiscriminator {
                            property: property.to_string(),
                        },
                    ));
                }
                Some(Value::String(tag)) => tag,
                Some(other) => {
                    return Err(mismatch(&build_path(path, &[property]), "string", other));
                }
            };
            // Unmapped values may still name a variant directly.
            let index = discriminator
                .mapping
                .get(tag)
                .copied()
                .or_else(|| variants.iter().position(|v| &v.name == tag))
                .ok_or_else(|| {
                    union_error(path, UnionError::UnknownDiscriminator { value: tag.clone() })
                })?;
            let instance =
                self.decode_variant(variants[index].schema, value, path, depth + 1, Some(property))?;
            union.set_index(index, instance);
            union.set_discriminator(tag.clone());
            return Ok(Instance::Union(union));
        }

        let mut matched = false;
        for index in self.probe_order(variants) {
            // A failed probe is not an error; the next variant is tried.
            if let Ok(instance) = self.decode_variant(variants[index].schema, value, path, depth + 1, None) {
                union.set_index(index, instance);
                matched = true;
                if mode == UnionMode::OneOf {
                    break;
                }
            }
        }
        if !matched {
            return Err(DecodeError::NoVariantMatched {
                path: path.to_string(),
            });
        }
        Ok(Instance::Union(union))
    }

    /// Decode one union member; a record member skips the discriminator key.
    fn decode_variant(
        &self,
        edge: NodeRef,
        value: &Value,
        path: &str,
        depth: usize,
        discriminator_key: Option<&str>,
    ) -> Result<Instance, DecodeError> {
        let target = self.graph.resolve(edge);
        match (&target.kind, value.as_object()) {
            (
                TypeKind::Object {
                    fields,
                    additional_properties,
                },
                Some(object),
            ) => self
                .decode_record(
                    target.id,
                    fields,
                    additional_properties,
                    object,
                    path,
                    depth,
                    discriminator_key,
                )
                .map(Instance::Record),
            _ => self.decode_node(edge.id(), value, path, depth),
        }
    }

    fn probe_order(&self, variants: &[Variant]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..variants.len()).collect();
        if self.options.probe_order == ProbeOrder::MostSpecificFirst {
            order.sort_by_key(|&i| match &self.graph.resolve(variants[i].schema).kind {
                TypeKind::Object { fields, .. } => {
                    (0, usize::MAX - fields.iter().filter(|f| f.required).count())
                }
                TypeKind::Scalar {
                    scalar: ScalarKind::Dynamic,
                    ..
                } => (2, 0),
                _ => (1, 0),
            });
        }
        order
    }
}

/// Decode `value` as the declared type `type_name`.
pub fn decode(
    graph: &TypeGraph,
    type_name: &str,
    value: &Value,
    options: &DecodeOptions,
) -> Result<Instance, DecodeError> {
    Decoder::new(graph, options).decode_type(type_name, value)
}

fn decode_scalar(scalar: ScalarKind, value: &Value, path: &str) -> Result<Instance, DecodeError> {
    match scalar {
        ScalarKind::Dynamic => Ok(Instance::Dynamic(value.clone())),
        ScalarKind::String => value
            .as_str()
            .map(|s| Instance::String(s.to_string()))
            .ok_or_else(|| mismatch(path, "string", value)),
        ScalarKind::Integer => value
            .as_i64()
            .map(Instance::Integer)
            .ok_or_else(|| mismatch(path, "integer", value)),
        ScalarKind::Number => value
            .as_f64()
            .map(Instance::Number)
            .ok_or_else(|| mismatch(path, "number", value)),
        ScalarKind::Boolean => value
            .as_bool()
            .map(Instance::Bool)
            .ok_or_else(|| mismatch(path, "boolean", value)),
    }
}

/// Numeric literals compare by value, so `1` matches `1.0`.
fn literal_matches(literal: &Value, value: &Value) -> bool {
    match (literal, value) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => literal == value,
    }
}

fn mismatch(path: &str, expected: &'static str, found: &Value) -> DecodeError {
    DecodeError::TypeMismatch {
        path: path.to_string(),
        expected,
        found: json_type_name(found),
    }
}

fn union_error(path: &str, source: UnionError) -> DecodeError {
    DecodeError::Union {
        path: path.to_string(),
        source,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_document;
    use crate::config::CompileOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn graph(schemas: Value) -> TypeGraph {
        compile_document(
            &json!({ "components": { "schemas": schemas } }),
            &CompileOptions::default(),
        )
        .unwrap()
    }

    fn presence_graph() -> TypeGraph {
        graph(json!({
            "Thing": {
                "type": "object",
                "required": ["a", "c"],
                "properties": {
                    "a": { "type": "string" },
                    "b": { "type": "string" },
                    "c": { "type": "string", "nullable": true },
                    "d": { "type": "string", "nullable": true }
                }
            }
        }))
    }

    #[test]
    fn test_four_presence_states() {
        let g = presence_graph();
        let opts = DecodeOptions::default();
        let value = decode(&g, "Thing", &json!({ "a": "x", "c": null, "d": null }), &opts).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.value("a"), Some(&Instance::String("x".into())));
        assert_eq!(record.get("b"), Some(&Presence::Absent));
        assert_eq!(record.get("c"), Some(&Presence::Null));
        assert_eq!(record.get("d"), Some(&Presence::Null));

        let value = decode(&g, "Thing", &json!({ "a": "x", "c": "y" }), &opts).unwrap();
        assert_eq!(value.as_record().unwrap().get("d"), Some(&Presence::Absent));
    }

    #[test]
    fn test_missing_required_and_null_required() {
        let g = presence_graph();
        let opts = DecodeOptions::default();
        let err = decode(&g, "Thing", &json!({ "c": null }), &opts).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                path: "#".into(),
                field: "a".into()
            }
        );
        let err = decode(&g, "Thing", &json!({ "a": null, "c": null }), &opts).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedNull { path: "#/a".into() });
    }

    #[test]
    fn test_null_on_optional_non_nullable_reads_absent() {
        let g = presence_graph();
        let value = decode(
            &g,
            "Thing",
            &json!({ "a": "x", "b": null, "c": null }),
            &DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(value.as_record().unwrap().get("b"), Some(&Presence::Absent));
    }

    #[test]
    fn test_unknown_fields() {
        let g = presence_graph();
        let payload = json!({ "a": "x", "c": null, "zzz": 1 });
        assert!(decode(&g, "Thing", &payload, &DecodeOptions::default()).is_ok());
        let strict = DecodeOptions {
            deny_unknown_fields: true,
            ..DecodeOptions::default()
        };
        let err = decode(&g, "Thing", &payload, &strict).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownField { field, .. } if field == "zzz"));
    }

    #[test]
    fn test_additional_properties_kept() {
        let g = graph(json!({
            "Labels": { "type": "object", "additionalProperties": { "type": "integer" } }
        }));
        let value = decode(&g, "Labels", &json!({ "x": 1, "y": 2 }), &DecodeOptions::default()).unwrap();
        let record = value.as_record().unwrap();
        assert_eq!(record.additional.len(), 2);
        assert_eq!(record.additional["y"], Instance::Integer(2));

        let err = decode(&g, "Labels", &json!({ "x": "one" }), &DecodeOptions::default()).unwrap_err();
        assert_eq!(
            err,
            DecodeError::TypeMismatch {
                path: "#/x".into(),
                expected: "integer",
                found: "string"
            }
        );
    }

    #[test]
    fn test_enum_and_format() {
        let g = graph(json!({
            "Color": { "type": "string", "enum": ["red", "green"] },
            "When": { "type": "string", "format": "date-time" }
        }));
        let opts = DecodeOptions::default();
        assert_eq!(
            decode(&g, "Color", &json!("green"), &opts).unwrap(),
            Instance::Enum {
                constant: "Green".into(),
                literal: json!("green")
            }
        );
        assert!(matches!(
            decode(&g, "Color", &json!("blue"), &opts),
            Err(DecodeError::NotInEnum { .. })
        ));
        assert!(matches!(
            decode(&g, "When", &json!("yesterday"), &opts),
            Err(DecodeError::InvalidFormat { .. })
        ));
        let lax = DecodeOptions {
            check_formats: false,
            ..DecodeOptions::default()
        };
        assert!(decode(&g, "When", &json!("yesterday"), &lax).is_ok());
    }

    fn pets() -> TypeGraph {
        graph(json!({
            "Cat": { "type": "object", "properties": {
                "kind": { "type": "string" }, "name": { "type": "string" }
            } },
            "Dog": { "type": "object", "properties": { "bark": { "type": "boolean" } } },
            "Pet": {
                "oneOf": [
                    { "$ref": "#/components/schemas/Cat" },
                    { "$ref": "#/components/schemas/Dog" }
                ],
                "discriminator": {
                    "propertyName": "kind",
                    "mapping": {
                        "cat": "#/components/schemas/Cat",
                        "kitten": "#/components/schemas/Cat",
                        "dog": "#/components/schemas/Dog"
                    }
                }
            }
        }))
    }

    #[test]
    fn test_discriminated_union() {
        let g = pets();
        let opts = DecodeOptions::default();
        let value = decode(&g, "Pet", &json!({ "kind": "kitten", "name": "Tom" }), &opts).unwrap();
        let union = value.as_union().unwrap();
        assert_eq!(union.discriminator(), Some("kitten"));
        let cat = union.as_variant("Cat").unwrap().as_record().unwrap();
        assert_eq!(cat.value("name"), Some(&Instance::String("Tom".into())));
        assert_eq!(cat.value("kind"), Some(&Instance::String("kitten".into())));

        let dog = decode(&g, "Pet", &json!({ "kind": "dog", "bark": true }), &opts).unwrap();
        let dog = dog.as_union().unwrap().as_variant("Dog").unwrap().as_record().unwrap();
        assert_eq!(dog.value("bark"), Some(&Instance::Bool(true)));
        assert!(dog.additional.is_empty());

        // Variant name used as the tag when it is not in the mapping.
        let by_name = decode(&g, "Pet", &json!({ "kind": "Dog" }), &opts).unwrap();
        assert!(by_name.as_union().unwrap().as_variant("Dog").is_ok());
    }

    #[test]
    fn test_discriminator_errors() {
        let g = pets();
        let opts = DecodeOptions::default();
        let err = decode(&g, "Pet", &json!({ "kind": "fish" }), &opts).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Union {
                path: "#".into(),
                source: UnionError::UnknownDiscriminator { value: "fish".into() }
            }
        );
        let err = decode(&g, "Pet", &json!({ "name": "Tom" }), &opts).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Union { source: UnionError::MissingDiscriminator { .. }, .. }
        ));
    }

    #[test]
    fn test_null_decodes_to_empty_union() {
        let g = pets();
        let value = decode(&g, "Pet", &Value::Null, &DecodeOptions::default()).unwrap();
        assert!(value.as_union().unwrap().is_empty());
    }

    #[test]
    fn test_probing_undiscriminated_union() {
        let g = graph(json!({
            "Id": { "oneOf": [ { "type": "integer" }, { "type": "string" } ] },
            "Any": { "anyOf": [ { "type": "number" }, { "type": "integer" } ] }
        }));
        let opts = DecodeOptions::default();
        let id = decode(&g, "Id", &json!("abc"), &opts).unwrap();
        assert_eq!(id.as_union().unwrap().set_variants().count(), 1);
        assert!(matches!(
            decode(&g, "Id", &json!(true), &opts),
            Err(DecodeError::NoVariantMatched { .. })
        ));

        let any = decode(&g, "Any", &json!(3), &opts).unwrap();
        assert_eq!(any.as_union().unwrap().set_variants().count(), 2);
    }

    #[test]
    fn test_most_specific_first_probing() {
        let g = graph(json!({
            "Loose": { "type": "object", "properties": { "a": { "type": "string" } } },
            "Strict": { "type": "object", "required": ["a", "b"], "properties": {
                "a": { "type": "string" }, "b": { "type": "string" }
            } },
            "Either": { "oneOf": [
                { "$ref": "#/components/schemas/Loose" },
                { "$ref": "#/components/schemas/Strict" }
            ] }
        }));
        let payload = json!({ "a": "x", "b": "y" });
        let declared = decode(&g, "Either", &payload, &DecodeOptions::default()).unwrap();
        assert!(declared.as_union().unwrap().as_variant("Loose").is_ok());

        let specific = DecodeOptions {
            probe_order: ProbeOrder::MostSpecificFirst,
            ..DecodeOptions::default()
        };
        let value = decode(&g, "Either", &payload, &specific).unwrap();
        assert!(value.as_union().unwrap().as_variant("Strict").is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let g = graph(json!({
            "Node": { "type": "object", "properties": {
                "next": { "$ref": "#/components/schemas/Node" }
            } }
        }));
        let payload = json!({ "next": { "next": { "next": {} } } });
        let opts = DecodeOptions {
            max_depth: 2,
            ..DecodeOptions::default()
        };
        let err = decode(&g, "Node", &payload, &opts).unwrap_err();
        assert!(matches!(err, DecodeError::DepthExceeded { max_depth: 2, .. }));
        assert!(decode(&g, "Node", &payload, &DecodeOptions::default()).is_ok());
    }

    #[test]
    fn test_unknown_type() {
        let g = presence_graph();
        assert_eq!(
            decode(&g, "Nope", &json!({}), &DecodeOptions::default()).unwrap_err(),
            DecodeError::UnknownType { name: "Nope".into() }
        );
    }
}
