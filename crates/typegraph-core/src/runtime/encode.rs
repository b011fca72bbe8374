//! [`Instance`] → JSON against a frozen [`TypeGraph`].
//!
//! Records are written in field declaration order. Absent fields are
//! omitted, `Null` fields are written as `null`, and fields tagged
//! `omit-empty`/`omit-zero` are dropped when their encoded value is empty
//! or zero. A `oneOf` union encodes its single set variant; an `anyOf`
//! union merges the objects of every set variant.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::config::DecodeOptions;
use crate::graph::TypeGraph;
use crate::ir::{AdditionalProperties, Field, NodeId, NodeRef, ScalarKind, TypeKind, UnionMode};
use crate::schema_utils::build_path;

use super::union::{UnionError, UnionValue};
use super::value::{Instance, Presence, Record};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{path}: missing required field '{field}'")]
    MissingField { path: String, field: String },

    #[error("{path}: null is not allowed here")]
    NullNotAllowed { path: String },

    #[error("{path}: field '{field}' is not declared and the type allows no additional properties")]
    UnexpectedField { path: String, field: String },

    #[error("{path}: {value} is not a member of the enum")]
    NotInEnum { path: String, value: Value },

    #[error("{path}: {value} is not a finite number")]
    NonFiniteNumber { path: String, value: f64 },

    #[error("{path}: anyOf variants disagree on '{key}'")]
    IncompatibleVariants { path: String, key: String },

    #[error("{path}: {source}")]
    Union {
        path: String,
        #[source]
        source: UnionError,
    },

    #[error("{path}: value nested deeper than {max_depth}")]
    DepthExceeded { path: String, max_depth: usize },

    #[error("no declared type named '{name}'")]
    UnknownType { name: String },
}

/// Encodes [`Instance`]s back to JSON.
pub struct Encoder<'g> {
    graph: &'g TypeGraph,
    options: &'g DecodeOptions,
}

impl<'g> Encoder<'g> {
    pub fn new(graph: &'g TypeGraph, options: &'g DecodeOptions) -> Self {
        Self { graph, options }
    }

    pub fn encode_type(&self, type_name: &str, instance: &Instance) -> Result<Value, EncodeError> {
        let node = self.graph.get(type_name).ok_or_else(|| EncodeError::UnknownType {
            name: type_name.to_string(),
        })?;
        self.encode(node.id, instance)
    }

    pub fn encode(&self, id: NodeId, instance: &Instance) -> Result<Value, EncodeError> {
        self.encode_node(id, instance, "#", 0)
    }

    fn encode_node(
        &self,
        id: NodeId,
        instance: &Instance,
        path: &str,
        depth: usize,
    ) -> Result<Value, EncodeError> {
        if depth > self.options.max_depth {
            return Err(EncodeError::DepthExceeded {
                path: path.to_string(),
                max_depth: self.options.max_depth,
            });
        }
        let node = self.graph.node(id);

        if let Instance::Null = instance {
            return match &node.kind {
                TypeKind::Scalar {
                    scalar: ScalarKind::Dynamic,
                    ..
                } => Ok(Value::Null),
                _ if self.graph.is_nullable(NodeRef::Named(id)) => Ok(Value::Null),
                _ => Err(EncodeError::NullNotAllowed {
                    path: path.to_string(),
                }),
            };
        }

        match (&node.kind, instance) {
            (TypeKind::Alias { target }, _) => self.encode_node(target.id(), instance, path, depth),
            (
                TypeKind::Scalar {
                    scalar: ScalarKind::Dynamic,
                    ..
                },
                _,
            ) => plain_value(instance, path),
            (TypeKind::Scalar { scalar: ScalarKind::String, .. }, Instance::String(s)) => {
                Ok(Value::String(s.clone()))
            }
            (TypeKind::Scalar { scalar: ScalarKind::Integer, .. }, Instance::Integer(i)) => {
                Ok(Value::from(*i))
            }
            (TypeKind::Scalar { scalar: ScalarKind::Number, .. }, Instance::Integer(i)) => {
                Ok(Value::from(*i))
            }
            (TypeKind::Scalar { scalar: ScalarKind::Number, .. }, Instance::Number(f)) => {
                finite(*f, path)
            }
            (TypeKind::Scalar { scalar: ScalarKind::Boolean, .. }, Instance::Bool(b)) => {
                Ok(Value::Bool(*b))
            }
            (TypeKind::Enum { values, .. }, Instance::Enum { literal, .. }) => {
                if values.iter().any(|c| &c.literal == literal) {
                    Ok(literal.clone())
                } else {
                    Err(EncodeError::NotInEnum {
                        path: path.to_string(),
                        value: literal.clone(),
                    })
                }
            }
            (TypeKind::Array { element }, Instance::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = build_path(path, &[&i.to_string()]);
                    self.encode_node(element.id(), item, &item_path, depth + 1)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (
                TypeKind::Object {
                    fields,
                    additional_properties,
                },
                Instance::Record(record),
            ) => self
                .encode_record(fields, additional_properties, record, path, depth)
                .map(Value::Object),
            (TypeKind::Union { .. }, Instance::Union(union)) => {
                self.encode_union(id, union, path, depth)
            }
            (kind, other) => Err(EncodeError::TypeMismatch {
                path: path.to_string(),
                expected: expected_word(kind),
                found: other.kind_name(),
            }),
        }
    }

    fn encode_record(
        &self,
        fields: &[Field],
        additional: &AdditionalProperties,
        record: &Record,
        path: &str,
        depth: usize,
    ) -> Result<Map<String, Value>, EncodeError> {
        let mut object = Map::new();

        for field in fields {
            let field_path = build_path(path, &[&field.name]);
            match record.get(&field.name).unwrap_or(&Presence::Absent) {
                Presence::Absent if field.required => {
                    return Err(EncodeError::MissingField {
                        path: path.to_string(),
                        field: field.name.clone(),
                    });
                }
                Presence::Absent => {}
                Presence::Null if field.nullable => {
                    object.insert(field.name.clone(), Value::Null);
                }
                Presence::Null => {
                    return Err(EncodeError::NullNotAllowed { path: field_path });
                }
                Presence::Value(instance) => {
                    let value = self.encode_node(field.schema.id(), instance, &field_path, depth + 1)?;
                    let omit = !field.required
                        && ((field.options.omit_empty && is_empty(&value))
                            || (field.options.omit_zero && is_zero(&value)));
                    if !omit {
                        object.insert(field.name.clone(), value);
                    }
                }
            }
        }

        for (key, instance) in &record.additional {
            if fields.iter().any(|f| &f.name == key) {
                continue;
            }
            let key_path = build_path(path, &[key]);
            let value = match additional {
                AdditionalProperties::Any => plain_value(instance, &key_path)?,
                AdditionalProperties::Typed(schema) => {
                    self.encode_node(schema.id(), instance, &key_path, depth + 1)?
                }
                AdditionalProperties::Forbidden | AdditionalProperties::Unspecified => {
                    return Err(EncodeError::UnexpectedField {
                        path: path.to_string(),
                        field: key.clone(),
                    });
                }
            };
            object.insert(key.clone(), value);
        }
        Ok(object)
    }

    fn encode_union(
        &self,
        id: NodeId,
        union: &UnionValue,
        path: &str,
        depth: usize,
    ) -> Result<Value, EncodeError> {
        let TypeKind::Union {
            mode,
            variants,
            discriminator,
        } = &self.graph.node(id).kind
        else {
            return Err(EncodeError::Union {
                path: path.to_string(),
                source: UnionError::NotAUnion { node: id },
            });
        };

        let mut encoded = Vec::new();
        for (index, instance) in union.set_indices() {
            let Some(variant) = variants.get(index) else {
                return Err(EncodeError::Union {
                    path: path.to_string(),
                    source: UnionError::NotAUnion { node: id },
                });
            };
            encoded.push(self.encode_node(variant.schema.id(), instance, path, depth + 1)?);
            if *mode == UnionMode::OneOf {
                break;
            }
        }

        let mut value = match encoded.len() {
            0 => return Ok(Value::Null),
            1 => encoded.remove(0),
            _ => merge_variants(encoded, path)?,
        };

        if let (Some(discriminator), Value::Object(object)) = (discriminator, &mut value) {
            if !object.contains_key(&discriminator.property_name) {
                let tag = union.discriminator().map(str::to_string).or_else(|| {
                    union
                        .set_indices()
                        .next()
                        .and_then(|(i, _)| variants[i].discriminator_values.first().cloned())
                });
                if let Some(tag) = tag {
                    object.insert(discriminator.property_name.clone(), Value::String(tag));
                }
            }
        }
        Ok(value)
    }
}

/// Encode `instance` as the declared type `type_name`.
pub fn encode(
    graph: &TypeGraph,
    type_name: &str,
    instance: &Instance,
    options: &DecodeOptions,
) -> Result<Value, EncodeError> {
    Encoder::new(graph, options).encode_type(type_name, instance)
}

/// Merge the encodings of several `anyOf` variants into one value.
fn merge_variants(encoded: Vec<Value>, path: &str) -> Result<Value, EncodeError> {
    if encoded.iter().all(Value::is_object) {
        let mut merged = Map::new();
        for value in encoded {
            let Value::Object(object) = value else { continue };
            for (key, v) in object {
                match merged.get(&key) {
                    Some(existing) if *existing != v => {
                        return Err(EncodeError::IncompatibleVariants {
                            path: path.to_string(),
                            key,
                        });
                    }
                    _ => {
                        merged.insert(key, v);
                    }
                }
            }
        }
        return Ok(Value::Object(merged));
    }
    // Scalars: every set variant must agree.
    let first = encoded[0].clone();
    if encoded.iter().all(|v| numerically_equal(v, &first)) {
        Ok(first)
    } else {
        Err(EncodeError::IncompatibleVariants {
            path: path.to_string(),
            key: String::new(),
        })
    }
}

fn numerically_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Raw JSON for an instance held by an untyped position.
fn plain_value(instance: &Instance, path: &str) -> Result<Value, EncodeError> {
    Ok(match instance {
        Instance::Null => Value::Null,
        Instance::Bool(b) => Value::Bool(*b),
        Instance::Integer(i) => Value::from(*i),
        Instance::Number(f) => finite(*f, path)?,
        Instance::String(s) => Value::String(s.clone()),
        Instance::Enum { literal, .. } => literal.clone(),
        Instance::Dynamic(v) => v.clone(),
        Instance::Array(items) => Value::Array(
            items
                .iter()
                .map(|i| plain_value(i, path))
                .collect::<Result<_, _>>()?,
        ),
        Instance::Record(_) | Instance::Union(_) => {
            return Err(EncodeError::TypeMismatch {
                path: path.to_string(),
                expected: "dynamic value",
                found: instance.kind_name(),
            });
        }
    })
}

fn finite(f: f64, path: &str) -> Result<Value, EncodeError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| EncodeError::NonFiniteNumber {
            path: path.to_string(),
            value: f,
        })
}

fn expected_word(kind: &TypeKind) -> &'static str {
    match kind {
        TypeKind::Scalar { scalar, .. } => match scalar {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Number => "number",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Dynamic => "dynamic",
        },
        TypeKind::Enum { .. } => "enum",
        TypeKind::Array { .. } => "array",
        TypeKind::Object { .. } => "record",
        TypeKind::Union { .. } => "union",
        TypeKind::Alias { .. } => "alias",
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Zero values: null, false, 0, "", and objects whose members are all zero.
fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.values().all(is_zero),
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
    use crate::runtime::decode::decode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn graph(schemas: Value) -> TypeGraph {
        compile_document(
            &json!({ "components": { "schemas": schemas } }),
            &CompileOptions::default(),
        )
        .unwrap()
    }

    fn round_trip(g: &TypeGraph, name: &str, payload: Value) -> Value {
        let opts = DecodeOptions::default();
        let instance = decode(g, name, &payload, &opts).unwrap();
        encode(g, name, &instance, &opts).unwrap()
    }

    #[test]
    fn test_presence_round_trip() {
        let g = graph(json!({
            "Thing": { "type": "object", "required": ["a", "c"], "properties": {
                "a": { "type": "string" },
                "b": { "type": "string" },
                "c": { "type": "string", "nullable": true },
                "d": { "type": "string", "nullable": true }
            } }
        }));
        for payload in [
            json!({ "a": "x", "c": null }),
            json!({ "a": "x", "c": "y", "d": null }),
            json!({ "a": "x", "b": "z", "c": null, "d": "w" }),
        ] {
            assert_eq!(round_trip(&g, "Thing", payload.clone()), payload);
        }
    }

    #[test]
    fn test_missing_required_and_illegal_null() {
        let g = graph(json!({
            "Thing": { "type": "object", "required": ["a"], "properties": {
                "a": { "type": "string" }, "b": { "type": "string" }
            } }
        }));
        let id = g.get("Thing").unwrap().id;
        let opts = DecodeOptions::default();
        let err = encode(&g, "Thing", &Instance::Record(Record::new(id)), &opts).unwrap_err();
        assert!(matches!(err, EncodeError::MissingField { field, .. } if field == "a"));

        let mut record = Record::new(id).with("a", Instance::String("x".into()));
        record.set("b", Presence::Null);
        let err = encode(&g, "Thing", &Instance::Record(record), &opts).unwrap_err();
        assert_eq!(err, EncodeError::NullNotAllowed { path: "#/b".into() });
    }

    #[test]
    fn test_omit_empty_and_omit_zero() {
        let g = graph(json!({
            "Opts": { "type": "object", "properties": {
                "tags": { "type": "array", "items": { "type": "string" }, "x-omit-empty": true },
                "count": { "type": "integer", "x-omit-zero": true },
                "name": { "type": "string" }
            } }
        }));
        let id = g.get("Opts").unwrap().id;
        let record = Record::new(id)
            .with("tags", Instance::Array(vec![]))
            .with("count", Instance::Integer(0))
            .with("name", Instance::String(String::new()));
        let value = encode(&g, "Opts", &Instance::Record(record), &DecodeOptions::default()).unwrap();
        assert_eq!(value, json!({ "name": "" }));
    }

    #[test]
    fn test_empty_union_encodes_null() {
        let g = graph(json!({
            "Id": { "oneOf": [ { "type": "integer" }, { "type": "string" } ] }
        }));
        let id = g.get("Id").unwrap().id;
        let empty = UnionValue::empty(&g, id).unwrap();
        let value = encode(&g, "Id", &Instance::Union(empty), &DecodeOptions::default()).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_discriminator_written_from_union() {
        let g = graph(json!({
            "Cat": { "type": "object", "properties": { "name": { "type": "string" } } },
            "Dog": { "type": "object", "properties": { "bark": { "type": "boolean" } } },
            "Pet": {
                "oneOf": [
                    { "$ref": "#/components/schemas/Cat" },
                    { "$ref": "#/components/schemas/Dog" }
                ],
                "discriminator": { "propertyName": "kind", "mapping": {
                    "cat": "#/components/schemas/Cat",
                    "kitten": "#/components/schemas/Cat",
                    "dog": "#/components/schemas/Dog"
                } }
            }
        }));
        let payload = json!({ "kind": "kitten", "name": "Tom" });
        assert_eq!(round_trip(&g, "Pet", payload.clone()), payload);

        let cat = g.get("Cat").unwrap().id;
        let pet = g.get("Pet").unwrap().id;
        let record = Record::new(cat).with("name", Instance::String("Tom".into()));
        let union = UnionValue::from_variant(&g, pet, "Cat", Instance::Record(record)).unwrap();
        let value = encode(&g, "Pet", &Instance::Union(union), &DecodeOptions::default()).unwrap();
        assert_eq!(value, json!({ "name": "Tom", "kind": "cat" }));
    }

    #[test]
    fn test_any_of_merges_objects() {
        let g = graph(json!({
            "A": { "type": "object", "properties": { "a": { "type": "string" } } },
            "B": { "type": "object", "properties": { "b": { "type": "string" } } },
            "AB": { "anyOf": [
                { "$ref": "#/components/schemas/A" },
                { "$ref": "#/components/schemas/B" }
            ] }
        }));
        let payload = json!({ "a": "1", "b": "2" });
        assert_eq!(round_trip(&g, "AB", payload.clone()), payload);
    }

    #[test]
    fn test_additional_properties_round_trip() {
        let g = graph(json!({
            "Bag": { "type": "object", "properties": { "id": { "type": "integer" } },
                     "additionalProperties": true }
        }));
        let payload = json!({ "id": 1, "extra": { "nested": [1, 2] } });
        assert_eq!(round_trip(&g, "Bag", payload.clone()), payload);
    }

    #[test]
    fn test_kind_mismatch_and_non_finite() {
        let g = graph(json!({
            "Name": { "type": "string" },
            "Ratio": { "type": "number" }
        }));
        let opts = DecodeOptions::default();
        let err = encode(&g, "Name", &Instance::Integer(1), &opts).unwrap_err();
        assert_eq!(
            err,
            EncodeError::TypeMismatch {
                path: "#".into(),
                expected: "string",
                found: "integer"
            }
        );
        assert!(matches!(
            encode(&g, "Ratio", &Instance::Number(f64::NAN), &opts),
            Err(EncodeError::NonFiniteNumber { .. })
        ));
    }
}
