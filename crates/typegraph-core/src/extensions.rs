//! Vendor extensions (`x-*`) recognised on schemas and properties.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CompileError;
use crate::resolver::SchemaPath;

pub const X_TYPE: &str = "x-type";
pub const X_TYPE_IMPORT: &str = "x-type-import";
pub const X_TYPE_NAME: &str = "x-type-name";
pub const X_FIELD_NAME: &str = "x-field-name";
pub const X_SKIP_OPTIONAL_INDIRECTION: &str = "x-skip-optional-indirection";
pub const X_IGNORE: &str = "x-ignore";
pub const X_OMIT_EMPTY: &str = "x-omit-empty";
pub const X_OMIT_ZERO: &str = "x-omit-zero";
pub const X_EXTRA_TAGS: &str = "x-extra-tags";
pub const X_ORDER: &str = "x-order";
pub const X_ENUM_NAMES: &str = "x-enum-names";
pub const X_NULLABLE: &str = "x-nullable";

const FIELD_KEYS: &[&str] = &[
    X_FIELD_NAME,
    X_SKIP_OPTIONAL_INDIRECTION,
    X_IGNORE,
    X_OMIT_EMPTY,
    X_OMIT_ZERO,
    X_EXTRA_TAGS,
    X_ORDER,
];

const SCHEMA_KEYS: &[&str] = &[X_TYPE, X_TYPE_IMPORT, X_TYPE_NAME, X_ENUM_NAMES, X_NULLABLE];

/// Import the emitter must add for an overridden type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeImport {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Extensions that shape a type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaExtensions {
    /// Emit this target-language type instead of generating one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_import: Option<TypeImport>,
    /// Base name to allocate instead of the component key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Constant names for an enum, one per value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    /// Unrecognised `x-*` keys, preserved in declaration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub other: IndexMap<String, Value>,
}

/// Extensions that shape how a record field is represented.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub omit_empty: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub omit_zero: bool,
    /// Name of a custom zero-value predicate supplied by the emitter's runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zero_predicate: Option<String>,
    /// Optional fields are normally held by indirection; this keeps them inline.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_optional_indirection: bool,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra_tags: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

fn expect_bool(obj: &Map<String, Value>, key: &str, path: &SchemaPath) -> Result<bool, CompileError> {
    match obj.get(key) {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(CompileError::invalid(
            path,
            format!("{key} must be a boolean, found {other}"),
        )),
    }
}

fn expect_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &SchemaPath,
) -> Result<Option<String>, CompileError> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(CompileError::invalid(
            path,
            format!("{key} must be a string, found {other}"),
        )),
    }
}

/// Parse schema-level extensions from a raw schema object.
pub fn parse_schema_extensions(
    obj: &Map<String, Value>,
    path: &SchemaPath,
) -> Result<SchemaExtensions, CompileError> {
    let type_import = match obj.get(X_TYPE_IMPORT) {
        None => None,
        Some(Value::String(s)) => Some(TypeImport {
            path: s.clone(),
            alias: None,
        }),
        Some(Value::Object(import)) => {
            let import_path = import
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| CompileError::invalid(path, format!("{X_TYPE_IMPORT} needs a path")))?;
            Some(TypeImport {
                path: import_path.to_string(),
                alias: import.get("name").and_then(Value::as_str).map(String::from),
            })
        }
        Some(other) => {
            return Err(CompileError::invalid(
                path,
                format!("{X_TYPE_IMPORT} must be a string or object, found {other}"),
            ))
        }
    };

    let enum_names = match obj.get(X_ENUM_NAMES) {
        None => None,
        Some(Value::Array(names)) => Some(
            names
                .iter()
                .map(|n| {
                    n.as_str().map(String::from).ok_or_else(|| {
                        CompileError::invalid(path, format!("{X_ENUM_NAMES} entries must be strings"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Some(other) => {
            return Err(CompileError::invalid(
                path,
                format!("{X_ENUM_NAMES} must be an array, found {other}"),
            ))
        }
    };

    let other = obj
        .iter()
        .filter(|(k, _)| {
            k.starts_with("x-")
                && !SCHEMA_KEYS.contains(&k.as_str())
                && !FIELD_KEYS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(SchemaExtensions {
        type_override: expect_string(obj, X_TYPE, path)?,
        type_import,
        type_name: expect_string(obj, X_TYPE_NAME, path)?,
        enum_names,
        nullable: expect_bool(obj, X_NULLABLE, path)?,
        other,
    })
}

/// Parse property-level extensions from a raw property schema (including
/// siblings of a `$ref`).
pub fn parse_field_options(
    obj: &Map<String, Value>,
    path: &SchemaPath,
) -> Result<FieldOptions, CompileError> {
    let (omit_zero, zero_predicate) = match obj.get(X_OMIT_ZERO) {
        None => (false, None),
        Some(Value::Bool(b)) => (*b, None),
        Some(Value::String(predicate)) => (true, Some(predicate.clone())),
        Some(other) => {
            return Err(CompileError::invalid(
                path,
                format!("{X_OMIT_ZERO} must be a boolean or predicate name, found {other}"),
            ))
        }
    };

    let extra_tags = match obj.get(X_EXTRA_TAGS) {
        None => IndexMap::new(),
        Some(Value::Object(tags)) => tags
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => (k.clone(), s.clone()),
                other => (k.clone(), other.to_string()),
            })
            .collect(),
        Some(other) => {
            return Err(CompileError::invalid(
                path,
                format!("{X_EXTRA_TAGS} must be an object, found {other}"),
            ))
        }
    };

    let order = match obj.get(X_ORDER) {
        None => None,
        Some(v) => Some(v.as_i64().ok_or_else(|| {
            CompileError::invalid(path, format!("{X_ORDER} must be an integer, found {v}"))
        })?),
    };

    Ok(FieldOptions {
        field_name: expect_string(obj, X_FIELD_NAME, path)?,
        ignore: expect_bool(obj, X_IGNORE, path)?,
        omit_empty: expect_bool(obj, X_OMIT_EMPTY, path)?,
        omit_zero,
        zero_predicate,
        skip_optional_indirection: expect_bool(obj, X_SKIP_OPTIONAL_INDIRECTION, path)?,
        extra_tags,
        order,
    })
}
