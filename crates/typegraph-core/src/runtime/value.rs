//! Decoded values.

use indexmap::IndexMap;
use serde_json::Value;

use crate::ir::NodeId;

use super::union::UnionValue;

/// Presence of a record field: absent, explicit null, or a value.
///
/// Optional-nullable fields use all three states; the other presence
/// states only ever hold a subset of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Presence<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<T> Presence<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Presence::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Presence::Null)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Presence::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Presence<T> {
    /// `None` is treated as an explicit null.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Presence::Value(v),
            None => Presence::Null,
        }
    }
}

/// A payload decoded against a [`crate::graph::TypeGraph`] node.
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    /// Null held by a nullable non-field position (array element, alias).
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Enum {
        /// Allocated constant identifier.
        constant: String,
        literal: Value,
    },
    Array(Vec<Instance>),
    Record(Record),
    Union(UnionValue),
    /// Untyped value, kept as raw JSON.
    Dynamic(Value),
}

impl Instance {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Instance::Null => "null",
            Instance::Bool(_) => "boolean",
            Instance::Integer(_) => "integer",
            Instance::Number(_) => "number",
            Instance::String(_) => "string",
            Instance::Enum { .. } => "enum",
            Instance::Array(_) => "array",
            Instance::Record(_) => "record",
            Instance::Union(_) => "union",
            Instance::Dynamic(_) => "dynamic",
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Instance::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&UnionValue> {
        match self {
            Instance::Union(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Instance::String(s) => Some(s),
            Instance::Enum {
                literal: Value::String(s),
                ..
            } => Some(s),
            _ => None,
        }
    }
}

/// Value of an `Object` type.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Node the record was decoded against.
    pub type_id: NodeId,
    /// Declared fields by wire name; unset fields are absent.
    pub fields: IndexMap<String, Presence<Instance>>,
    /// Undeclared keys, kept when the type allows additional properties.
    pub additional: IndexMap<String, Instance>,
}

impl Record {
    pub fn new(type_id: NodeId) -> Self {
        Self {
            type_id,
            fields: IndexMap::new(),
            additional: IndexMap::new(),
        }
    }

    /// Presence of a field; `None` when it was never set.
    pub fn get(&self, name: &str) -> Option<&Presence<Instance>> {
        self.fields.get(name)
    }

    /// The field's value, if it holds one.
    pub fn value(&self, name: &str) -> Option<&Instance> {
        self.fields.get(name).and_then(Presence::value)
    }

    pub fn set(&mut self, name: impl Into<String>, presence: Presence<Instance>) -> &mut Self {
        self.fields.insert(name.into(), presence);
        self
    }

    /// Builder form of [`set`](Self::set) with a value.
    pub fn with(mut self, name: impl Into<String>, value: Instance) -> Self {
        self.fields.insert(name.into(), Presence::Value(value));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_states_are_distinct() {
        let absent: Presence<i32> = Presence::Absent;
        let null: Presence<i32> = Presence::Null;
        let value = Presence::Value(1);
        assert!(absent.is_absent() && !absent.is_null());
        assert!(null.is_null() && !null.is_absent());
        assert_eq!(value.value(), Some(&1));
        assert_ne!(absent, null);
        assert_eq!(Presence::from(None::<i32>), Presence::Null);
    }

    #[test]
    fn test_record_accessors() {
        let mut record = Record::new(NodeId(0)).with("name", Instance::String("Rex".to_string()));
        record.set("tag", Presence::Null);
        assert_eq!(record.value("name").and_then(Instance::as_str), Some("Rex"));
        assert_eq!(record.get("tag"), Some(&Presence::Null));
        assert_eq!(record.get("missing"), None);
    }
}
