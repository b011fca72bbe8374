//! Error types for type-graph compilation.
//!
//! Every variant carries the originating schema location rendered as
//! `document#pointer` (see [`crate::resolver::SchemaPath`]). All errors are
//! terminal: the pipeline never returns a partially resolved graph.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, machine-readable error codes.
///
/// Variant names and their serialized `snake_case` strings are part of the
/// public contract and must not change across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCode {
    /// JSON (de)serialization error.
    JsonParseError,
    /// A `$ref` is unresolvable or points outside the loaded document set.
    RefResolutionError,
    /// `allOf` members cannot be merged.
    SchemaMergeError,
    /// A `oneOf`/`anyOf` or its discriminator cannot be resolved.
    UnionResolutionError,
    /// No unique identifier could be found within the attempt budget.
    NameCollisionExhausted,
    /// A cycle exists that no reference edge can break.
    CyclicSchemaError,
    /// The schema is structurally malformed.
    InvalidSchema,
    /// Traversal exceeded the configured maximum depth.
    RecursionDepthExceeded,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("JSON (de)serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unresolvable $ref at {path}: {reference}")]
    RefResolution { path: String, reference: String },

    #[error("Cannot merge allOf at {path}: {message}")]
    SchemaMerge { path: String, message: String },

    #[error("Cannot resolve union at {path}: {message}")]
    UnionResolution { path: String, message: String },

    #[error("No unique identifier for '{base}' at {path} after {attempts} attempts")]
    NameCollisionExhausted {
        path: String,
        base: String,
        attempts: usize,
    },

    #[error("Unbreakable schema cycle at {path}: {cycle}")]
    CyclicSchema { path: String, cycle: String },

    #[error("Invalid schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },

    #[error("Recursion depth exceeded at {path} (max: {max_depth})")]
    RecursionDepthExceeded { path: String, max_depth: usize },
}

impl CompileError {
    /// Returns the stable error code for this error variant.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            CompileError::JsonError(_) => ErrorCode::JsonParseError,
            CompileError::RefResolution { .. } => ErrorCode::RefResolutionError,
            CompileError::SchemaMerge { .. } => ErrorCode::SchemaMergeError,
            CompileError::UnionResolution { .. } => ErrorCode::UnionResolutionError,
            CompileError::NameCollisionExhausted { .. } => ErrorCode::NameCollisionExhausted,
            CompileError::CyclicSchema { .. } => ErrorCode::CyclicSchemaError,
            CompileError::InvalidSchema { .. } => ErrorCode::InvalidSchema,
            CompileError::RecursionDepthExceeded { .. } => ErrorCode::RecursionDepthExceeded,
        }
    }

    /// Returns the schema location, if available.
    ///
    /// Returns `None` only for `JsonError`.
    pub fn path(&self) -> Option<&str> {
        match self {
            CompileError::JsonError(_) => None,
            CompileError::RefResolution { path, .. }
            | CompileError::SchemaMerge { path, .. }
            | CompileError::UnionResolution { path, .. }
            | CompileError::NameCollisionExhausted { path, .. }
            | CompileError::CyclicSchema { path, .. }
            | CompileError::InvalidSchema { path, .. }
            | CompileError::RecursionDepthExceeded { path, .. } => Some(path),
        }
    }

    /// Produces a structured JSON error.
    ///
    /// Format: `{"code": "...", "message": "...", "path": "..." | null}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
            "path": self.path(),
        })
    }

    pub(crate) fn invalid(path: impl ToString, message: impl Into<String>) -> Self {
        CompileError::InvalidSchema {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn merge(path: impl ToString, message: impl Into<String>) -> Self {
        CompileError::SchemaMerge {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn union(path: impl ToString, message: impl Into<String>) -> Self {
        CompileError::UnionResolution {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_serializes_snake_case() {
        let json = serde_json::to_value(ErrorCode::NameCollisionExhausted).unwrap();
        assert_eq!(json, json!("name_collision_exhausted"));
    }

    #[test]
    fn test_error_code_round_trips() {
        let code = ErrorCode::CyclicSchemaError;
        let json_str = serde_json::to_string(&code).unwrap();
        let deserialized: ErrorCode = serde_json::from_str(&json_str).unwrap();
        assert_eq!(deserialized, code);
    }

    #[test]
    fn test_to_json_carries_path() {
        let err = CompileError::merge("file:///api.json#/components/schemas/A", "boom");
        let json = err.to_json();
        assert_eq!(json["code"], json!("schema_merge_error"));
        assert_eq!(json["path"], json!("file:///api.json#/components/schemas/A"));
        assert!(json["message"].as_str().unwrap().contains("boom"));
    }

    #[test]
    fn test_json_error_has_no_path() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CompileError::from(parse_err);
        assert_eq!(err.path(), None);
        assert_eq!(err.error_code(), ErrorCode::JsonParseError);
    }
}
