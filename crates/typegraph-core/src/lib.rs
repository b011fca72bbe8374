//! Resolve OpenAPI 3.x schema documents into an emission-ready type graph.
//!
//! Compilation runs in fixed stages over an arena of schema nodes:
//!
//! 1. **Resolve**: every document is indexed and all `$ref`s are checked.
//! 2. **Normalize** (`p0`): components and operations become IR nodes.
//! 3. **Compose** (`p1`): `allOf` is flattened into single records.
//! 4. **Polymorphism** (`p2`): `oneOf`/`anyOf` become tagged unions.
//! 5. **Recursion** (`p3`): cycles are broken with reference edges.
//! 6. **Naming**: identifiers are allocated deterministically.
//!
//! The result is a frozen [`TypeGraph`]. Emitters read it directly or as
//! JSON; [`runtime`] decodes and encodes payloads against it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use typegraph_core::{compile_document, CompileOptions};
//! use serde_json::json;
//!
//! let doc = json!({
//!     "components": { "schemas": {
//!         "Person": { "type": "object", "properties": { "name": { "type": "string" } } },
//!         "PersonWithID": { "allOf": [
//!             { "$ref": "#/components/schemas/Person" },
//!             { "type": "object", "required": ["id"], "properties": { "id": { "type": "integer" } } }
//!         ] }
//!     } }
//! });
//!
//! let graph = compile_document(&doc, &CompileOptions::default()).unwrap();
//! assert!(graph.get("PersonWithID").is_some());
//! ```

pub mod config;
pub mod error;
pub mod extensions;
pub mod graph;
pub mod ir;
pub mod naming;
pub mod resolver;
pub mod runtime;
pub mod schema_utils;

mod passes;

use serde_json::Value;

pub use config::{CasingStyle, CompileOptions, DecodeOptions, NamingOptions, OperationFilter, ProbeOrder};
pub use error::{CompileError, ErrorCode};
pub use graph::{TypeGraph, TypeNode};
pub use ir::{
    AdditionalProperties, Discriminator, EnumConstant, Field, FieldPresence, Format, Namespace,
    NodeId, NodeRef, OperationTypes, ScalarKind, TypeKind, UnionMode, Variant,
};
pub use naming::{IdentifierCasing, StyleCasing};
pub use resolver::{DocumentSet, SchemaPath};

/// Compile a document set with the built-in casing from `options.naming`.
pub fn compile(documents: &DocumentSet, options: &CompileOptions) -> Result<TypeGraph, CompileError> {
    let casing = StyleCasing::new(&options.naming);
    compile_with_casing(documents, options, &casing)
}

/// Compile a single in-memory document.
pub fn compile_document(document: &Value, options: &CompileOptions) -> Result<TypeGraph, CompileError> {
    compile(&DocumentSet::single(document.clone()), options)
}

/// Compile with a caller-supplied identifier casing.
///
/// The same documents, options and casing always produce the same graph.
pub fn compile_with_casing(
    documents: &DocumentSet,
    options: &CompileOptions,
    casing: &dyn IdentifierCasing,
) -> Result<TypeGraph, CompileError> {
    let engine = resolver::ResolverEngine::new(documents)?;
    let reachable = engine.collect()?;
    tracing::debug!(documents = documents.len(), schemas = reachable.len(), "resolved references");

    let mut arena = passes::p0_normalize::normalize(&engine, options)?;
    tracing::debug!(nodes = arena.len(), "p0: normalized");

    passes::p1_composition::merge_compositions(&mut arena)?;
    tracing::debug!("p1: compositions merged");

    passes::p2_polymorphism::resolve_unions(&mut arena, &engine)?;
    tracing::debug!("p2: unions resolved");

    let broken = passes::p3_recursion::break_cycles(&mut arena)?;
    tracing::debug!(reference_edges = broken, "p3: cycles broken");

    naming::allocate_names(&mut arena, casing, options)?;

    let graph = TypeGraph::freeze(arena)?;
    tracing::debug!(types = graph.len(), operations = graph.operations().len(), "type graph frozen");
    Ok(graph)
}
