//! Integration tests for the `compile()` pipeline, using the public API and
//! the shared fixtures in `tests/schemas/`.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use typegraph_core::{
    compile, compile_document, AdditionalProperties, CompileError, CompileOptions, DocumentSet,
    ErrorCode, FieldPresence, Namespace, NodeRef, OperationFilter, TypeGraph, TypeKind,
};
use url::Url;

fn load_fixture(name: &str) -> Value {
    let fixtures_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/schemas");
    let path = Path::new(fixtures_dir).join(name);
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

fn compile_fixture(name: &str) -> TypeGraph {
    compile_document(&load_fixture(name), &CompileOptions::default())
        .unwrap_or_else(|e| panic!("{name} should compile: {e}"))
}

fn field_summary(graph: &TypeGraph, name: &str) -> Vec<(String, FieldPresence)> {
    let node = graph.get(name).unwrap_or_else(|| panic!("{name} should be declared"));
    let TypeKind::Object { fields, .. } = &node.kind else {
        panic!("{name} should be an object, got {:?}", node.kind);
    };
    fields.iter().map(|f| (f.name.clone(), f.presence())).collect()
}

// ── End to end ──────────────────────────────────────────────────────────────

#[test]
fn test_person_with_id_flattens_all_of() {
    let graph = compile_fixture("composition.json");
    assert_eq!(
        field_summary(&graph, "PersonWithID"),
        vec![
            ("firstName".to_string(), FieldPresence::Required),
            ("lastName".to_string(), FieldPresence::Required),
            ("id".to_string(), FieldPresence::Required),
        ]
    );
    // The base type is untouched.
    assert_eq!(field_summary(&graph, "Person").len(), 2);
}

#[test]
fn test_name_collision_across_namespaces() {
    let graph = compile_fixture("namespaces.json");
    let declared: Vec<(String, Namespace)> = graph
        .types()
        .map(|t| (t.name.clone().unwrap(), t.namespace))
        .collect();
    assert_eq!(
        declared,
        vec![
            ("Bar".to_string(), Namespace::Schema),
            ("BarParameter".to_string(), Namespace::Parameter),
            ("BarResponse".to_string(), Namespace::Response),
            ("BarRequestBody".to_string(), Namespace::RequestBody),
        ]
    );
}

#[test]
fn test_petstore_types_and_operations() {
    let graph = compile_fixture("petstore.json");

    for name in ["PetStatus", "PetBase", "Cat", "Dog", "Pet", "Error", "ErrorResponse"] {
        assert!(graph.get(name).is_some(), "{name} should be declared");
    }

    // Cat and Dog are flattened copies of PetBase plus their own fields.
    let cat: Vec<String> = field_summary(&graph, "Cat").into_iter().map(|(n, _)| n).collect();
    assert_eq!(cat, vec!["id", "name", "kind", "status", "tag", "indoor"]);
    let dog = field_summary(&graph, "Dog");
    assert_eq!(dog.last().unwrap(), &("goodBoy".to_string(), FieldPresence::Required));
    assert!(dog.contains(&("tag".to_string(), FieldPresence::OptionalNullable)));

    let list = graph.operation("listPets").expect("listPets operation");
    let params = graph.node(list.params.expect("listPets has parameters"));
    assert_eq!(params.name.as_deref(), Some("ListPetsParams"));
    let TypeKind::Object {
        additional_properties,
        ..
    } = &params.kind
    else {
        panic!("params should be a record");
    };
    assert_eq!(*additional_properties, AdditionalProperties::Forbidden);
    assert_eq!(list.responses.keys().collect::<Vec<_>>(), vec!["200", "default"]);
    assert_eq!(
        graph.node(list.responses["200"].id()).name.as_deref(),
        Some("ListPets200Response")
    );

    let create = graph.operation("createPet").expect("createPet operation");
    let body = graph.node(create.request_body.expect("createPet has a body").id());
    assert_eq!(body.name.as_deref(), Some("CreatePetRequestBody"));
    assert_eq!(body.namespace, Namespace::Operation);

    // Path-level parameters are shared; path parameters are always required.
    let get = graph.operation("getPet").expect("getPet operation");
    let get_params = graph.node(get.params.expect("getPet has parameters")).name.clone();
    assert_eq!(get_params.as_deref(), Some("GetPetParams"));
    assert_eq!(
        field_summary(&graph, "GetPetParams"),
        vec![("petId".to_string(), FieldPresence::Required)]
    );

    // An operation without an id is named after its method and route.
    assert!(graph.operation("delete /pets/{petId}").is_some());
}

#[test]
fn test_petstore_discriminator_mapping() {
    let graph = compile_fixture("petstore.json");
    let pet = graph.get("Pet").unwrap();
    let TypeKind::Union {
        variants,
        discriminator,
        ..
    } = &pet.kind
    else {
        panic!("Pet should be a union");
    };
    let names: Vec<&str> = variants.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["Cat", "Dog"]);
    let discriminator = discriminator.as_ref().expect("Pet is discriminated");
    assert_eq!(discriminator.property_name, "kind");
    assert_eq!(
        discriminator.mapping.iter().map(|(k, v)| (k.as_str(), *v)).collect::<Vec<_>>(),
        vec![("cat", 0), ("kitten", 0), ("dog", 1)]
    );
    assert!(matches!(variants[0].schema, NodeRef::Named(_)));
}

#[test]
fn test_operation_filter() {
    let options = CompileOptions {
        operations: OperationFilter {
            exclude_tags: vec!["admin".to_string()],
            ..OperationFilter::default()
        },
        ..CompileOptions::default()
    };
    let graph = compile_document(&load_fixture("petstore.json"), &options).unwrap();
    let ids: Vec<&str> = graph.operations().iter().map(|o| o.operation_id.as_str()).collect();
    assert_eq!(ids, vec!["listPets", "createPet", "getPet"]);
}

// ── Recursion ───────────────────────────────────────────────────────────────

#[test]
fn test_recursive_types_use_reference_edges() {
    let graph = compile_fixture("recursive.json");
    let tree = graph.get("TreeNode").unwrap();
    let TypeKind::Object { fields, .. } = &tree.kind else {
        panic!("TreeNode should be an object");
    };
    let parent = fields.iter().find(|f| f.name == "parent").unwrap();
    assert!(parent.schema.is_reference(), "direct self field must be a back-edge");

    let TypeKind::Union { discriminator, .. } = &graph.get("Expr").unwrap().kind else {
        panic!("Expr should be a union");
    };
    let mapping = &discriminator.as_ref().unwrap().mapping;
    assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["Literal", "Sum"]);
}

// ── Idempotence and multi-document input ────────────────────────────────────

#[test]
fn test_compile_is_idempotent() {
    for fixture in ["petstore.json", "composition.json", "recursive.json", "namespaces.json"] {
        let doc = load_fixture(fixture);
        let first = compile_document(&doc, &CompileOptions::default()).unwrap();
        let second = compile_document(&doc, &CompileOptions::default()).unwrap();
        assert_eq!(first, second, "{fixture} compiled differently on the second run");
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn test_external_document_with_package() {
    let root_url = Url::parse("file:///api/openapi.json").unwrap();
    let common_url = Url::parse("file:///api/common.json").unwrap();
    let mut docs = DocumentSet::new();
    docs.insert(
        root_url,
        json!({ "components": { "schemas": {
            "Error": { "type": "object", "properties": {
                "detail": { "$ref": "common.json#/components/schemas/Error" }
            } }
        } } }),
    );
    docs.insert_with_package(
        common_url,
        "common",
        json!({ "components": { "schemas": {
            "Error": { "type": "object", "properties": { "code": { "type": "integer" } } }
        } } }),
    );

    let graph = compile(&docs, &CompileOptions::default()).unwrap();
    let error = graph.get("Error").unwrap();
    assert_eq!(error.package, None);
    let external = graph.get("common.Error").expect("package-qualified lookup");
    assert_eq!(external.name.as_deref(), Some("Error"));
    assert_eq!(external.package.as_deref(), Some("common"));
    assert_eq!(external.origin.package.as_deref(), Some("common"));
}

#[test]
fn test_error_in_packaged_document_names_package() {
    let mut docs = DocumentSet::new();
    docs.insert(
        Url::parse("file:///api/openapi.json").unwrap(),
        json!({ "components": { "schemas": {
            "Holder": { "$ref": "common.json#/components/schemas/Broken" }
        } } }),
    );
    docs.insert_with_package(
        Url::parse("file:///api/common.json").unwrap(),
        "common",
        json!({ "components": { "schemas": {
            "Broken": { "type": "object", "properties": {
                "x": { "$ref": "#/components/schemas/Missing" }
            } }
        } } }),
    );

    let err = compile(&docs, &CompileOptions::default()).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::RefResolutionError);
    assert_eq!(
        err.path(),
        Some("common:file:///api/common.json#/components/schemas/Broken/properties/x")
    );
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[test]
fn test_unresolvable_ref_is_terminal() {
    let doc = json!({ "components": { "schemas": {
        "A": { "type": "object", "properties": { "b": { "$ref": "#/components/schemas/Missing" } } }
    } } });
    let err = compile_document(&doc, &CompileOptions::default()).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::RefResolutionError);
    assert!(err.path().is_some());
}

#[test]
fn test_all_of_with_non_object_member() {
    let doc = json!({ "components": { "schemas": {
        "Bad": { "allOf": [ { "type": "object" }, { "type": "string" } ] }
    } } });
    let err = compile_document(&doc, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::SchemaMerge { .. }), "got {err:?}");
    assert_eq!(err.to_json()["code"], json!("schema_merge_error"));
}

#[test]
fn test_unbreakable_cycle() {
    let doc = json!({ "components": { "schemas": {
        "A": { "$ref": "#/components/schemas/B" },
        "B": { "$ref": "#/components/schemas/A" }
    } } });
    let err = compile_document(&doc, &CompileOptions::default()).unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::CyclicSchemaError);
}
