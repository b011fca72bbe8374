//! Document set and `$ref` resolution.
//!
//! [`ResolverEngine`] is the single point of truth for turning `$ref`
//! strings into [`SchemaPath`]s. It understands:
//! - local JSON Pointers (`#/components/schemas/Pet`)
//! - cross-document references (`common.json#/components/schemas/Error`),
//!   joined against the referring document's URL
//!
//! Anchor-style fragments (`#pet`) and documents that were never loaded are
//! rejected with [`CompileError::RefResolution`]. No network I/O happens
//! here: callers load every document into a [`DocumentSet`] up front.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::CompileError;
use crate::schema_utils::{build_path, resolve_pointer};

/// Keys whose values are data, not schemas; `$ref` inside them is literal.
const DATA_KEYWORDS: &[&str] = &["example", "examples", "default", "enum", "const"];

/// URL given to a document loaded without an explicit location.
pub fn default_document_url() -> Url {
    Url::parse("file:///openapi.json").expect("static URL is valid")
}

// ---------------------------------------------------------------------------
// SchemaPath
// ---------------------------------------------------------------------------

/// Location of a raw schema node: originating document plus JSON Pointer.
///
/// Identity is the document and pointer; `package` only labels paths inside
/// a packaged document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaPath {
    pub document: Url,
    /// Always starts with `#`.
    pub pointer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
}

impl PartialEq for SchemaPath {
    fn eq(&self, other: &Self) -> bool {
        self.document == other.document && self.pointer == other.pointer
    }
}

impl Eq for SchemaPath {}

impl Hash for SchemaPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.document.hash(state);
        self.pointer.hash(state);
    }
}

impl PartialOrd for SchemaPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaPath {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.document, &self.pointer).cmp(&(&other.document, &other.pointer))
    }
}

impl SchemaPath {
    pub fn new(document: Url, pointer: impl Into<String>) -> Self {
        let pointer = pointer.into();
        let pointer = if pointer.starts_with('#') {
            pointer
        } else {
            format!("#{pointer}")
        };
        Self {
            document,
            pointer,
            package: None,
        }
    }

    /// Label the path with the package of its document.
    pub fn with_package(mut self, package: Option<String>) -> Self {
        self.package = package;
        self
    }

    /// Location of the document root.
    pub fn root(document: Url) -> Self {
        Self::new(document, "#")
    }

    /// Append pointer segments (escaped per RFC 6901).
    pub fn child(&self, segments: &[&str]) -> Self {
        Self {
            document: self.document.clone(),
            pointer: build_path(&self.pointer, segments),
            package: self.package.clone(),
        }
    }
}

impl fmt::Display for SchemaPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.package {
            Some(package) => write!(f, "{package}:{}{}", self.document, self.pointer),
            None => write!(f, "{}{}", self.document, self.pointer),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentSet
// ---------------------------------------------------------------------------

/// A loaded API document.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: Url,
    /// Package the document's types belong to, when it lives outside the
    /// root document's package.
    pub package: Option<String>,
    pub root: Value,
}

/// Every document the compiler may read, in insertion order.
/// The first inserted document is the root.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: IndexMap<Url, Document>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set containing a single root document at [`default_document_url`].
    pub fn single(root: Value) -> Self {
        let mut set = Self::new();
        set.insert(default_document_url(), root);
        set
    }

    /// Add (or replace) a document.
    pub fn insert(&mut self, url: Url, root: Value) -> &mut Self {
        self.documents.insert(
            url.clone(),
            Document {
                url,
                package: None,
                root,
            },
        );
        self
    }

    /// Add a document whose types belong to `package`.
    pub fn insert_with_package(
        &mut self,
        url: Url,
        package: impl Into<String>,
        root: Value,
    ) -> &mut Self {
        self.documents.insert(
            url.clone(),
            Document {
                url,
                package: Some(package.into()),
                root,
            },
        );
        self
    }

    pub fn root(&self) -> Option<&Document> {
        self.documents.values().next()
    }

    pub fn get(&self, url: &Url) -> Option<&Document> {
        self.documents.get(url)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }
}

// ---------------------------------------------------------------------------
// ResolverEngine
// ---------------------------------------------------------------------------

/// Reference resolution over a [`DocumentSet`].
pub struct ResolverEngine<'a> {
    documents: &'a DocumentSet,
    root: &'a Document,
}

impl<'a> ResolverEngine<'a> {
    pub fn new(documents: &'a DocumentSet) -> Result<Self, CompileError> {
        let root = documents.root().ok_or_else(|| {
            CompileError::invalid(SchemaPath::root(default_document_url()), "no documents loaded")
        })?;
        Ok(Self { documents, root })
    }

    pub fn root_document(&self) -> &'a Document {
        self.root
    }

    /// Resolve a `$ref` string found at `site`.
    pub fn resolve_ref(&self, reference: &str, site: &SchemaPath) -> Result<SchemaPath, CompileError> {
        let unresolvable = |why: &str| CompileError::RefResolution {
            path: site.to_string(),
            reference: format!("{reference} ({why})"),
        };

        let (doc_part, fragment) = match reference.split_once('#') {
            Some((doc, frag)) => (doc, frag),
            None => (reference, ""),
        };

        let document = if doc_part.is_empty() {
            site.document.clone()
        } else {
            site.document
                .join(doc_part)
                .map_err(|_| unresolvable("malformed document reference"))?
        };
        if self.documents.get(&document).is_none() {
            return Err(unresolvable("document not loaded"));
        }

        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(unresolvable("only JSON Pointer fragments are supported"));
        }

        let package = self.package_of(&document).map(str::to_string);
        let target = SchemaPath::new(document, format!("#{fragment}")).with_package(package);
        if self.lookup(&target).is_none() {
            return Err(unresolvable("target does not exist"));
        }
        Ok(target)
    }

    /// The raw node at a resolved location.
    pub fn lookup(&self, path: &SchemaPath) -> Option<&'a Value> {
        let document = self.documents.get(&path.document)?;
        resolve_pointer(&document.root, &path.pointer)
    }

    /// Package qualifier for types declared in `document`, if it differs
    /// from the root document.
    pub fn package_of(&self, document: &Url) -> Option<&'a str> {
        if *document == self.root.url {
            return None;
        }
        self.documents.get(document)?.package.as_deref()
    }

    /// Collect every `$ref` target reachable from the root document.
    ///
    /// Visited-set traversal: each target is walked once, so cyclic
    /// references terminate. Every reference is validated on the way, which
    /// lets later passes treat resolution as infallible in practice.
    pub fn collect(&self) -> Result<IndexMap<SchemaPath, &'a Value>, CompileError> {
        let mut reachable = IndexMap::new();
        let mut visited: HashSet<SchemaPath> = HashSet::new();
        let start = SchemaPath::root(self.root.url.clone());
        visited.insert(start.clone());
        self.walk(&self.root.root, &start, &mut visited, &mut reachable)?;
        tracing::debug!(targets = reachable.len(), "collected reachable $ref targets");
        Ok(reachable)
    }

    fn walk(
        &self,
        node: &'a Value,
        path: &SchemaPath,
        visited: &mut HashSet<SchemaPath>,
        reachable: &mut IndexMap<SchemaPath, &'a Value>,
    ) -> Result<(), CompileError> {
        match node {
            Value::Object(obj) => {
                if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                    let target = self.resolve_ref(reference, path)?;
                    if visited.insert(target.clone()) {
                        let raw = self.lookup(&target).ok_or_else(|| CompileError::RefResolution {
                            path: path.to_string(),
                            reference: reference.to_string(),
                        })?;
                        reachable.insert(target.clone(), raw);
                        self.walk(raw, &target, visited, reachable)?;
                    }
                }
                for (key, child) in obj {
                    if key == "$ref" || DATA_KEYWORDS.contains(&key.as_str()) {
                        continue;
                    }
                    self.walk(child, &path.child(&[key]), visited, reachable)?;
                }
            }
            Value::Array(arr) => {
                for (i, child) in arr.iter().enumerate() {
                    self.walk(child, &path.child(&[&i.to_string()]), visited, reachable)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
