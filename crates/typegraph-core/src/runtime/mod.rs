//! Value-level runtime over a frozen [`TypeGraph`](crate::graph::TypeGraph).
//!
//! Decodes JSON payloads into [`Instance`]s and encodes them back, honouring
//! the four field presence states, discriminated and probed unions,
//! `format` checks and the `omit-empty`/`omit-zero` field options.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use typegraph_core::{compile_document, CompileOptions, DecodeOptions};
//! use typegraph_core::runtime::{decode, encode};
//! use serde_json::json;
//!
//! let doc = json!({ "components": { "schemas": {
//!     "Pet": { "type": "object", "required": ["name"], "properties": {
//!         "name": { "type": "string" },
//!         "tag": { "type": "string", "nullable": true }
//!     } }
//! } } });
//! let graph = compile_document(&doc, &CompileOptions::default()).unwrap();
//!
//! let options = DecodeOptions::default();
//! let payload = json!({ "name": "Rex", "tag": null });
//! let pet = decode(&graph, "Pet", &payload, &options).unwrap();
//! assert_eq!(encode(&graph, "Pet", &pet, &options).unwrap(), payload);
//! ```

pub mod decode;
pub mod encode;
pub mod formats;
pub mod union;
pub mod value;

pub use decode::{decode, DecodeError, Decoder};
pub use encode::{encode, EncodeError, Encoder};
pub use formats::check_format;
pub use union::{UnionError, UnionValue};
pub use value::{Instance, Presence, Record};
