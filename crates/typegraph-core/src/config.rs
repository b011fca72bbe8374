//! Configuration for type-graph compilation and payload decoding.

use serde::{Deserialize, Serialize};

/// Identifier casing applied by the built-in [`crate::naming::StyleCasing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CasingStyle {
    /// `PetOwner`, `ID`.
    Pascal,
    /// `petOwner`, `id`.
    Camel,
    /// `pet_owner`.
    Snake,
    /// Keep the source spelling; only invalid characters are replaced.
    Preserve,
}

/// Naming-style normalization for the name allocator.
///
/// Fields are serialized in `kebab-case` (e.g., `type-style`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NamingOptions {
    /// Casing for type names and enum constants. Default: Pascal.
    pub type_style: CasingStyle,
    /// Casing for record field identifiers. Default: Pascal.
    pub field_style: CasingStyle,
    /// Words rendered fully upper-case in Pascal/Camel styles (`Id` → `ID`).
    pub initialisms: Vec<String>,
    /// Identifiers that the target language reserves; matches get a `_` suffix.
    pub reserved_words: Vec<String>,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            type_style: CasingStyle::Pascal,
            field_style: CasingStyle::Pascal,
            initialisms: ["ID", "URL", "URI", "HTTP", "JSON", "API", "UUID"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            reserved_words: Vec::new(),
        }
    }
}

/// Operation filter applied while traversing `paths`.
///
/// An empty include list means "everything"; excludes always win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OperationFilter {
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub include_operation_ids: Vec<String>,
    pub exclude_operation_ids: Vec<String>,
}

impl OperationFilter {
    /// Returns `true` when an operation with this id and these tags is kept.
    pub fn accepts(&self, operation_id: &str, tags: &[String]) -> bool {
        if self.exclude_operation_ids.iter().any(|id| id == operation_id) {
            return false;
        }
        if tags.iter().any(|t| self.exclude_tags.contains(t)) {
            return false;
        }
        if !self.include_operation_ids.is_empty()
            && !self.include_operation_ids.iter().any(|id| id == operation_id)
        {
            return false;
        }
        if !self.include_tags.is_empty() && !tags.iter().any(|t| self.include_tags.contains(t)) {
            return false;
        }
        true
    }
}

/// Options for [`crate::compile`].
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `max-depth`,
/// `max-name-attempts`) so option files stay stable across releases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompileOptions {
    /// Maximum schema nesting depth during normalization (stack overflow guard).
    pub max_depth: usize,
    /// Numeric suffixes tried per identifier before giving up.
    pub max_name_attempts: usize,
    /// Identifier casing and reserved words.
    pub naming: NamingOptions,
    /// Which operations contribute synthesized types.
    pub operations: OperationFilter,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_name_attempts: 100,
            naming: NamingOptions::default(),
            operations: OperationFilter::default(),
        }
    }
}

/// Order in which undiscriminated union variants are probed during decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeOrder {
    /// Declaration order of `oneOf`/`anyOf` members.
    Declaration,
    /// Records with more required fields first, then other kinds, then
    /// dynamic values; ties keep declaration order.
    MostSpecificFirst,
}

/// Options for the value-level [`crate::runtime`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DecodeOptions {
    /// Maximum payload nesting depth.
    pub max_depth: usize,
    /// Probe order for undiscriminated unions.
    pub probe_order: ProbeOrder,
    /// Reject strings that do not match their declared `format`.
    pub check_formats: bool,
    /// Reject keys that a record neither declares nor allows as additional.
    pub deny_unknown_fields: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: 128,
            probe_order: ProbeOrder::Declaration,
            check_formats: true,
            deny_unknown_fields: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_options_serde_round_trip() {
        let opts = CompileOptions {
            max_depth: 10,
            max_name_attempts: 3,
            naming: NamingOptions {
                type_style: CasingStyle::Snake,
                ..NamingOptions::default()
            },
            operations: OperationFilter::default(),
        };

        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains("\"max-depth\""));
        assert!(json.contains("\"max-name-attempts\""));
        assert!(json.contains("\"type-style\":\"snake\""));

        let back: CompileOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_depth, 10);
        assert_eq!(back.max_name_attempts, 3);
        assert_eq!(back.naming.type_style, CasingStyle::Snake);
    }

    #[test]
    fn test_partial_options_fill_defaults() {
        let opts: CompileOptions = serde_json::from_str(r#"{"max-depth": 5}"#).unwrap();
        assert_eq!(opts.max_depth, 5);
        assert_eq!(opts.max_name_attempts, 100);
        assert_eq!(opts.naming.field_style, CasingStyle::Pascal);
    }

    #[test]
    fn test_operation_filter() {
        let filter = OperationFilter {
            include_tags: vec!["pets".to_string()],
            exclude_operation_ids: vec!["deletePet".to_string()],
            ..OperationFilter::default()
        };
        let pets = vec!["pets".to_string()];
        assert!(filter.accepts("listPets", &pets));
        assert!(!filter.accepts("deletePet", &pets));
        assert!(!filter.accepts("listUsers", &["users".to_string()]));
    }

    #[test]
    fn test_decode_options_kebab_case() {
        let opts: DecodeOptions =
            serde_json::from_str(r#"{"probe-order": "most-specific-first"}"#).unwrap();
        assert_eq!(opts.probe_order, ProbeOrder::MostSpecificFirst);
        assert!(opts.check_formats);
    }
}
