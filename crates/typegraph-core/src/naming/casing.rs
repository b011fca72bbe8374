//! Pluggable identifier casing.
//!
//! The allocator never hard-codes a target language's conventions; it asks
//! an [`IdentifierCasing`] to turn raw schema text into identifiers.
//! [`StyleCasing`] is the built-in strategy, configured from
//! [`NamingOptions`].

use std::collections::HashSet;

use heck::ToSnakeCase;

use crate::config::{CasingStyle, NamingOptions};

/// Turns raw schema text (component keys, property names, enum literals)
/// into identifiers.
///
/// Implementations must be deterministic and should return only
/// characters valid in the target language. An empty return value is
/// replaced by the caller.
pub trait IdentifierCasing {
    fn type_name(&self, raw: &str) -> String;
    fn field_name(&self, raw: &str) -> String;
    fn constant_name(&self, raw: &str) -> String;

    /// Whether `ident` is reserved by the target language.
    fn is_reserved(&self, _ident: &str) -> bool {
        false
    }
}

/// [`IdentifierCasing`] driven by [`CasingStyle`]s, initialisms and a
/// reserved-word list.
#[derive(Debug, Clone)]
pub struct StyleCasing {
    type_style: CasingStyle,
    field_style: CasingStyle,
    initialisms: HashSet<String>,
    reserved: HashSet<String>,
}

impl StyleCasing {
    pub fn new(options: &NamingOptions) -> Self {
        Self {
            type_style: options.type_style,
            field_style: options.field_style,
            initialisms: options.initialisms.iter().map(|s| s.to_uppercase()).collect(),
            reserved: options.reserved_words.iter().cloned().collect(),
        }
    }

    fn apply(&self, style: CasingStyle, raw: &str) -> String {
        let ident = match style {
            CasingStyle::Pascal => words(raw)
                .iter()
                .map(|w| self.capitalize(w))
                .collect::<String>(),
            CasingStyle::Camel => words(raw)
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.clone() } else { self.capitalize(w) })
                .collect::<String>(),
            CasingStyle::Snake => words(raw).join("_"),
            CasingStyle::Preserve => raw
                .chars()
                .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
                .collect(),
        };
        guard_leading_digit(ident, style)
    }

    fn capitalize(&self, word: &str) -> String {
        let upper = word.to_uppercase();
        if self.initialisms.contains(&upper) {
            return upper;
        }
        let mut out = String::with_capacity(word.len());
        let mut done = false;
        for c in word.chars() {
            if !done && c.is_alphabetic() {
                out.extend(c.to_uppercase());
                done = true;
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl Default for StyleCasing {
    fn default() -> Self {
        Self::new(&NamingOptions::default())
    }
}

impl IdentifierCasing for StyleCasing {
    fn type_name(&self, raw: &str) -> String {
        self.apply(self.type_style, raw)
    }

    fn field_name(&self, raw: &str) -> String {
        self.apply(self.field_style, raw)
    }

    fn constant_name(&self, raw: &str) -> String {
        self.apply(self.type_style, raw)
    }

    fn is_reserved(&self, ident: &str) -> bool {
        self.reserved.contains(ident)
    }
}

/// Lower-case words of `raw`, split on case changes and non-alphanumerics.
fn words(raw: &str) -> Vec<String> {
    raw.to_snake_case()
        .split('_')
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

fn guard_leading_digit(ident: String, style: CasingStyle) -> String {
    if !ident.starts_with(|c: char| c.is_ascii_digit()) {
        return ident;
    }
    match style {
        CasingStyle::Pascal | CasingStyle::Preserve => format!("N{ident}"),
        CasingStyle::Camel => format!("n{ident}"),
        CasingStyle::Snake => format!("n_{ident}"),
    }
}
