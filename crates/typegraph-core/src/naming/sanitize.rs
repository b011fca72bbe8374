//! Enum constant names from arbitrary literal values.
//!
//! Two different literals must never produce the same constant. Values are
//! first cased plainly (`"in-progress"` → `InProgress`); values whose plain
//! names collide within one enum are re-derived with a marker word for
//! every character casing would drop (`"Foo-Bar"` → `FooMinusBar`,
//! `"Foo Bar"` → `FooSpaceBar`). Surrounding whitespace is always spelled
//! out positionally, so `" Foo "`, `" Foo"` and `"Foo"` stay distinct.

use serde_json::Value;

use super::casing::IdentifierCasing;

const EMPTY: &str = "Empty";

/// Constant names for `literals`, in order, unique within the enum.
///
/// `overrides` (from `x-enum-names`) are used verbatim when present.
pub fn enum_constant_names(
    literals: &[Value],
    overrides: Option<&[String]>,
    casing: &dyn IdentifierCasing,
) -> Vec<String> {
    let names: Vec<String> = match overrides {
        Some(names) => names.to_vec(),
        None => {
            let texts: Vec<String> = literals.iter().map(literal_text).collect();
            let plain: Vec<String> = texts.iter().map(|t| plain_name(t, casing)).collect();
            texts
                .iter()
                .zip(&plain)
                .map(|(text, name)| {
                    let collides = plain.iter().filter(|other| *other == name).count() > 1;
                    if collides || name.is_empty() {
                        marked_name(text, casing)
                    } else {
                        name.clone()
                    }
                })
                .collect()
        }
    };
    dedupe(names)
}

/// Text an enum literal is named after.
pub fn literal_text(literal: &Value) -> String {
    match literal {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn plain_name(text: &str, casing: &dyn IdentifierCasing) -> String {
    if text.is_empty() {
        return casing.constant_name(EMPTY);
    }
    let (leading, core, trailing) = split_whitespace(text);
    casing.constant_name(&format!(
        "{} {core} {}",
        positional("leading", leading),
        positional("trailing", trailing)
    ))
}

fn marked_name(text: &str, casing: &dyn IdentifierCasing) -> String {
    if text.is_empty() {
        return casing.constant_name(EMPTY);
    }
    let (leading, core, trailing) = split_whitespace(text);
    let mut words = String::new();
    for c in core.chars() {
        if c.is_alphanumeric() {
            words.push(c);
        } else {
            words.push(' ');
            words.push_str(&char_marker(c));
            words.push(' ');
        }
    }
    let name = casing.constant_name(&format!(
        "{} {words} {}",
        positional("leading", leading),
        positional("trailing", trailing)
    ));
    if name.is_empty() {
        casing.constant_name(EMPTY)
    } else {
        name
    }
}

fn split_whitespace(text: &str) -> (&str, &str, &str) {
    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len().max(start);
    (&text[..start], &text[start..end], &text[end..])
}

/// `"leading space tab"` for a `" \t"` prefix; empty when there is none.
fn positional(position: &str, whitespace: &str) -> String {
    if whitespace.is_empty() {
        return String::new();
    }
    let markers: Vec<String> = whitespace.chars().map(char_marker).collect();
    format!("{position} {}", markers.join(" "))
}

fn char_marker(c: char) -> String {
    match c {
        ' ' => "space".to_string(),
        '\t' => "tab".to_string(),
        '\n' => "newline".to_string(),
        '-' => "minus".to_string(),
        '+' => "plus".to_string(),
        '_' => "underscore".to_string(),
        '.' => "dot".to_string(),
        ',' => "comma".to_string(),
        '/' => "slash".to_string(),
        '\\' => "backslash".to_string(),
        ':' => "colon".to_string(),
        '@' => "at".to_string(),
        '#' => "hash".to_string(),
        '&' => "and".to_string(),
        '*' => "star".to_string(),
        '=' => "equals".to_string(),
        '<' => "less".to_string(),
        '>' => "greater".to_string(),
        '!' => "bang".to_string(),
        '?' => "question".to_string(),
        '%' => "percent".to_string(),
        '$' => "dollar".to_string(),
        other => format!("x{:x}", other as u32),
    }
}

/// Keep the first occurrence of each name; later ones get `2`, `3`, ...
fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .map(|name| {
            if seen.insert(name.clone()) {
                return name;
            }
            let mut n = 2;
            loop {
                let candidate = format!("{name}{n}");
                if seen.insert(candidate.clone()) {
                    return candidate;
                }
                n += 1;
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::casing::StyleCasing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn names(values: Value) -> Vec<String> {
        let literals = values.as_array().unwrap().clone();
        enum_constant_names(&literals, None, &StyleCasing::default())
    }

    #[test]
    fn test_plain_values() {
        assert_eq!(
            names(json!(["available", "in-progress", "SOLD_OUT"])),
            vec!["Available", "InProgress", "SoldOut"]
        );
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(names(json!(["", "a"])), vec!["Empty", "A"]);
    }

    #[test]
    fn test_leading_digit() {
        assert_eq!(names(json!(["1Foo"])), vec!["N1Foo"]);
    }

    #[test]
    fn test_surrounding_whitespace_stays_distinct() {
        let got = names(json!([" Foo ", "Foo", " Foo"]));
        assert_eq!(got, vec!["LeadingSpaceFooTrailingSpace", "Foo", "LeadingSpaceFoo"]);
    }

    #[test]
    fn test_colliding_punctuation_is_marked() {
        assert_eq!(
            names(json!(["Foo-Bar", "Foo Bar"])),
            vec!["FooMinusBar", "FooSpaceBar"]
        );
    }

    #[test]
    fn test_numbers_and_residual_collisions() {
        assert_eq!(names(json!([1, -1, 2])), vec!["N1", "Minus1", "N2"]);
        assert_eq!(names(json!(["a", "A"])), vec!["A", "A2"]);
    }

    #[test]
    fn test_unnameable_value_gets_marker() {
        assert_eq!(names(json!(["-", "ok"])), vec!["Minus", "Ok"]);
    }

    #[test]
    fn test_overrides_win() {
        let literals = vec![json!("a"), json!("b")];
        let overrides = vec!["Alpha".to_string(), "Beta".to_string()];
        assert_eq!(
            enum_constant_names(&literals, Some(&overrides), &StyleCasing::default()),
            vec!["Alpha", "Beta"]
        );
    }
}
