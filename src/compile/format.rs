//! Python literal rendering for parameter values.
//!
//! The formatter is pure and total: an unrepresentable value degrades to its
//! string form rather than failing, so a half-built graph stays compilable.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::ParameterRole;

static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// check if a string is a legal Python identifier
pub fn is_identifier(s: &str) -> bool {
    IDENT_RE.is_match(s)
}

/// Render one parameter value as Python source.
///
/// - `None` for null/absent values
/// - `True`/`False` for booleans
/// - bracketed, comma-joined lists with string elements quoted
/// - a bare identifier stays unquoted when the parameter role is `Input`
///   (it is a variable reference, not a literal)
/// - path-named parameters are normalized against `path_root` before quoting
/// - any other string is single-quoted, numbers pass through as-is
pub fn format_value(
    value: Option<&serde_json::Value>,
    data_type: &str,
    name: &str,
    role: ParameterRole,
    path_root: Option<&str>,
) -> String {
    let Some(value) = value else {
        return "None".to_string();
    };
    match value {
        serde_json::Value::Null => "None".to_string(),
        serde_json::Value::Bool(b) => {
            if *b {
                "True".to_string()
            } else {
                "False".to_string()
            }
        }
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(format_element).collect();
            format!("[{}]", rendered.join(", "))
        }
        serde_json::Value::String(s) => {
            if role == ParameterRole::Input && is_identifier(s) {
                return s.clone();
            }
            if is_path_parameter(name) {
                return quote(&normalize_path(s, path_root));
            }
            if matches!(data_type, "int" | "float") && s.parse::<f64>().is_ok() {
                return s.clone();
            }
            quote(s)
        }
        // no Python rendering for nested objects; degrade to the string form
        other => quote(&other.to_string()),
    }
}

/// list elements carry no role or path semantics, only literal rendering
fn format_element(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "None".to_string(),
        serde_json::Value::Bool(b) => {
            if *b {
                "True".to_string()
            } else {
                "False".to_string()
            }
        }
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote(s),
        other => quote(&other.to_string()),
    }
}

/// single-quote a string, escaping backslashes and quotes
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// a parameter holds a file path when its name says so
fn is_path_parameter(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "path" || lower.ends_with("path") || lower.ends_with("file") || lower.ends_with("dir") || lower.ends_with("folder")
}

/// Normalize a path value: slash style is inferred from the supplied root,
/// and relative paths are made absolute against it. Without a root the
/// value passes through untouched.
fn normalize_path(
    value: &str,
    path_root: Option<&str>,
) -> String {
    let Some(root) = path_root else {
        return value.to_string();
    };
    let windows = root.contains('\\') || root.as_bytes().get(1) == Some(&b':');
    let (sep, wrong) = if windows { ('\\', '/') } else { ('/', '\\') };

    let mut path = value.replace(wrong, &sep.to_string());
    if !is_absolute(&path) {
        let mut root = root.replace(wrong, &sep.to_string());
        while root.ends_with(sep) {
            root.pop();
        }
        path = format!("{}{}{}", root, sep, path);
    }
    path
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || path.as_bytes().get(1) == Some(&b':')
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn fmt(value: serde_json::Value) -> String {
        format_value(Some(&value), "", "x", ParameterRole::Parameter, None)
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(fmt(json!(true)), "True");
        assert_eq!(fmt(json!(false)), "False");
        assert_eq!(fmt(json!(null)), "None");
        assert_eq!(format_value(None, "", "x", ParameterRole::Parameter, None), "None");
        assert_eq!(fmt(json!(0.7)), "0.7");
        assert_eq!(fmt(json!(42)), "42");
    }

    #[test]
    fn test_string_array() {
        assert_eq!(fmt(json!(["a", "b"])), "['a', 'b']");
        assert_eq!(fmt(json!([1, "b", true])), "[1, 'b', True]");
    }

    #[test]
    fn test_input_identifier_is_unquoted() {
        let value = json!("n01_out");
        assert_eq!(format_value(Some(&value), "", "df", ParameterRole::Input, None), "n01_out");
        // not an identifier, quoted even for inputs
        let value = json!("not an ident");
        assert_eq!(format_value(Some(&value), "", "df", ParameterRole::Input, None), "'not an ident'");
    }

    #[test]
    fn test_string_quoting_escapes() {
        assert_eq!(fmt(json!("it's")), "'it\\'s'");
    }

    #[test]
    fn test_path_normalization() {
        let value = json!("data/in.csv");
        assert_eq!(
            format_value(Some(&value), "", "input_path", ParameterRole::Parameter, Some("/srv/proj")),
            "'/srv/proj/data/in.csv'"
        );
        let value = json!("/abs/in.csv");
        assert_eq!(
            format_value(Some(&value), "", "input_path", ParameterRole::Parameter, Some("/srv/proj")),
            "'/abs/in.csv'"
        );
        // slash style follows the root context
        let value = json!("data/in.csv");
        assert_eq!(
            format_value(Some(&value), "", "path", ParameterRole::Parameter, Some("C:\\proj")),
            "'C:\\\\proj\\\\data\\\\in.csv'"
        );
    }

    #[test]
    fn test_numeric_string_with_numeric_type() {
        let value = json!("0.5");
        assert_eq!(format_value(Some(&value), "float", "threshold", ParameterRole::Parameter, None), "0.5");
        assert_eq!(format_value(Some(&value), "", "threshold", ParameterRole::Parameter, None), "'0.5'");
    }

    #[test]
    fn test_unrepresentable_degrades_to_string() {
        let rendered = fmt(json!({"k": 1}));
        assert!(rendered.starts_with('\'') && rendered.ends_with('\''));
    }
}
