//! Helpers over [`serde_json::Value`], the data model shared by templates,
//! component fields and dispatch payloads.

use serde_json::Value;

/// Truth value of `value` in template conditions: `false`, `0`, `nil` and
/// empty strings, arrays and objects are false; everything else is true.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text written by a template action for `value`.
///
/// Strings are written as-is, `nil` writes nothing and composite values are
/// written as compact JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Short type description used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "slice",
        Value::Object(_) => "map",
    }
}

/// Escapes `&`, `<`, `>`, `"` and `'` for use in text and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// JSON encoding of `value`, HTML-escaped so it can sit inside markup.
pub fn to_json_html(value: &Value) -> String {
    escape_html(&value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(0.0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(!is_truthy(&json!({})));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(-1)));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([0])));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(&json!("hi")), "hi");
        assert_eq!(to_text(&json!(42)), "42");
        assert_eq!(to_text(&json!(1.5)), "1.5");
        assert_eq!(to_text(&json!(null)), "");
        assert_eq!(to_text(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&#34;x&#34;&gt;&amp;&#39;");
        assert_eq!(to_json_html(&json!({"a": "<b>"})), "{&#34;a&#34;:&#34;&lt;b&gt;&#34;}");
    }
}
