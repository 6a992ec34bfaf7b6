//! Field access and coercion helpers shared by every component.
//!
//! Records are plain `serde_json::Value`s. A field lookup on a non-object
//! or a missing field is "absent", and absent is treated exactly like an
//! explicit `null`.

use serde_json::Value;

/// Returns the field's value, or `None` when it is absent or `null`.
pub fn field<'a>(item: &'a Value, name: &str) -> Option<&'a Value> {
    match item.get(name) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value),
    }
}

/// Renders a value the way script engines do for `String(value)`.
///
/// Integral numbers print without a fractional part, arrays join their
/// elements with `,` and objects collapse to `[object Object]`.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format_number(f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => stringify(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn format_number(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{}", f as i128)
    } else {
        f.to_string()
    }
}

/// Numeric coercion: numbers as-is, numeric strings parsed, booleans as 1/0.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Equality where two numbers compare by value (`1` equals `1.0`).
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// True for criteria values that select nothing: `null` and the empty string.
/// Whitespace is a real criterion.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_treats_null_as_absent() {
        let item = json!({"a": null, "b": 1});
        assert!(field(&item, "a").is_none());
        assert!(field(&item, "missing").is_none());
        assert_eq!(field(&item, "b"), Some(&json!(1)));
        assert!(field(&json!(5), "a").is_none());
    }

    #[test]
    fn test_stringify_matches_script_rendering() {
        assert_eq!(stringify(&json!("Active")), "Active");
        assert_eq!(stringify(&json!(10)), "10");
        assert_eq!(stringify(&json!(10.0)), "10");
        assert_eq!(stringify(&json!(1.5)), "1.5");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!([1, "a", null])), "1,a,");
        assert_eq!(stringify(&json!({"x": 1})), "[object Object]");
    }

    #[test]
    fn test_to_number_coercions() {
        assert_eq!(to_number(&json!(3)), Some(3.0));
        assert_eq!(to_number(&json!(" 4.5 ")), Some(4.5));
        assert_eq!(to_number(&json!(false)), Some(0.0));
        assert_eq!(to_number(&json!("abc")), None);
        assert_eq!(to_number(&json!(null)), None);
    }

    #[test]
    fn test_loose_eq_numbers() {
        assert!(loose_eq(&json!(1), &json!(1.0)));
        assert!(!loose_eq(&json!(1), &json!("1")));
    }

    #[test]
    fn test_blank_is_null_or_empty() {
        assert!(is_blank(&json!(null)));
        assert!(is_blank(&json!("")));
        assert!(!is_blank(&json!("  ")));
        assert!(!is_blank(&json!(0)));
        assert!(!is_blank(&json!(false)));
    }
}
