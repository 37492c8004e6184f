//! Loosely-typed record values shared by every connector.

use std::cmp::Ordering;

use serde_json::{Map, Value};

/// One persisted row: a property-name to value mapping.
///
/// Connectors neither know nor care about entity types; every row that
/// crosses the connector boundary is a `Record`.
pub type Record = Map<String, Value>;

/// Canonical hash key for a value.
///
/// Distinct JSON values stay distinct (`1` becomes `1`, `"1"` becomes
/// `"\"1\""`), which makes the result safe to use as a map key for
/// foreign-key values of any primitive type.
pub fn canonical_key(value: &Value) -> String {
    value.to_string()
}

/// Human-readable form of an identifier value for error messages.
///
/// Strings render without the surrounding JSON quotes; everything else
/// renders as its JSON text.
pub fn id_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a looked-up property is absent or explicitly null.
pub fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total ordering over values, used when sorting result sets.
///
/// Null sorts first, then booleans, numbers, strings; arrays and objects
/// sort by their JSON text as a last resort.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_keys_distinguish_value_types() {
        assert_eq!(canonical_key(&json!(1)), "1");
        assert_eq!(canonical_key(&json!("1")), "\"1\"");
        assert_ne!(canonical_key(&json!(1)), canonical_key(&json!("1")));
        assert_ne!(canonical_key(&json!(true)), canonical_key(&json!("true")));
    }

    #[test]
    fn id_display_unquotes_strings() {
        assert_eq!(id_display(&json!("abc-1")), "abc-1");
        assert_eq!(id_display(&json!(42)), "42");
    }

    #[test]
    fn values_order_across_types() {
        let mut values = vec![json!("b"), json!(2), json!(true), json!(null), json!(1), json!("a")];
        values.sort_by(compare_values);
        assert_eq!(
            values,
            vec![json!(null), json!(true), json!(1), json!(2), json!("a"), json!("b")]
        );
    }

    #[test]
    fn missing_detects_absent_and_null() {
        let mut record = Record::new();
        record.insert("a".to_string(), json!(null));
        record.insert("b".to_string(), json!(0));
        assert!(is_missing(record.get("a")));
        assert!(is_missing(record.get("zzz")));
        assert!(!is_missing(record.get("b")));
    }
}
