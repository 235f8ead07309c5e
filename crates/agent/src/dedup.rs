//! Duplicate-call detection.

use serde_json::Value;
use wayfarer_config::DuplicateDetection;
use wayfarer_core::capability::Arguments;

/// Whether two argument sets name the same call under `mode`.
///
/// Key order never matters. `Normalized` also trims and lower-cases
/// strings and compares numbers by value, so `{"city": " Paris"}` and
/// `{"city": "paris"}`, or `100` and `100.0`, are the same call.
pub fn same_arguments(mode: DuplicateDetection, a: &Arguments, b: &Arguments) -> bool {
    match mode {
        DuplicateDetection::Exact => a == b,
        DuplicateDetection::Normalized => {
            a.len() == b.len()
                && a.iter().all(|(key, left)| {
                    b.get(key)
                        .is_some_and(|right| normalize(left) == normalize(right))
                })
        }
    }
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_lowercase()),
        Value::Number(n) => n
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: serde_json::Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn key_order_never_matters() {
        let a = args(serde_json::json!({"amount": 100, "from": "EUR", "to": "USD"}));
        let b: Arguments = serde_json::from_str(r#"{"to":"USD","from":"EUR","amount":100}"#).unwrap();
        assert!(same_arguments(DuplicateDetection::Exact, &a, &b));
        assert!(same_arguments(DuplicateDetection::Normalized, &a, &b));
    }

    #[test]
    fn exact_is_case_sensitive() {
        let a = args(serde_json::json!({"city": "Paris"}));
        let b = args(serde_json::json!({"city": " paris "}));
        assert!(!same_arguments(DuplicateDetection::Exact, &a, &b));
        assert!(same_arguments(DuplicateDetection::Normalized, &a, &b));
    }

    #[test]
    fn numbers_compare_by_value_when_normalized() {
        let a = args(serde_json::json!({"amount": 100}));
        let b = args(serde_json::json!({"amount": 100.0}));
        assert!(!same_arguments(DuplicateDetection::Exact, &a, &b));
        assert!(same_arguments(DuplicateDetection::Normalized, &a, &b));
    }

    #[test]
    fn different_keys_or_values_differ() {
        let paris = args(serde_json::json!({"city": "Paris"}));
        let rome = args(serde_json::json!({"city": "Rome"}));
        let paris_fr = args(serde_json::json!({"city": "Paris", "country": "FR"}));
        for mode in [DuplicateDetection::Exact, DuplicateDetection::Normalized] {
            assert!(!same_arguments(mode, &paris, &rome));
            assert!(!same_arguments(mode, &paris, &paris_fr));
            assert!(!same_arguments(mode, &paris_fr, &paris));
        }
    }
}
