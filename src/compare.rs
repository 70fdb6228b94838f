//! Deep structural comparison between JSON values.
//!
//! Rules:
//! - scalars compare by value, with numeric cross-type equality (1 == 1.0)
//! - sequences compare element-wise, order relevant
//! - maps compare by key set and per-key value, key order irrelevant

use serde_json::Value;

/// True when `a` and `b` are structurally equal.
pub fn values_equal(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
    (Value::Array(xs), Value::Array(ys)) => {
      xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| values_equal(x, y))
    }
    (Value::Object(xs), Value::Object(ys)) => {
      xs.len() == ys.len()
        && xs
          .iter()
          .all(|(k, v)| ys.get(k).map_or(false, |w| values_equal(v, w)))
    }
    _ => a == b,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn nested_sequences_compare_elementwise() {
    assert!(values_equal(&json!([1, [2, 3]]), &json!([1, [2, 3]])));
    assert!(!values_equal(&json!([1, 2]), &json!([2, 1])), "sequence order is relevant");
    assert!(!values_equal(&json!([1, 2]), &json!([1, 2, 3])));
  }

  #[test]
  fn map_key_order_is_irrelevant() {
    assert!(values_equal(&json!({"a": 1, "b": 2}), &json!({"b": 2, "a": 1})));
    assert!(!values_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
    assert!(!values_equal(&json!({"a": 1}), &json!({"a": 2})));
  }

  #[test]
  fn numbers_compare_across_integer_and_float() {
    assert!(values_equal(&json!(1), &json!(1.0)));
    assert!(values_equal(&json!([0]), &json!([0.0])));
    assert!(!values_equal(&json!(1), &json!(1.5)));
  }

  #[test]
  fn scalars_compare_by_value_and_type() {
    assert!(values_equal(&json!("a"), &json!("a")));
    assert!(!values_equal(&json!("1"), &json!(1)));
    assert!(!values_equal(&json!(null), &json!(0)));
    assert!(values_equal(&json!(null), &json!(null)));
    assert!(!values_equal(&json!(true), &json!(1)));
  }

  #[test]
  fn deep_mixed_structures() {
    let a = json!({"items": [{"id": 1, "tags": ["x", "y"]}], "total": 1});
    let b = json!({"total": 1.0, "items": [{"tags": ["x", "y"], "id": 1}]});
    assert!(values_equal(&a, &b));
    let c = json!({"total": 1, "items": [{"tags": ["y", "x"], "id": 1}]});
    assert!(!values_equal(&a, &c), "nested sequence order still matters");
  }
}
