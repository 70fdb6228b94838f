//! Runtime values for the interpreter.
//!
//! Arrays and objects are reference types (shared `Rc<RefCell<..>>` storage, so
//! aliasing and in-place mutation behave the way script authors expect).
//! Objects keep insertion order as an association list.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::interp::{Closure, Native};

const MAX_RENDER_DEPTH: usize = 8;
const MAX_JSON_DEPTH: usize = 64;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Vec<(String, Value)>>>),
    Function(Rc<Closure>),
    Native(Native),
    /// A builtin method bound to its receiver, e.g. `arr.push`.
    Method { recv: Box<Value>, name: String },
}

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: Vec<(String, Value)>) -> Value {
        Value::Object(Rc::new(RefCell::new(props)))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
            Value::Function(_) | Value::Native(_) | Value::Method { .. } => true,
        }
    }

    /// The `typeof` string.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) | Value::Method { .. } => "function",
        }
    }

    /// Strict equality. Scalars compare by value, arrays/objects/functions by
    /// identity. `NaN` is not equal to itself.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            (Value::Method { recv: ra, name: na }, Value::Method { recv: rb, name: nb }) => {
                na == nb && ra.strict_eq(rb)
            }
            _ => false,
        }
    }

    /// Console rendering: strings are shown quoted, functions as a
    /// placeholder, arrays and objects structurally. Beyond the depth cap
    /// (which also catches cycles) nested collections degrade to `[Array]` /
    /// `[Object]`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_at(&mut out, 0);
        out
    }

    /// Like [`render`](Value::render) but a top-level string stays unquoted.
    /// Used for string coercion (`String(x)`, `+` concatenation, `.join`).
    pub fn render_plain(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.render(),
        }
    }

    fn render_at(&self, out: &mut String, depth: usize) {
        match self {
            Value::Undefined => out.push_str("undefined"),
            Value::Null => out.push_str("null"),
            Value::Bool(true) => out.push_str("true"),
            Value::Bool(false) => out.push_str("false"),
            Value::Num(n) => out.push_str(&fmt_num(*n)),
            Value::Str(s) => escape_into(out, s),
            Value::Array(items) => {
                if depth >= MAX_RENDER_DEPTH {
                    out.push_str("[Array]");
                    return;
                }
                out.push('[');
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render_at(out, depth + 1);
                }
                out.push(']');
            }
            Value::Object(props) => {
                if depth >= MAX_RENDER_DEPTH {
                    out.push_str("[Object]");
                    return;
                }
                let props = props.borrow();
                if props.is_empty() {
                    out.push_str("{}");
                    return;
                }
                out.push_str("{ ");
                for (i, (key, value)) in props.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if bare_key(key) {
                        out.push_str(key);
                    } else {
                        escape_into(out, key);
                    }
                    out.push_str(": ");
                    value.render_at(out, depth + 1);
                }
                out.push_str(" }");
            }
            Value::Function(closure) => match &closure.name {
                Some(name) => {
                    out.push_str("[Function: ");
                    out.push_str(name);
                    out.push(']');
                }
                None => out.push_str("[Function (anonymous)]"),
            },
            Value::Native(_) => out.push_str("[Function (native)]"),
            Value::Method { name, .. } => {
                out.push_str("[Function: ");
                out.push_str(name);
                out.push(']');
            }
        }
    }

    /// Convert to a JSON value. `undefined` and functions become `null` inside
    /// arrays and are omitted from objects; non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_at(0)
    }

    fn to_json_at(&self, depth: usize) -> serde_json::Value {
        if depth > MAX_JSON_DEPTH {
            return serde_json::Value::Null;
        }
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Num(n) => {
                // Whole numbers serialize as integers so `JSON.stringify(1)`
                // prints `1`, not `1.0`.
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.0e15 {
                    serde_json::Value::Number(serde_json::Number::from(*n as i64))
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(
                items.borrow().iter().map(|v| v.to_json_at(depth + 1)).collect(),
            ),
            Value::Object(props) => {
                let mut map = serde_json::Map::new();
                for (key, value) in props.borrow().iter() {
                    match value {
                        Value::Undefined
                        | Value::Function(_)
                        | Value::Native(_)
                        | Value::Method { .. } => {}
                        other => {
                            map.insert(key.clone(), other.to_json_at(depth + 1));
                        }
                    }
                }
                serde_json::Value::Object(map)
            }
            Value::Function(_) | Value::Native(_) | Value::Method { .. } => serde_json::Value::Null,
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Value::Num(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Number-to-string the way scripts print numbers: integral values without a
/// trailing `.0`, and the special values spelled `NaN` / `Infinity`.
pub fn fmt_num(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    if n == 0.0 {
        return "0".to_string();
    }
    format!("{}", n)
}

fn bare_key(key: &str) -> bool {
    !key.is_empty()
        && key.chars().next().is_some_and(|c| !c.is_ascii_digit())
        && key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn escape_into(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_follows_script_rules() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Num(0.0).truthy());
        assert!(!Value::Num(f64::NAN).truthy());
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Num(-1.0).truthy());
        assert!(Value::Str("0".to_string()).truthy());
        assert!(Value::array(Vec::new()).truthy());
        assert!(Value::object(Vec::new()).truthy());
    }

    #[test]
    fn numbers_format_without_trailing_zero() {
        assert_eq!(fmt_num(5.0), "5");
        assert_eq!(fmt_num(2.5), "2.5");
        assert_eq!(fmt_num(-0.0), "0");
        assert_eq!(fmt_num(f64::NAN), "NaN");
        assert_eq!(fmt_num(f64::INFINITY), "Infinity");
        assert_eq!(fmt_num(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn render_quotes_strings_and_shows_structure() {
        let v = Value::array(vec![
            Value::Num(1.0),
            Value::Str("two".to_string()),
            Value::object(vec![("ok".to_string(), Value::Bool(true))]),
        ]);
        assert_eq!(v.render(), "[1, \"two\", { ok: true }]");
        assert_eq!(Value::Str("hi".to_string()).render(), "\"hi\"");
        assert_eq!(Value::Str("hi".to_string()).render_plain(), "hi");
    }

    #[test]
    fn render_degrades_past_the_depth_cap() {
        let mut v = Value::array(vec![Value::Num(0.0)]);
        for _ in 0..(MAX_RENDER_DEPTH + 2) {
            v = Value::array(vec![v]);
        }
        assert!(v.render().contains("[Array]"));
    }

    #[test]
    fn render_survives_cycles() {
        let inner = Rc::new(RefCell::new(vec![Value::Num(1.0)]));
        let cyclic = Value::Array(inner.clone());
        inner.borrow_mut().push(cyclic.clone());
        assert!(cyclic.render().contains("[Array]"));
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let source = json!({"name": "kata", "tags": ["a", "b"], "count": 3, "nested": {"ok": true}});
        let v = Value::from_json(&source);
        assert_eq!(v.to_json(), source);
    }

    #[test]
    fn json_conversion_nulls_out_non_data() {
        let v = Value::array(vec![Value::Undefined, Value::Num(f64::NAN)]);
        assert_eq!(v.to_json(), json!([null, null]));
        let obj = Value::object(vec![
            ("keep".to_string(), Value::Num(1.0)),
            ("drop".to_string(), Value::Undefined),
        ]);
        assert_eq!(obj.to_json(), json!({"keep": 1}));
    }

    #[test]
    fn strict_equality_is_identity_for_collections() {
        let a = Value::array(vec![Value::Num(1.0)]);
        let b = Value::array(vec![Value::Num(1.0)]);
        assert!(a.strict_eq(&a.clone()));
        assert!(!a.strict_eq(&b));
        assert!(Value::Num(2.0).strict_eq(&Value::Num(2.0)));
        assert!(!Value::Num(f64::NAN).strict_eq(&Value::Num(f64::NAN)));
        assert!(!Value::Str("1".to_string()).strict_eq(&Value::Num(1.0)));
    }
}
