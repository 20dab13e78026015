//! Tolerant JSON decoding.
//!
//! The cloud API is undocumented and inconsistent: the same flag arrives as
//! `true`, `1`, `"1"` or `"True"` depending on the endpoint, numbers show up
//! as strings, and new fields appear without notice. Instead of spreading
//! `deserialize_with` helpers over every struct, each entity implements
//! [`FromWire`] as a flat list of `field: f.rule("wireName", default)` lines
//! against a [`Fields`] accessor. The coercion rules live here, in one
//! place, and never fail: a value that does not fit its rule falls back to
//! the field's default.
//!
//! ```rust,ignore
//! impl FromWire for Outlet {
//!     fn from_wire(f: &Fields<'_>) -> Self {
//!         Self {
//!             index: f.string("outletIndex"),
//!             temperature: f.f64_or("outletTemp", 0.0),
//!         }
//!     }
//! }
//! ```

use std::str::FromStr;

use serde_json::{Map, Value};

/// An entity that can be built from an arbitrary JSON value without failing.
pub trait FromWire: Sized {
    fn from_wire(fields: &Fields<'_>) -> Self;
}

/// Decode any JSON value into `T` using the lenient rules.
///
/// Non-object input (null, arrays, scalars) decodes to an all-defaults `T`.
pub fn decode<T: FromWire>(value: &Value) -> T {
    T::from_wire(&Fields::new(value))
}

/// Read-only view over one JSON object, applying coercion rules per field.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Fields<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self {
            map: value.as_object(),
        }
    }

    /// Raw access, treating JSON `null` the same as a missing key.
    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.map
            .and_then(|m| m.get(key))
            .filter(|v| !v.is_null())
    }

    // ── Booleans ────────────────────────────────────────────────────

    /// `true`, any non-zero number, `"1"` or `"true"` (any case). Everything
    /// else, including a missing key, is `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.raw(key).is_some_and(coerce_bool)
    }

    // ── Numbers ─────────────────────────────────────────────────────

    pub fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.raw(key).and_then(coerce_f64).unwrap_or(default)
    }

    pub fn i64_or(&self, key: &str, default: i64) -> i64 {
        self.raw(key).and_then(coerce_i64).unwrap_or(default)
    }

    pub fn opt_i64(&self, key: &str) -> Option<i64> {
        self.raw(key).and_then(coerce_i64)
    }

    pub fn opt_f64(&self, key: &str) -> Option<f64> {
        self.raw(key).and_then(coerce_f64)
    }

    // ── Strings ─────────────────────────────────────────────────────

    /// String field defaulting to the empty string.
    pub fn string(&self, key: &str) -> String {
        self.string_or(key, "")
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.opt_string(key).unwrap_or_else(|| default.to_owned())
    }

    /// Strings pass through; numbers and booleans are rendered as text.
    pub fn opt_string(&self, key: &str) -> Option<String> {
        self.raw(key).and_then(coerce_string)
    }

    // ── Enumerations ────────────────────────────────────────────────

    /// Parse a string enumeration; unknown or non-string values yield `default`.
    pub fn enum_or<E: FromStr>(&self, key: &str, default: E) -> E {
        self.raw(key)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    }

    // ── Nested values ───────────────────────────────────────────────

    /// Nested object; missing or malformed yields an all-defaults `T`.
    pub fn object<T: FromWire>(&self, key: &str) -> T {
        match self.raw(key) {
            Some(value) => decode(value),
            None => decode(&Value::Null),
        }
    }

    /// Array of objects; anything that is not an array yields an empty list.
    pub fn list<T: FromWire>(&self, key: &str) -> Vec<T> {
        self.raw(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().map(decode).collect())
            .unwrap_or_default()
    }

    /// Array of strings, skipping entries that cannot be rendered as text.
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.raw(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(coerce_string).collect())
            .unwrap_or_default()
    }
}

// ── Coercion rules ──────────────────────────────────────────────────

pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            s == "1" || s.eq_ignore_ascii_case("true")
        }
        _ => false,
    }
}

pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
