//! Validation and coercion of untrusted settings data.
//!
//! A fixer turns an arbitrary `serde_json::Value` into a structurally valid
//! `T`, reporting whether the input needed any repair. Untyped data never
//! travels past the fixer.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Output of a fixer.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixed<T> {
    /// Always a usable value, even when `valid` is false.
    pub value: T,
    /// False when the raw input had to be coerced or defaulted.
    pub valid: bool,
}

impl<T> Fixed<T> {
    pub fn valid(value: T) -> Self {
        Self { value, valid: true }
    }

    pub fn invalid(value: T) -> Self {
        Self { value, valid: false }
    }
}

/// Pure conversion from raw input to a typed settings value.
pub trait Fixer<T>: Send + Sync + 'static {
    fn fix(&self, raw: &Value) -> Fixed<T>;
}

impl<T, F> Fixer<T> for F
where
    F: Fn(&Value) -> Fixed<T> + Send + Sync + 'static,
{
    fn fix(&self, raw: &Value) -> Fixed<T> {
        self(raw)
    }
}

/// Read `key` from `raw` as a `U`, or fall back to `default` if it is
/// missing or has the wrong type.
pub fn fix_field<U: DeserializeOwned>(raw: &Value, key: &str, default: U) -> U {
    raw.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(default)
}

/// Like [`fix_field`], but the value must also be one of `allowed`.
pub fn fix_in_set<U>(raw: &Value, key: &str, default: U, allowed: &[U]) -> U
where
    U: DeserializeOwned + PartialEq,
{
    raw.get(key)
        .and_then(|v| serde_json::from_value::<U>(v.clone()).ok())
        .filter(|v| allowed.contains(v))
        .unwrap_or(default)
}

/// Read `key` as an array, keeping only the elements that deserialize as `U`.
/// Falls back to `default` when the field is not an array at all.
pub fn fix_array<U: DeserializeOwned>(raw: &Value, key: &str, default: Vec<U>) -> Vec<U> {
    match raw.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
        _ => default,
    }
}

/// Wrap `value` in a [`Fixed`], valid only if it serializes back to exactly `raw`.
///
/// Extra fields, missing fields and coerced values all make the result invalid.
pub fn mark_fixed<T: Serialize>(raw: &Value, value: T) -> Fixed<T> {
    let valid = serde_json::to_value(&value)
        .map(|v| v == *raw)
        .unwrap_or(false);
    Fixed { value, valid }
}
