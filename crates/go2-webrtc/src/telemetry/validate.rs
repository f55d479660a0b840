// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Numeric field validation.
//!
//! A scalar is valid iff it is a JSON number with a finite value; a list is
//! valid iff every element is. Non-finite values never survive JSON parsing
//! as numbers, so they show up here as `null` (or another non-number).

use serde_json::{Map, Value};
use thiserror::Error;

/// Why a telemetry record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null (non-finite or missing)",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, ValidationError> {
    value
        .as_object()
        .ok_or_else(|| ValidationError::new(field, format!("expected an object, got {}", describe(value))))
}

pub fn required<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a Value, ValidationError> {
    obj.get(key)
        .ok_or_else(|| ValidationError::new(key, "missing"))
}

/// Finite scalar.
pub fn finite(value: &Value, field: &str) -> Result<f64, ValidationError> {
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(ValidationError::new(field, format!("non-finite value {}", v))),
        None => Err(ValidationError::new(
            field,
            format!("expected a number, got {}", describe(value)),
        )),
    }
}

/// Sequence of finite scalars.
pub fn finite_list(value: &Value, field: &str) -> Result<Vec<f64>, ValidationError> {
    let items = value.as_array().ok_or_else(|| {
        ValidationError::new(field, format!("expected an array, got {}", describe(value)))
    })?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| finite(item, &format!("{}[{}]", field, i)))
        .collect()
}

/// Fixed-length sequence of finite scalars.
pub fn finite_array<const N: usize>(value: &Value, field: &str) -> Result<[f64; N], ValidationError> {
    let list = finite_list(value, field)?;
    let len = list.len();
    list.try_into().map_err(|_| {
        ValidationError::new(field, format!("expected {} elements, got {}", N, len))
    })
}

/// Finite scalar under `key` of `obj`.
pub fn field(obj: &Map<String, Value>, key: &str) -> Result<f64, ValidationError> {
    finite(required(obj, key)?, key)
}

pub fn list_field(obj: &Map<String, Value>, key: &str) -> Result<Vec<f64>, ValidationError> {
    finite_list(required(obj, key)?, key)
}

pub fn array_field<const N: usize>(
    obj: &Map<String, Value>,
    key: &str,
) -> Result<[f64; N], ValidationError> {
    finite_array(required(obj, key)?, key)
}
