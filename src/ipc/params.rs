use crate::error::AppError;
use serde_json::{Map, Value};

pub fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, AppError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::BadParams(format!("missing {}", key)))
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> Result<Option<&'a str>, AppError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(AppError::BadParams(format!("{} must be a string", key))),
    }
}

/// Absent means "leave as is", `null` means "clear".
pub fn nullable_str(params: &Value, key: &str) -> Result<Option<Option<String>>, AppError> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(Value::String(s)) => Ok(Some(Some(s.clone()))),
        Some(_) => Err(AppError::BadParams(format!(
            "{} must be a string or null",
            key
        ))),
    }
}

pub fn required_f64(params: &Value, key: &str) -> Result<f64, AppError> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| AppError::BadParams(format!("{} must be a number", key)))
}

pub fn optional_bool(params: &Value, key: &str) -> Result<Option<bool>, AppError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(AppError::BadParams(format!("{} must be boolean", key))),
    }
}

pub fn optional_u64(params: &Value, key: &str) -> Result<Option<u64>, AppError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| AppError::BadParams(format!("{} must be a non-negative integer", key))),
    }
}

pub fn object<'a>(params: &'a Value, key: &str) -> Result<&'a Map<String, Value>, AppError> {
    params
        .get(key)
        .and_then(|v| v.as_object())
        .ok_or_else(|| AppError::BadParams(format!("{} must be an object", key)))
}
