//! Helpers for the `{success, message, data}` response envelope.
//!
//! Endpoints disagree on field names, so every lookup takes a list of
//! candidate paths (dotted, e.g. `data.categories`) and uses the first hit.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::id_string;
use crate::error::{AppError, GENERIC_FAILURE_MESSAGE};

const MESSAGE_PATHS: [&str; 5] = ["message", "error.message", "error", "msg", "errors.0.msg"];

pub fn probe<'a>(body: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| lookup(body, path))
        .find(|value| !value.is_null())
}

fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = body;
    for segment in path.split('.').filter(|segment| !segment.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn probe_str(body: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(body, path))
        .find_map(id_string)
}

pub fn probe_bool(body: &Value, paths: &[&str]) -> Option<bool> {
    paths
        .iter()
        .filter_map(|path| lookup(body, path))
        .find_map(Value::as_bool)
}

pub fn probe_array(body: &Value, paths: &[&str]) -> Vec<Value> {
    paths
        .iter()
        .filter_map(|path| lookup(body, path))
        .find_map(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Deserializes every entry of the first matching array, skipping entries
/// that do not fit the expected shape.
pub fn probe_list<T: DeserializeOwned>(body: &Value, paths: &[&str]) -> Vec<T> {
    probe_array(body, paths)
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                tracing::warn!(error = %error, "Skipping unreadable list entry");
                None
            }
        })
        .collect()
}

pub fn probe_item<T: DeserializeOwned>(body: &Value, paths: &[&str]) -> Option<T> {
    paths
        .iter()
        .filter_map(|path| lookup(body, path))
        .filter(|value| value.is_object())
        .find_map(|value| serde_json::from_value::<T>(value.clone()).ok())
}

pub fn server_message(body: &Value) -> Option<String> {
    MESSAGE_PATHS
        .iter()
        .filter_map(|path| lookup(body, path))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(ToOwned::to_owned)
}

/// Accepts a response when the status is 2xx and the body does not carry
/// `success: false`.
pub fn check(status: u16, body: &Value) -> Result<(), AppError> {
    let flagged_failure = body.get("success").and_then(Value::as_bool) == Some(false);
    if (200..300).contains(&status) && !flagged_failure {
        return Ok(());
    }
    let message = server_message(body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
    if (200..300).contains(&status) {
        return Err(AppError::BadRequest(message));
    }
    Err(AppError::from_status(status, message))
}

/// Requires an explicit `success: true` on an already accepted body.
pub fn confirm(body: &Value) -> Result<(), AppError> {
    if probe_bool(body, &["success"]) == Some(true) {
        return Ok(());
    }
    let message = server_message(body).unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
    Err(AppError::BadRequest(message))
}
