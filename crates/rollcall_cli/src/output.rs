//! JSON envelopes printed on stdout.

use rollcall_core::db::DbError;
use rollcall_core::{AttendanceServiceError, ImportError, RepoError, RosterServiceError};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Command failure carrying a stable status code.
#[derive(Debug)]
pub struct CliError {
    pub code: &'static str,
    pub message: String,
}

impl CliError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::new("storage_error", value.to_string())
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<ImportError> for CliError {
    fn from(value: ImportError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<RosterServiceError> for CliError {
    fn from(value: RosterServiceError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<AttendanceServiceError> for CliError {
    fn from(value: AttendanceServiceError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

/// Builds `{"status":"success", <key>: <payload>}`.
pub fn success<T: Serialize>(key: &str, payload: &T) -> Result<Value, CliError> {
    let payload = serde_json::to_value(payload)
        .map_err(|err| CliError::new("storage_error", format!("failed to encode output: {err}")))?;
    let mut body = Map::new();
    body.insert("status".to_string(), Value::from("success"));
    body.insert(key.to_string(), payload);
    Ok(Value::Object(body))
}

pub fn error_envelope(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message,
    })
}

pub fn print_success(envelope: &Value) {
    println!("{envelope}");
}

pub fn print_error(code: &str, message: &str) {
    println!("{}", error_envelope(code, message));
}
