use crate::auth::AuthContext;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::Request;
use rusqlite::Connection;
use serde_json::Value;

pub fn respond(req: &Request, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn require_conn(db: &Option<Connection>) -> Result<&Connection, HandlerErr> {
    db.as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn require_index(params: &Value, key: &str) -> Result<usize, HandlerErr> {
    match params.get(key).and_then(|v| v.as_i64()) {
        Some(v) if v >= 0 => Ok(v as usize),
        _ => Err(HandlerErr::bad_params(format!("missing/invalid {}", key))),
    }
}

pub fn opt_index(params: &Value, key: &str) -> Result<Option<usize>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => require_index(params, key).map(Some),
    }
}

pub fn opt_f64(params: &Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

// null reads as blank.
pub fn cell_text(v: Option<&Value>) -> Result<String, HandlerErr> {
    match v {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(HandlerErr::bad_params("value must be a string or number")
            .with_details(serde_json::json!({ "value": other }))),
    }
}

pub fn opt_auth(params: &Value, key: &str) -> Result<Option<AuthContext>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| HandlerErr::bad_params(format!("invalid {}: {}", key, e))),
    }
}

pub fn require_auth(params: &Value, key: &str) -> Result<AuthContext, HandlerErr> {
    opt_auth(params, key)?.ok_or_else(|| HandlerErr::new("unauthenticated", "login required"))
}
