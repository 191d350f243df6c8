use crate::db;
use crate::grading::{MarkLimits, DEFAULT_MAX_CA_MARKS, DEFAULT_MAX_EXAM_MARKS};
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{require_conn, require_str, respond};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Grading,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "grading" => Some(Self::Grading),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Grading => "setup.grading",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Grading => json!({
            "defaultMaxCaMarks": DEFAULT_MAX_CA_MARKS,
            "defaultMaxExamMarks": DEFAULT_MAX_EXAM_MARKS
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_mark_max(v: &Value, key: &str) -> Result<f64, String> {
    let n = v
        .as_f64()
        .ok_or_else(|| format!("{} must be a number", key))?;
    if !n.is_finite() || n < 0.0 {
        return Err(format!("{} must be >= 0", key));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Grading => match k.as_str() {
                "defaultMaxCaMarks" | "defaultMaxExamMarks" => {
                    obj.insert(k.clone(), json!(parse_mark_max(v, k)?));
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            },
        }
    }
    match section {
        SetupSection::Grading => {
            limits_from_section(current).map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

fn limits_from_section(section: &Value) -> Result<MarkLimits, crate::grading::GradeError> {
    let get = |k: &str, default: f64| section.get(k).and_then(|v| v.as_f64()).unwrap_or(default);
    MarkLimits::new(
        get("defaultMaxCaMarks", DEFAULT_MAX_CA_MARKS),
        get("defaultMaxExamMarks", DEFAULT_MAX_EXAM_MARKS),
    )
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults.
            let mut merged = current.clone();
            if merge_section_patch(section, &mut merged, saved_obj).is_ok() {
                current = merged;
            } else {
                tracing::warn!(key = section.key(), "ignoring invalid saved setup section");
            }
        }
    }
    Ok(current)
}

pub fn grading_defaults(conn: Option<&Connection>) -> anyhow::Result<MarkLimits> {
    let Some(conn) = conn else {
        return Ok(MarkLimits::default());
    };
    let section = load_section(conn, SetupSection::Grading)?;
    Ok(limits_from_section(&section).unwrap_or_default())
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = require_conn(&state.db).and_then(|conn| {
        let grading = load_section(conn, SetupSection::Grading)
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
        Ok(json!({ "grading": grading }))
    });
    respond(req, result)
}

fn setup_update(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(&state.db)?;
    let section_raw = require_str(&req.params, "section")?;
    let section = SetupSection::parse(section_raw)
        .ok_or_else(|| HandlerErr::bad_params("unknown section"))?;
    let patch_obj = req
        .params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("patch must be an object"))?;

    let mut current = load_section(conn, section)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    merge_section_patch(section, &mut current, patch_obj).map_err(HandlerErr::bad_params)?;
    db::settings_set_json(conn, section.key(), &current)
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    tracing::info!(key = section.key(), "setup section updated");
    Ok(json!({ "ok": true, "section": current }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(req, setup_update(state, req))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_rejects_zero_total_and_unknown_fields() {
        let mut current = default_section(SetupSection::Grading);
        let patch = json!({ "defaultMaxCaMarks": 0, "defaultMaxExamMarks": 0 });
        assert!(merge_section_patch(
            SetupSection::Grading,
            &mut current,
            patch.as_object().expect("object")
        )
        .is_err());

        let mut current = default_section(SetupSection::Grading);
        let patch = json!({ "gradeScale": "custom" });
        assert!(merge_section_patch(
            SetupSection::Grading,
            &mut current,
            patch.as_object().expect("object")
        )
        .is_err());
    }

    #[test]
    fn defaults_without_workspace() {
        let limits = grading_defaults(None).expect("defaults");
        assert_eq!(limits, MarkLimits::default());
    }

    #[test]
    fn stored_defaults_are_merged() {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        db::settings_set_json(&conn, "setup.grading", &json!({ "defaultMaxCaMarks": 40 }))
            .expect("set");
        let limits = grading_defaults(Some(&conn)).expect("load");
        assert_eq!(limits.max_ca_marks(), 40.0);
        assert_eq!(limits.max_exam_marks(), 70.0);
    }
}
