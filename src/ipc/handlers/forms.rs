use crate::forms::{grade_entry_form, parse_grade_entry};
use crate::grading::MarkLimits;
use crate::ipc::error::HandlerErr;
use crate::ipc::handlers::setup::grading_defaults;
use crate::ipc::helpers::{opt_f64, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

fn grade_entry_validate(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let defaults = grading_defaults(state.db.as_ref())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let limits = MarkLimits::new(
        opt_f64(&req.params, "maxCaMarks")?.unwrap_or(defaults.max_ca_marks()),
        opt_f64(&req.params, "maxExamMarks")?.unwrap_or(defaults.max_exam_marks()),
    )
    .map_err(|e| HandlerErr::new(e.code(), e.to_string()))?;

    let empty = Map::new();
    let values = match req.params.get("values") {
        None | Some(Value::Null) => &empty,
        Some(v) => v
            .as_object()
            .ok_or_else(|| HandlerErr::bad_params("values must be an object"))?,
    };

    let fields = grade_entry_form(&limits);
    Ok(match parse_grade_entry(&limits, values) {
        Ok(entry) => json!({ "valid": true, "entry": entry, "errors": {}, "fields": fields }),
        Err(errors) => json!({ "valid": false, "errors": errors, "fields": fields }),
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "forms.gradeEntry.validate" => Some(respond(req, grade_entry_validate(state, req))),
        _ => None,
    }
}
