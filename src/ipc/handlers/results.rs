use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{require_conn, require_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::{json, Value};

fn results_draft(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(&state.db)?;
    let course_id = require_str(&req.params, "courseId")?;
    let draft = store::latest_draft(conn, course_id)
        .map_err(|e| HandlerErr::new("db_query_failed", format!("{e:#}")))?;
    Ok(json!({ "draft": draft }))
}

fn results_submitted(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_conn(&state.db)?;
    let course_id = require_str(&req.params, "courseId")?;
    let submission = store::latest_submission(conn, course_id)
        .map_err(|e| HandlerErr::new("db_query_failed", format!("{e:#}")))?;
    let count = store::submission_count(conn, course_id)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "submission": submission, "submissionCount": count }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.draft" => Some(respond(req, results_draft(state, req))),
        "results.submitted" => Some(respond(req, results_submitted(state, req))),
        _ => None,
    }
}
