use crate::auth::{authorize, AccessDecision, AccessRequirement, AuthContext, Capabilities, Role};
use crate::engine::{CellField, GradeEntryEngine, RosterStudent};
use crate::grading::{GradeError, MarkLimits};
use crate::ipc::error::HandlerErr;
use crate::ipc::handlers::setup::grading_defaults;
use crate::ipc::helpers::{
    cell_text, opt_f64, opt_index, require_auth, require_conn, require_index, require_str,
    respond,
};
use crate::ipc::types::{AppState, GridSession, Request};
use crate::store::{self, SqliteResultSink};
use serde_json::{json, Value};
use uuid::Uuid;

const GRID_MAX_ROSTER: usize = 5000;
const GRID_MAX_PASTE_BYTES: usize = 1 << 20;
const GRID_MAX_SESSIONS: usize = 64;

fn grade_err(e: GradeError) -> HandlerErr {
    let details = match &e {
        GradeError::AboveMaximum { field, value, max } => {
            Some(json!({ "field": field, "value": value, "max": max }))
        }
        GradeError::BelowMinimum { field, value } => {
            Some(json!({ "field": field, "value": value, "min": 0 }))
        }
        GradeError::RowOutOfRange { row, len } => Some(json!({ "row": row, "rowCount": len })),
        GradeError::DuplicateStudent(id) => Some(json!({ "studentId": id })),
        GradeError::NotANumber { field, raw } => Some(json!({ "field": field, "value": raw })),
        GradeError::Configuration(_) => None,
    };
    let err = HandlerErr::new(e.code(), e.to_string());
    match details {
        Some(d) => err.with_details(d),
        None => err,
    }
}

fn result_entry_requirement() -> AccessRequirement {
    let roles: Vec<Role> = Role::ALL
        .iter()
        .copied()
        .filter(|r| Capabilities::for_role(*r).can_edit_results)
        .collect();
    AccessRequirement::roles(&roles)
}

fn ensure_can_enter_results(auth: &AuthContext) -> Result<(), HandlerErr> {
    match authorize(Some(auth), &result_entry_requirement()) {
        AccessDecision::Granted => Ok(()),
        decision => Err(HandlerErr::new("forbidden", "role cannot enter results")
            .with_details(json!({ "role": auth.role, "decision": decision }))),
    }
}

fn session_id(req: &Request) -> Result<&str, HandlerErr> {
    require_str(&req.params, "sessionId")
}

fn session<'a>(state: &'a AppState, id: &str) -> Result<&'a GridSession, HandlerErr> {
    state.sessions.get(id).ok_or_else(|| {
        HandlerErr::new("not_found", "grid session not found").with_details(json!({ "sessionId": id }))
    })
}

fn session_mut<'a>(state: &'a mut AppState, id: &str) -> Result<&'a mut GridSession, HandlerErr> {
    state.sessions.get_mut(id).ok_or_else(|| {
        HandlerErr::new("not_found", "grid session not found").with_details(json!({ "sessionId": id }))
    })
}

fn grid_view(engine: &GradeEntryEngine) -> Value {
    json!({
        "courseId": engine.course_id(),
        "limits": engine.limits(),
        "maxTotalMarks": engine.limits().max_total(),
        "rows": engine.rows(),
        "summary": engine.summary(),
    })
}

fn grid_open(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let auth = require_auth(&req.params, "auth")?;
    ensure_can_enter_results(&auth)?;
    if state.sessions.len() >= GRID_MAX_SESSIONS {
        return Err(HandlerErr::new("session_limit", "too many open grid sessions")
            .with_details(json!({
                "openSessions": state.sessions.len(),
                "maxSessions": GRID_MAX_SESSIONS
            })));
    }

    let course_id = require_str(&req.params, "courseId")?.to_string();
    let roster_raw = req
        .params
        .get("roster")
        .filter(|v| v.is_array())
        .ok_or_else(|| HandlerErr::bad_params("missing roster[]"))?;
    let roster: Vec<RosterStudent> = serde_json::from_value(roster_raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid roster: {}", e)))?;
    if roster.len() > GRID_MAX_ROSTER {
        return Err(HandlerErr::bad_params("roster is too large").with_details(json!({
            "rowCount": roster.len(),
            "maxRows": GRID_MAX_ROSTER
        })));
    }

    let defaults = grading_defaults(state.db.as_ref())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let max_ca = opt_f64(&req.params, "maxCaMarks")?.unwrap_or(defaults.max_ca_marks());
    let max_exam = opt_f64(&req.params, "maxExamMarks")?.unwrap_or(defaults.max_exam_marks());
    let limits = MarkLimits::new(max_ca, max_exam).map_err(grade_err)?;

    let engine = GradeEntryEngine::initialize(course_id, roster, limits).map_err(grade_err)?;
    let session_id = Uuid::new_v4().to_string();
    let mut view = grid_view(&engine);
    view["sessionId"] = json!(session_id);

    tracing::info!(
        session_id = %session_id,
        course_id = engine.course_id(),
        user_id = %auth.user_id,
        role = auth.role.key(),
        rows = engine.rows().len(),
        "grid session opened"
    );
    state
        .sessions
        .insert(session_id, GridSession { engine, auth });
    Ok(view)
}

fn grid_get(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let s = session(state, session_id(req)?)?;
    Ok(grid_view(&s.engine))
}

fn grid_update_cell(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = session_id(req)?;
    let row = require_index(&req.params, "row")?;
    let field_raw = require_str(&req.params, "field")?;
    let field = CellField::parse(field_raw).ok_or_else(|| {
        HandlerErr::bad_params("field must be one of: ca_marks, exam_marks, comment")
            .with_details(json!({ "field": field_raw }))
    })?;
    let value = cell_text(req.params.get("value"))?;

    let s = session_mut(state, id)?;
    let updated = match s.engine.set_cell(row, field, &value) {
        Ok(r) => {
            tracing::debug!(
                session_id = id,
                student_id = r.student_id(),
                total = r.total_marks(),
                grade = %r.grade(),
                "cell updated"
            );
            json!(r)
        }
        Err(e) => {
            tracing::debug!(session_id = id, row, field = field_raw, value = %value, error = %e, "cell edit rejected");
            return Err(grade_err(e));
        }
    };
    Ok(json!({
        "row": row,
        "updated": updated,
        "summary": s.engine.summary(),
    }))
}

fn grid_paste(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = session_id(req)?;
    let text = require_str(&req.params, "text")?;
    if text.len() > GRID_MAX_PASTE_BYTES {
        return Err(HandlerErr::bad_params("pasted text is too large").with_details(json!({
            "bytes": text.len(),
            "maxBytes": GRID_MAX_PASTE_BYTES
        })));
    }
    let start_row = opt_index(&req.params, "startRow")?;

    let s = session_mut(state, id)?;
    let result = match start_row {
        Some(start) => s.engine.apply_pasted_block_at(start, text),
        None => s.engine.apply_pasted_block(text),
    };
    tracing::info!(
        session_id = id,
        applied = result.applied_rows,
        rejected = result.rejected_rows.len(),
        ignored = result.ignored_lines,
        "paste applied"
    );

    let message = format!(
        "Applied {} row(s), rejected {}",
        result.applied_rows,
        result.rejected_rows.len()
    );
    let mut view = grid_view(&s.engine);
    view["paste"] = json!(result);
    view["message"] = json!(message);
    Ok(view)
}

fn grid_reset(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = session_id(req)?;
    let s = session_mut(state, id)?;
    s.engine.reset();
    tracing::info!(session_id = id, "grid reset");
    Ok(grid_view(&s.engine))
}

fn grid_summary(state: &AppState, req: &Request) -> Result<Value, HandlerErr> {
    let s = session(state, session_id(req)?)?;
    Ok(json!({ "summary": s.engine.summary() }))
}

fn grid_save_draft(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = session_id(req)?;
    let conn = require_conn(&state.db)?;
    let s = session(state, id)?;

    let mut sink = SqliteResultSink::new(conn, Some(s.auth.user_id.as_str()));
    let saved = s
        .engine
        .save_draft(&mut sink)
        .map_err(|e| HandlerErr::new("db_insert_failed", format!("{e:#}")))?;
    tracing::info!(session_id = id, course_id = s.engine.course_id(), rows = saved, "draft saved");
    Ok(json!({ "courseId": s.engine.course_id(), "saved": saved }))
}

fn grid_submit(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = session_id(req)?;
    let conn = require_conn(&state.db)?;
    let s = session(state, id)?;
    ensure_can_enter_results(&s.auth)?;

    let mut sink = SqliteResultSink::new(conn, Some(s.auth.user_id.as_str()));
    let submitted = s
        .engine
        .submit(&mut sink)
        .map_err(|e| HandlerErr::new("db_insert_failed", format!("{e:#}")))?;
    let submission_count = store::submission_count(conn, s.engine.course_id())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    tracing::info!(
        session_id = id,
        course_id = s.engine.course_id(),
        rows = submitted,
        submission_count,
        "results submitted"
    );
    Ok(json!({
        "courseId": s.engine.course_id(),
        "submitted": submitted,
        "submissionCount": submission_count,
    }))
}

fn grid_close(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = session_id(req)?;
    let closed = state.sessions.remove(id).is_some();
    if closed {
        tracing::info!(session_id = id, "grid session closed");
    }
    Ok(json!({ "closed": closed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grid.open" => grid_open(state, req),
        "grid.get" => grid_get(state, req),
        "grid.updateCell" => grid_update_cell(state, req),
        "grid.paste" => grid_paste(state, req),
        "grid.reset" => grid_reset(state, req),
        "grid.summary" => grid_summary(state, req),
        "grid.saveDraft" => grid_save_draft(state, req),
        "grid.submit" => grid_submit(state, req),
        "grid.close" => grid_close(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
