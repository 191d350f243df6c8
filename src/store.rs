use crate::engine::{ResultSink, ScoreSubmission};
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

pub struct SqliteResultSink<'a> {
    conn: &'a Connection,
    actor: Option<&'a str>,
}

impl<'a> SqliteResultSink<'a> {
    pub fn new(conn: &'a Connection, actor: Option<&'a str>) -> Self {
        Self { conn, actor }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ResultSink for SqliteResultSink<'_> {
    fn save_draft(&mut self, course_id: &str, rows: &[ScoreSubmission]) -> anyhow::Result<()> {
        let rows_json = serde_json::to_string(rows).context("failed to serialize draft rows")?;
        self.conn
            .execute(
                "INSERT INTO result_drafts(course_id, rows_json, row_count, saved_by, saved_at)
                 VALUES(?, ?, ?, ?, ?)
                 ON CONFLICT(course_id) DO UPDATE SET
                   rows_json = excluded.rows_json,
                   row_count = excluded.row_count,
                   saved_by = excluded.saved_by,
                   saved_at = excluded.saved_at",
                (
                    course_id,
                    &rows_json,
                    rows.len() as i64,
                    self.actor,
                    now_rfc3339(),
                ),
            )
            .with_context(|| format!("failed to save draft for course {}", course_id))?;
        Ok(())
    }

    fn submit(&mut self, course_id: &str, rows: &[ScoreSubmission]) -> anyhow::Result<()> {
        let rows_json =
            serde_json::to_string(rows).context("failed to serialize submission rows")?;
        self.conn
            .execute(
                "INSERT INTO result_submissions(id, course_id, rows_json, row_count, submitted_by, submitted_at)
                 VALUES(?, ?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    course_id,
                    &rows_json,
                    rows.len() as i64,
                    self.actor,
                    now_rfc3339(),
                ),
            )
            .with_context(|| format!("failed to submit results for course {}", course_id))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    pub course_id: String,
    pub rows: Vec<ScoreSubmission>,
    pub actor: Option<String>,
    pub stored_at: String,
}

pub fn latest_draft(conn: &Connection, course_id: &str) -> anyhow::Result<Option<StoredResults>> {
    let found: Option<(String, Option<String>, String)> = conn
        .query_row(
            "SELECT rows_json, saved_by, saved_at FROM result_drafts WHERE course_id = ?",
            [course_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((rows_json, actor, stored_at)) = found else {
        return Ok(None);
    };
    Ok(Some(StoredResults {
        submission_id: None,
        course_id: course_id.to_string(),
        rows: serde_json::from_str(&rows_json).context("corrupt draft rows")?,
        actor,
        stored_at,
    }))
}

pub fn latest_submission(
    conn: &Connection,
    course_id: &str,
) -> anyhow::Result<Option<StoredResults>> {
    let found: Option<(String, String, Option<String>, String)> = conn
        .query_row(
            "SELECT id, rows_json, submitted_by, submitted_at FROM result_submissions
             WHERE course_id = ? ORDER BY rowid DESC LIMIT 1",
            [course_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    let Some((id, rows_json, actor, stored_at)) = found else {
        return Ok(None);
    };
    Ok(Some(StoredResults {
        submission_id: Some(id),
        course_id: course_id.to_string(),
        rows: serde_json::from_str(&rows_json).context("corrupt submission rows")?,
        actor,
        stored_at,
    }))
}

pub fn submission_count(conn: &Connection, course_id: &str) -> anyhow::Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM result_submissions WHERE course_id = ?",
        [course_id],
        |r| r.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(ca: f64) -> Vec<ScoreSubmission> {
        vec![ScoreSubmission {
            student_id: "s1".to_string(),
            ca_marks: ca,
            exam_marks: 40.0,
            comment: String::new(),
        }]
    }

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        crate::db::init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn draft_is_overwritten_per_course() {
        let conn = memory_db();
        let mut sink = SqliteResultSink::new(&conn, Some("lect-1"));
        sink.save_draft("CSC101", &rows(10.0)).expect("first");
        sink.save_draft("CSC101", &rows(12.0)).expect("second");

        let d = latest_draft(&conn, "CSC101").expect("query").expect("draft");
        assert_eq!(d.rows, rows(12.0));
        assert_eq!(d.actor.as_deref(), Some("lect-1"));
        assert_eq!(latest_draft(&conn, "MTH101").expect("query"), None);
    }

    #[test]
    fn submissions_append() {
        let conn = memory_db();
        let mut sink = SqliteResultSink::new(&conn, None);
        sink.submit("CSC101", &rows(10.0)).expect("first");
        sink.submit("CSC101", &rows(20.0)).expect("second");

        assert_eq!(submission_count(&conn, "CSC101").expect("count"), 2);
        let s = latest_submission(&conn, "CSC101").expect("query").expect("row");
        assert_eq!(s.rows, rows(20.0));
        assert!(s.submission_id.is_some());
    }
}
