mod test_support;

use serde_json::json;
use test_support::{lecturer, request_err, request_ok, roster, spawn_sidecar, temp_dir};

#[test]
fn workspace_grading_defaults_apply_to_new_grids() {
    let workspace = temp_dir("gradeentry-setup-grading");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let before = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(before["grading"]["defaultMaxCaMarks"].as_f64(), Some(30.0));
    assert_eq!(before["grading"]["defaultMaxExamMarks"].as_f64(), Some(70.0));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "grading", "patch": { "defaultMaxCaMarks": 40, "defaultMaxExamMarks": 60 } }),
    );
    assert_eq!(updated["section"]["defaultMaxCaMarks"].as_f64(), Some(40.0));

    let bad = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "grading", "patch": { "defaultMaxCaMarks": -1 } }),
    );
    assert_eq!(bad["code"], json!("bad_params"));
    let zero = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "grading", "patch": { "defaultMaxCaMarks": 0, "defaultMaxExamMarks": 0 } }),
    );
    assert_eq!(zero["code"], json!("bad_params"));
    let unknown = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "grading", "patch": { "passMark": 45 } }),
    );
    assert_eq!(unknown["code"], json!("bad_params"));

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "grid.open",
        json!({ "courseId": "CSC101", "auth": lecturer(), "roster": roster() }),
    );
    assert_eq!(opened["limits"]["maxCaMarks"].as_f64(), Some(40.0));
    assert_eq!(opened["limits"]["maxExamMarks"].as_f64(), Some(60.0));

    let accepted = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "grid.updateCell",
        json!({ "sessionId": opened["sessionId"], "row": 0, "field": "ca_marks", "value": "35" }),
    );
    assert_eq!(accepted["updated"]["caMarks"].as_f64(), Some(35.0));
    let rejected = request_err(
        &mut stdin,
        &mut reader,
        "9",
        "grid.updateCell",
        json!({ "sessionId": opened["sessionId"], "row": 0, "field": "exam_marks", "value": "65" }),
    );
    assert_eq!(rejected["message"], json!("Exam marks cannot exceed 60"));
}

#[test]
fn grade_entry_form_reports_field_errors() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "forms.gradeEntry.validate",
        json!({ "values": {} }),
    );
    assert_eq!(empty["valid"], json!(false));
    assert_eq!(empty["errors"]["ca_score"], json!("CA Score is required"));
    assert_eq!(empty["errors"]["exam_score"], json!("Exam Score is required"));
    assert!(empty["errors"].get("comments").is_none());
    assert_eq!(empty["fields"].as_array().map(|f| f.len()), Some(3));

    let over = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "forms.gradeEntry.validate",
        json!({ "values": { "ca_score": "20", "exam_score": 75 } }),
    );
    assert_eq!(
        over["errors"]["exam_score"],
        json!("Exam Score must be between 0 and 70")
    );

    let ok = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "forms.gradeEntry.validate",
        json!({ "values": { "ca_score": "20", "exam_score": 55, "comments": "good" } }),
    );
    assert_eq!(ok["valid"], json!(true));
    assert_eq!(ok["entry"]["totalScore"].as_f64(), Some(75.0));

    let scaled = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "forms.gradeEntry.validate",
        json!({ "maxCaMarks": 10, "maxExamMarks": 90, "values": { "ca_score": 20, "exam_score": 10 } }),
    );
    assert_eq!(
        scaled["errors"]["ca_score"],
        json!("CA Score must be between 0 and 10")
    );
}
