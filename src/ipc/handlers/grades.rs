use crate::aggregate;
use crate::error::GradingError;
use crate::grading::{self, Classification};
use crate::ipc::error::{err, grading_err, ok};
use crate::ipc::helpers::{db_conn, optional_str, parse_form_str, required_str, term_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{GradeRecord, Level};
use crate::store::{GradebookStore, SqliteStore};
use rusqlite::OptionalExtension;
use serde_json::json;

fn grade_json(r: &GradeRecord, c: &Classification) -> serde_json::Value {
    json!({
        "id": r.id,
        "studentId": r.student_id,
        "subjectId": r.subject_id,
        "subjectName": r.subject_name,
        "term": r.term,
        "score": r.score,
        "mark": c.mark,
        "comment": c.comment,
        "passed": c.passed,
        "label": c.label(),
        "createdAt": r.created_at,
    })
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let store = SqliteStore::new(conn);
    let student = match store.find_student(&student_id) {
        Ok(Some(s)) => s,
        Ok(None) => return grading_err(&req.id, &GradingError::NotFound("student".into())),
        Err(e) => return grading_err(&req.id, &e),
    };
    let records = match store.grades_for_student_term(&student_id, term) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };
    let classified = match aggregate::classify_grades(&records, student.level()) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };
    let grades: Vec<_> = classified
        .iter()
        .zip(records.iter())
        .map(|(g, r)| grade_json(r, &g.classification))
        .collect();
    ok(
        &req.id,
        json!({
            "studentId": student.student_id,
            "term": term,
            "level": student.level(),
            "grades": grades,
        }),
    )
}

fn handle_grades_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw_score) = req.params.get("score") else {
        return err(&req.id, "bad_params", "missing score", None);
    };
    let score = match grading::parse_score(raw_score) {
        Ok(v) => grading::round_score(v),
        Err(e) => return grading_err(&req.id, &e),
    };

    let student = match SqliteStore::new(conn).find_student(&student_id) {
        Ok(Some(s)) => s,
        Ok(None) => return grading_err(&req.id, &GradingError::NotFound("student".into())),
        Err(e) => return grading_err(&req.id, &e),
    };
    let subject_name: Option<String> = match conn
        .query_row("SELECT name FROM subjects WHERE id = ?", [&subject_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e.into()),
    };
    let Some(subject_name) = subject_name else {
        return grading_err(&req.id, &GradingError::NotFound("subject".into()));
    };

    let classification = match grading::classify(score, student.level()) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };

    let record = GradeRecord {
        id: uuid::Uuid::new_v4().to_string(),
        student_id,
        subject_id,
        subject_name,
        term,
        score,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    if let Err(e) = conn.execute(
        "INSERT INTO grades(id, student_id, subject_id, term, score, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &record.id,
            &record.student_id,
            &record.subject_id,
            record.term.code(),
            record.score,
            &record.created_at,
        ),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    tracing::debug!(
        student = %record.student_id,
        subject = %record.subject_name,
        term = %record.term,
        score = record.score,
        "grade recorded"
    );
    ok(&req.id, json!({ "grade": grade_json(&record, &classification) }))
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade_id = match required_str(req, "gradeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM grades WHERE id = ?", [&grade_id]) {
        Ok(0) => err(&req.id, "not_found", "grade not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

/// Pure classification; needs no workspace.
fn handle_grades_classify(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw_score) = req.params.get("score") else {
        return err(&req.id, "bad_params", "missing score", None);
    };
    let level = match (optional_str(req, "level"), optional_str(req, "form")) {
        (Some(raw), _) => match Level::parse(&raw) {
            Some(l) => l,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "level must be one of: junior, senior",
                    Some(json!({ "level": raw })),
                )
            }
        },
        (None, Some(raw)) => match parse_form_str(req, &raw) {
            Ok(f) => f.level(),
            Err(e) => return e,
        },
        (None, None) => return err(&req.id, "bad_params", "missing level or form", None),
    };
    let score = match grading::parse_score(raw_score) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };
    let c = match grading::classify(score, level) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };
    ok(
        &req.id,
        json!({
            "score": score,
            "level": level,
            "mark": c.mark,
            "comment": c.comment,
            "passed": c.passed,
            "label": c.label(),
            "point": c.point(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.create" => Some(handle_grades_create(state, req)),
        "grades.delete" => Some(handle_grades_delete(state, req)),
        "grades.classify" => Some(handle_grades_classify(state, req)),
        _ => None,
    }
}
