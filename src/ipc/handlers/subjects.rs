use crate::ipc::error::{err, grading_err, ok};
use crate::ipc::helpers::{db_conn, optional_str, parse_form_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{FormLevel, Subject, SubjectStream};
use crate::store::{GradebookStore, SqliteStore};
use serde_json::json;

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let form = match optional_str(req, "form") {
        Some(raw) => match parse_form_str(req, &raw) {
            Ok(f) => Some(f),
            Err(e) => return e,
        },
        None => None,
    };
    let mut subjects = match SqliteStore::new(conn).all_subjects() {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };
    if let Some(form) = form {
        subjects.retain(|s| s.offered_to(form));
    }
    ok(&req.id, json!({ "subjects": subjects }))
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let stream = match optional_str(req, "stream") {
        None => SubjectStream::All,
        Some(raw) => match SubjectStream::parse(&raw) {
            Some(s) => s,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "stream must be one of: ALL, SCIENCE, HUMANITIES, JUNIOR, SENIOR",
                    Some(json!({ "stream": raw })),
                )
            }
        },
    };
    let form_level = match optional_str(req, "formLevel") {
        None => FormLevel::All,
        Some(raw) => match FormLevel::parse(&raw) {
            Some(f) => f,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "formLevel must be one of: ALL, F1, F2, F3, F4",
                    Some(json!({ "formLevel": raw })),
                )
            }
        },
    };

    let subject = Subject {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        stream,
        form_level,
    };
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, name, stream, form_level) VALUES(?, ?, ?, ?)",
        (
            &subject.id,
            &subject.name,
            subject.stream.code(),
            subject.form_level.code(),
        ),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    tracing::info!(subject = %subject.name, "subject created");
    ok(&req.id, json!({ "subject": subject }))
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // Grades for the subject go with it (ON DELETE CASCADE).
    match conn.execute("DELETE FROM subjects WHERE id = ?", [&subject_id]) {
        Ok(0) => err(&req.id, "not_found", "subject not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}
