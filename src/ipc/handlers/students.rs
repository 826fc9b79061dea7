use crate::ipc::error::{err, grading_err, ok};
use crate::ipc::helpers::{db_conn, optional_str, parse_form_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{Form, Student};
use crate::report::StudentSummary;
use crate::store::{GradebookStore, SqliteStore};
use rusqlite::params;
use serde_json::json;

fn student_json(s: &Student) -> serde_json::Value {
    json!(StudentSummary::from(s))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let store = SqliteStore::new(conn);

    let forms: Vec<Form> = match optional_str(req, "form") {
        Some(raw) => match parse_form_str(req, &raw) {
            Ok(f) => vec![f],
            Err(e) => return e,
        },
        None => Form::ALL.to_vec(),
    };

    let mut students = Vec::new();
    for form in forms {
        match store.students_in_form(form) {
            Ok(rows) => students.extend(rows.iter().map(student_json)),
            Err(e) => return grading_err(&req.id, &e),
        }
    }
    ok(&req.id, json!({ "students": students }))
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match SqliteStore::new(conn).find_student(&student_id) {
        Ok(Some(s)) => ok(&req.id, json!({ "student": student_json(&s) })),
        Ok(None) => err(&req.id, "not_found", "student not found", None),
        Err(e) => grading_err(&req.id, &e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let first_name = match required_str(req, "firstName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last_name = match required_str(req, "lastName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let form = match optional_str(req, "form") {
        Some(raw) => match parse_form_str(req, &raw) {
            Ok(f) => f,
            Err(e) => return e,
        },
        None => Form::F1,
    };

    match SqliteStore::new(conn).find_student(&student_id) {
        Ok(None) => {}
        Ok(Some(_)) => {
            return err(
                &req.id,
                "bad_params",
                "studentId already exists",
                Some(json!({ "studentId": student_id })),
            )
        }
        Err(e) => return grading_err(&req.id, &e),
    }

    let now = chrono::Utc::now().to_rfc3339();
    if let Err(e) = conn.execute(
        "INSERT INTO students(student_id, first_name, last_name, form, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![student_id, first_name, last_name, form.code(), now, now],
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    tracing::info!(student = %student_id, form = %form, "student created");

    let student = Student {
        student_id,
        first_name,
        last_name,
        form,
    };
    ok(&req.id, json!({ "student": student_json(&student) }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut student = match SqliteStore::new(conn).find_student(&student_id) {
        Ok(Some(s)) => s,
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return grading_err(&req.id, &e),
    };

    for (k, v) in patch {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(
                &req.id,
                "bad_params",
                format!("{} must be a non-empty string", k),
                None,
            );
        };
        match k.as_str() {
            "firstName" => student.first_name = s.to_string(),
            "lastName" => student.last_name = s.to_string(),
            "form" => match parse_form_str(req, s) {
                Ok(f) => student.form = f,
                Err(e) => return e,
            },
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown student field: {}", k),
                    None,
                )
            }
        }
    }

    if let Err(e) = conn.execute(
        "UPDATE students SET first_name = ?, last_name = ?, form = ?, updated_at = ?
         WHERE student_id = ?",
        params![
            student.first_name,
            student.last_name,
            student.form.code(),
            chrono::Utc::now().to_rfc3339(),
            student.student_id
        ],
    ) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "student": student_json(&student) }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match conn.execute("DELETE FROM students WHERE student_id = ?", [&student_id]) {
        Ok(0) => err(&req.id, "not_found", "student not found", None),
        Ok(_) => {
            tracing::info!(student = %student_id, "student deleted");
            ok(&req.id, json!({ "ok": true }))
        }
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
