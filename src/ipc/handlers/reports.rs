use crate::bundle;
use crate::error::GradingError;
use crate::ipc::error::{err, grading_err, ok};
use crate::ipc::handlers::setup::{load_section, SetupSection};
use crate::ipc::handlers::staff::find_staff;
use crate::ipc::helpers::{db_conn, optional_str, required_form, required_str, term_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{Form, Level, StaffProfile, Stream, Term};
use crate::report::{self, EntryStatus};
use crate::store::{self, GradebookStore, SqliteStore};
use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Resolves the optional `staffId` to a profile allowed to print reports.
/// `Ok(None)` when no `staffId` was given.
fn reporting_staff(
    conn: &Connection,
    req: &Request,
) -> Result<Option<StaffProfile>, serde_json::Value> {
    let Some(staff_id) = optional_str(req, "staffId") else {
        return Ok(None);
    };
    let profile = match find_staff(conn, &staff_id) {
        Ok(Some(p)) => p,
        Ok(None) => {
            return Err(err(
                &req.id,
                "forbidden",
                "no staff profile for staffId",
                Some(json!({ "staffId": staff_id })),
            ))
        }
        Err(e) => return Err(grading_err(&req.id, &e.into())),
    };
    if !profile.can_print_reports() {
        return Err(err(
            &req.id,
            "forbidden",
            format!("role {} cannot print reports", profile.role.code()),
            None,
        ));
    }
    Ok(Some(profile))
}

/// Checks the optional `staffId` against the form being reported on.
/// Without a `staffId` no check is made.
fn authorize(conn: &Connection, req: &Request, form: Form) -> Result<(), serde_json::Value> {
    let Some(profile) = reporting_staff(conn, req)? else {
        return Ok(());
    };
    if !profile.may_report_on(form) {
        tracing::warn!(staff = %profile.username, form = %form, "report request outside responsibility");
        return Err(err(
            &req.id,
            "forbidden",
            format!("not responsible for {}", form.display_name()),
            Some(json!({ "form": form })),
        ));
    }
    Ok(())
}

/// School profile and report settings, defaults applied.
fn report_settings(
    conn: &Connection,
    req: &Request,
) -> Result<(serde_json::Value, serde_json::Value), serde_json::Value> {
    let school = load_section(conn, SetupSection::School)
        .map_err(|e| grading_err(&req.id, &GradingError::Store(format!("{e:#}"))))?;
    let reports = load_section(conn, SetupSection::Reports)
        .map_err(|e| grading_err(&req.id, &GradingError::Store(format!("{e:#}"))))?;
    Ok((school, reports))
}

fn generated_at(settings: &serde_json::Value) -> Option<String> {
    settings
        .get("showGeneratedAt")
        .and_then(|v| v.as_bool())
        .unwrap_or(true)
        .then(|| chrono::Utc::now().to_rfc3339())
}

fn handle_student_report(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let sqlite = SqliteStore::new(conn);
    let student = match sqlite.find_student(&student_id) {
        Ok(Some(s)) => s,
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return grading_err(&req.id, &e),
    };
    if let Err(e) = authorize(conn, req, student.form) {
        return e;
    }
    let (school, settings) = match report_settings(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let snapshot = match store::load_cohort(&sqlite, student.form, term) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };
    let mut report = match report::build_student_report(&snapshot, &student_id) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };
    let include_absent = settings
        .get("includeAbsentSubjects")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    if !include_absent {
        report.subjects.retain(|s| s.status != EntryStatus::Absent);
    }

    ok(
        &req.id,
        json!({
            "school": school,
            "generatedAt": generated_at(&settings),
            "report": report,
        }),
    )
}

fn handle_class_ranking(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let form = match required_form(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = authorize(conn, req, form) {
        return e;
    }
    let (school, settings) = match report_settings(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let snapshot = match store::load_cohort(&SqliteStore::new(conn), form, term) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };
    let report = report::build_class_report(&snapshot);
    if !report.failures.is_empty() {
        tracing::warn!(form = %form, term = %term, failed = report.failures.len(), "class ranking has failed rows");
    }
    ok(
        &req.id,
        json!({
            "school": school,
            "generatedAt": generated_at(&settings),
            "report": report,
        }),
    )
}

fn handle_bulk_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let form = match required_form(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match term_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    if let Err(e) = authorize(conn, req, form) {
        return e;
    }
    let (school, _) = match report_settings(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let snapshot = match store::load_cohort(&SqliteStore::new(conn), form, term) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e),
    };
    let bulk = report::build_bulk_reports(&snapshot);
    let summary = match bundle::export_report_bundle(&bulk, &school, &out_path, chrono::Utc::now()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "export_failed", format!("{e:?}"), None),
    };
    tracing::info!(
        form = %form,
        term = %term,
        successful = bulk.summary.successful,
        failed = bulk.summary.failed,
        "report bundle exported"
    );

    let failures: Vec<_> = bulk
        .entries
        .iter()
        .filter_map(|e| match &e.outcome {
            report::BulkOutcome::Failed { message } => Some(json!({
                "studentId": e.student_id,
                "lastName": e.last_name,
                "message": message,
            })),
            report::BulkOutcome::Generated { .. } => None,
        })
        .collect();
    ok(
        &req.id,
        json!({
            "outPath": out_path.to_string_lossy(),
            "bundleFormat": summary.bundle_format,
            "entryCount": summary.entry_count,
            "reportCount": summary.report_count,
            "summary": bulk.summary,
            "failures": failures,
        }),
    )
}

const RECENT_GRADES: usize = 10;

fn form_json(form: Form) -> serde_json::Value {
    let stream = match form.stream() {
        Stream::None => "",
        s => s.display_name(),
    };
    json!({
        "code": form,
        "name": form.display_name(),
        "stream": stream,
        "isSenior": form.level() == Level::Senior,
    })
}

fn dashboard_stats(conn: &Connection) -> rusqlite::Result<(i64, i64, Vec<serde_json::Value>)> {
    let total_students: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))?;
    let total_grades: i64 = conn.query_row("SELECT COUNT(*) FROM grades", [], |r| r.get(0))?;
    let mut stmt = conn.prepare(
        "SELECT g.id, st.student_id, st.first_name, st.last_name, st.form,
                s.name, g.term, g.score, g.created_at
         FROM grades g
         JOIN students st ON st.student_id = g.student_id
         JOIN subjects s ON s.id = g.subject_id
         ORDER BY g.created_at DESC, g.rowid DESC
         LIMIT ?",
    )?;
    let recent = stmt
        .query_map([RECENT_GRADES as i64], |r| {
            let first: String = r.get(2)?;
            let last: String = r.get(3)?;
            let term: String = r.get(6)?;
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "studentId": r.get::<_, String>(1)?,
                "studentName": format!("{} {}", first, last),
                "form": r.get::<_, String>(4)?,
                "subjectName": r.get::<_, String>(5)?,
                "term": term,
                "termDisplay": Term::parse(&term).map(Term::display_name),
                "score": r.get::<_, f64>(7)?,
                "createdAt": r.get::<_, String>(8)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok((total_students, total_grades, recent))
}

/// Forms the caller may report on, grouped by base form, with workspace totals
/// and the most recent grades. Without a `staffId` every form is listed.
fn handle_dashboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let forms = match reporting_staff(conn, req) {
        Ok(Some(profile)) => profile.available_forms(),
        Ok(None) => Form::ALL.to_vec(),
        Err(e) => return e,
    };

    let mut grouped: BTreeMap<&'static str, Vec<serde_json::Value>> = BTreeMap::new();
    for form in &forms {
        grouped
            .entry(form.base_form().code())
            .or_default()
            .push(form_json(*form));
    }
    let grouped: Vec<_> = grouped
        .into_iter()
        .map(|(base, forms)| json!({ "baseForm": base, "forms": forms }))
        .collect();

    let (total_students, total_grades, recent_grades) = match dashboard_stats(conn) {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e.into()),
    };
    let terms: Vec<_> = [Term::T1, Term::T2, Term::T3]
        .iter()
        .map(|t| json!({ "code": t, "name": t.display_name() }))
        .collect();

    ok(
        &req.id,
        json!({
            "availableForms": forms.iter().map(|f| form_json(*f)).collect::<Vec<_>>(),
            "groupedForms": grouped,
            "totalStudents": total_students,
            "totalGrades": total_grades,
            "recentGrades": recent_grades,
            "terms": terms,
        }),
    )
}

fn handle_verify_bundle(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    match bundle::verify_report_bundle(&in_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "verifiedEntries": summary.verified_entries,
            }),
        ),
        Err(e) => err(&req.id, "bundle_invalid", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentReport" => Some(handle_student_report(state, req)),
        "reports.classRanking" => Some(handle_class_ranking(state, req)),
        "reports.bulkExport" => Some(handle_bulk_export(state, req)),
        "reports.verifyBundle" => Some(handle_verify_bundle(state, req)),
        "reports.dashboard" => Some(handle_dashboard(state, req)),
        _ => None,
    }
}
