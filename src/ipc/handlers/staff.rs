use crate::ipc::error::{err, grading_err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{Form, StaffProfile, StaffRole};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn staff_from_row(
    id: String,
    username: String,
    role: String,
    forms_responsible: Option<String>,
) -> rusqlite::Result<StaffProfile> {
    let role = StaffRole::parse(&role).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, format!("role {}", role), rusqlite::types::Type::Text)
    })?;
    Ok(StaffProfile {
        id,
        username,
        role,
        forms_responsible,
    })
}

pub fn find_staff(conn: &Connection, staff_id: &str) -> rusqlite::Result<Option<StaffProfile>> {
    let row: Option<(String, String, String, Option<String>)> = conn
        .query_row(
            "SELECT id, username, role, forms_responsible FROM staff_profiles WHERE id = ?",
            [staff_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    row.map(|(id, username, role, forms)| staff_from_row(id, username, role, forms))
        .transpose()
}

/// Accepts `ALL` or a comma list of form codes; stored canonicalised.
fn normalize_forms(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("ALL") {
        return Ok("ALL".to_string());
    }
    let mut forms = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let form = Form::parse(part).ok_or_else(|| format!("unknown form in formsResponsible: {}", part))?;
        if !forms.contains(&form) {
            forms.push(form);
        }
    }
    Ok(forms.iter().map(|f| f.code()).collect::<Vec<_>>().join(","))
}

fn handle_staff_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = match optional_str(req, "role") {
        None => StaffRole::Student,
        Some(raw) => match StaffRole::parse(&raw) {
            Some(r) => r,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "role must be one of: student, teacher, admin, parent",
                    Some(json!({ "role": raw })),
                )
            }
        },
    };
    let forms_responsible = match optional_str(req, "formsResponsible") {
        None => None,
        Some(raw) => match normalize_forms(&raw) {
            Ok(v) if v.is_empty() => None,
            Ok(v) => Some(v),
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        },
    };

    let exists: Option<String> = match conn
        .query_row(
            "SELECT id FROM staff_profiles WHERE username = ?",
            [&username],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return grading_err(&req.id, &e.into()),
    };
    if exists.is_some() {
        return err(
            &req.id,
            "bad_params",
            "username already has a profile",
            Some(json!({ "username": username })),
        );
    }

    let profile = StaffProfile {
        id: uuid::Uuid::new_v4().to_string(),
        username,
        role,
        forms_responsible,
    };
    if let Err(e) = conn.execute(
        "INSERT INTO staff_profiles(id, username, role, forms_responsible) VALUES(?, ?, ?, ?)",
        (
            &profile.id,
            &profile.username,
            profile.role.code(),
            &profile.forms_responsible,
        ),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    tracing::info!(username = %profile.username, role = profile.role.code(), "staff profile created");
    ok(&req.id, json!({ "profile": profile }))
}

fn handle_staff_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, username, role, forms_responsible FROM staff_profiles ORDER BY username",
    ) {
        Ok(s) => s,
        Err(e) => return grading_err(&req.id, &e.into()),
    };
    let profiles = stmt
        .query_map([], |r| {
            staff_from_row(r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match profiles {
        Ok(profiles) => ok(&req.id, json!({ "profiles": profiles })),
        Err(e) => grading_err(&req.id, &e.into()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "staff.create" => Some(handle_staff_create(state, req)),
        "staff.list" => Some(handle_staff_list(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forms_are_canonicalised() {
        assert_eq!(normalize_forms("all").as_deref(), Ok("ALL"));
        assert_eq!(normalize_forms(" f1, F3S ,F1").as_deref(), Ok("F1,F3S"));
        assert!(normalize_forms("F1,F9").is_err());
    }
}
