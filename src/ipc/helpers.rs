use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{Form, Term};
use rusqlite::Connection;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        Some(_) => Err(err(&req.id, "bad_params", format!("{} must not be empty", key), None)),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_form_str(req: &Request, raw: &str) -> Result<Form, serde_json::Value> {
    Form::parse(raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "form must be one of: F1, F2, F3S, F3H, F4S, F4H",
            Some(serde_json::json!({ "form": raw })),
        )
    })
}

pub fn required_form(req: &Request) -> Result<Form, serde_json::Value> {
    let raw = required_str(req, "form")?;
    parse_form_str(req, &raw)
}

/// Terms default to T1 when omitted.
pub fn term_param(req: &Request) -> Result<Term, serde_json::Value> {
    match optional_str(req, "term") {
        None => Ok(Term::T1),
        Some(raw) => Term::parse(&raw).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "term must be one of: T1, T2, T3",
                Some(serde_json::json!({ "term": raw })),
            )
        }),
    }
}
