use std::collections::hash_map::Entry;
use std::collections::HashMap;

use rusqlite::Connection;

use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use crate::policy::Actor;
use crate::record::AcademicRecord;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_nonblank(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let v = get_required_str(params, key)?;
    let t = v.trim();
    if t.is_empty() {
        return Err(HandlerErr::bad_params(format!("{} must not be blank", key)));
    }
    Ok(t.to_string())
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(HandlerErr::no_workspace)
}

pub fn current_actor(state: &AppState) -> Result<Actor, HandlerErr> {
    state
        .session
        .as_ref()
        .map(|s| s.actor.clone())
        .ok_or_else(|| HandlerErr::new("no_session", "log in first"))
}

/// The cached record for a student, loaded from storage on first use.
pub fn record_for<'r>(
    conn: &Connection,
    records: &'r mut HashMap<i64, AcademicRecord>,
    student_id: i64,
) -> Result<&'r mut AcademicRecord, HandlerErr> {
    match records.entry(student_id) {
        Entry::Occupied(e) => Ok(e.into_mut()),
        Entry::Vacant(e) => {
            let record = db::load_record(conn, student_id)?;
            Ok(e.insert(record))
        }
    }
}
