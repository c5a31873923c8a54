use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::policy::Actor;
use crate::record::AcademicRecord;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub actor: Actor,
}

/// Daemon state. Exactly one session is current at a time and records are
/// only written from the request loop, so nothing here is shared across threads.
#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub session: Option<Session>,
    pub records: HashMap<i64, AcademicRecord>,
}
