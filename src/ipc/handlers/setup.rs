use serde_json::json;

use crate::config::{self, Section};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{current_actor, get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::policy::{self, Operation};

fn settings_get(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    policy::require(&actor, Operation::ManageUsers, None)?;
    let settings = config::load(conn)?;
    Ok(json!({ "settings": settings }))
}

fn settings_update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    policy::require(&actor, Operation::ManageUsers, None)?;

    let section_raw = get_required_str(params, "section")?;
    let Some(section) = Section::parse(&section_raw) else {
        return Err(HandlerErr::bad_params(format!("unknown section: {}", section_raw)));
    };
    let Some(patch) = params.get("patch") else {
        return Err(HandlerErr::bad_params("missing patch"));
    };
    match config::update_section(conn, section, patch)? {
        Ok(merged) => {
            tracing::info!(section = section.key(), "settings updated");
            Ok(json!({ "section": section.key(), "value": merged }))
        }
        Err(message) => Err(HandlerErr::bad_params(message)),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(respond(&req.id, settings_get(state))),
        "settings.update" => Some(respond(&req.id, settings_update(state, &req.params))),
        _ => None,
    }
}
