use serde_json::json;

use crate::directory::{resolve, ResourceRef, SqliteDirectory};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{current_actor, get_required_i64, get_required_str, require_db};
use crate::ipc::types::{AppState, Request};
use crate::policy::{self, ResourceKind};

/// Answers whether the current actor may perform an operation, so the caller
/// can hide menu entries. Never returns an error for unknown names.
fn access_check(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let operation = get_required_str(params, "operation")?;

    let attrs = match params.get("resource") {
        None | Some(serde_json::Value::Null) => None,
        Some(resource) => {
            let kind_raw = get_required_str(resource, "kind")?;
            let Some(kind) = ResourceKind::parse(&kind_raw) else {
                return Err(HandlerErr::bad_params(format!("unknown resource kind: {}", kind_raw)));
            };
            let id = get_required_i64(resource, "id")?;
            let conn = require_db(state)?;
            Some(resolve(&SqliteDirectory::new(conn), ResourceRef::new(kind, id))?)
        }
    };

    let decision = policy::decide_named(&actor, &operation, attrs.as_ref());
    Ok(json!({ "allowed": decision.is_allowed() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "access.check" => Some(respond(&req.id, access_check(state, &req.params))),
        _ => None,
    }
}
