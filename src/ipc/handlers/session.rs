use serde_json::json;
use tracing::info;

use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_db};
use crate::ipc::types::{AppState, Request, Session};
use crate::policy::{Actor, Role};

pub fn actor_for_user(user: &db::UserRow) -> Result<Actor, HandlerErr> {
    let role: Role = user.role.parse()?;
    Ok(Actor::new(role, user.department.clone(), user.associated_id)?)
}

fn session_login(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let username = get_required_str(params, "username")?;
    let conn = require_db(state)?;
    let Some(user) = db::find_user(conn, &username)? else {
        return Err(HandlerErr::new("unknown_user", "no such user"));
    };
    let actor = actor_for_user(&user)?;
    info!(username = %user.username, role = %actor.role(), "session started");
    let result = json!({
        "username": user.username,
        "fullName": user.full_name,
        "actor": actor,
    });
    state.session = Some(Session {
        username: user.username,
        actor,
    });
    Ok(result)
}

fn session_logout(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    if let Some(s) = state.session.take() {
        info!(username = %s.username, "session ended");
    }
    Ok(json!({ "ok": true }))
}

fn session_whoami(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(match &state.session {
        Some(s) => json!({ "username": s.username, "actor": s.actor }),
        None => json!({ "username": null, "actor": null }),
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.login" => Some(respond(&req.id, session_login(state, &req.params))),
        "session.logout" => Some(respond(&req.id, session_logout(state))),
        "session.whoami" => Some(respond(&req.id, session_whoami(state))),
        _ => None,
    }
}
