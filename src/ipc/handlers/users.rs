use serde_json::json;

use crate::db::{self, UserRow};
use crate::directory::{Directory, SqliteDirectory};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::session::actor_for_user;
use crate::ipc::helpers::{
    current_actor, get_optional_i64, get_optional_str, get_required_nonblank, require_db,
};
use crate::ipc::types::{AppState, Request};
use crate::policy::{self, Operation};

fn user_json(u: &UserRow) -> serde_json::Value {
    json!({
        "username": u.username,
        "fullName": u.full_name,
        "role": u.role,
        "department": u.department,
        "associatedId": u.associated_id,
    })
}

fn users_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    policy::require(&actor, Operation::ManageUsers, None)?;

    let mut user = UserRow {
        username: get_required_nonblank(params, "username")?,
        full_name: get_required_nonblank(params, "fullName")?,
        role: get_required_nonblank(params, "role")?,
        department: get_optional_str(params, "department")?,
        associated_id: get_optional_i64(params, "associatedId")?,
    };
    let new_actor = actor_for_user(&user)?;
    user.role = new_actor.role().as_str().to_string();
    if let Some(student_id) = new_actor.associated_id() {
        if SqliteDirectory::new(conn).student(student_id)?.is_none() {
            return Err(HandlerErr::new("not_found", "associated student not found"));
        }
    }
    if db::find_user(conn, &user.username)?.is_some() {
        return Err(HandlerErr::new("conflict", "username already exists"));
    }
    db::insert_user(conn, &user)?;
    Ok(user_json(&user))
}

fn users_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    policy::require(&actor, Operation::ManageUsers, None)?;
    let users: Vec<serde_json::Value> = db::list_users(conn)?.iter().map(user_json).collect();
    Ok(json!({ "users": users }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.create" => Some(respond(&req.id, users_create(state, &req.params))),
        "users.list" => Some(respond(&req.id, users_list(state))),
        _ => None,
    }
}
