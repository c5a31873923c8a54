use serde_json::json;

use crate::directory::{resolve, Directory, ResourceRef, SqliteDirectory};
use crate::error::SisError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    current_actor, get_optional_i64, get_optional_str, get_required_i64, get_required_nonblank,
    require_db,
};
use crate::ipc::types::{AppState, Request};
use crate::policy::{self, Operation, ResourceAttrs};

fn teachers_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let id = get_optional_i64(params, "id")?;
    let name = get_required_nonblank(params, "name")?;
    let department = get_required_nonblank(params, "department")?;
    let specialization = get_optional_str(params, "specialization")?;

    let target = ResourceAttrs::teacher(Some(department.clone()));
    policy::require(&actor, Operation::ManageTeachers, Some(&target))?;

    let dir = SqliteDirectory::new(conn);
    if let Some(id) = id {
        if dir.teacher(id)?.is_some() {
            return Err(HandlerErr::new("conflict", "teacher id already exists"));
        }
    }
    let teacher_id = dir.insert_teacher(id, &name, &department, specialization.as_deref())?;
    Ok(json!({ "teacherId": teacher_id }))
}

fn teachers_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let teacher_id = get_required_i64(params, "teacherId")?;
    let dir = SqliteDirectory::new(conn);
    let attrs = resolve(&dir, ResourceRef::Teacher(teacher_id))?;
    policy::require(&actor, Operation::ViewTeacher, Some(&attrs))?;
    let Some(teacher) = dir.teacher(teacher_id)? else {
        return Err(SisError::NotFound("teacher").into());
    };
    Ok(json!({ "teacher": teacher }))
}

fn teachers_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let teachers: Vec<_> = SqliteDirectory::new(conn)
        .list_teachers()?
        .into_iter()
        .filter(|t| {
            let attrs = ResourceAttrs::teacher(Some(t.department.clone()));
            policy::decide(&actor, Operation::ViewTeacher, Some(&attrs)).is_allowed()
        })
        .collect();
    Ok(json!({ "teachers": teachers }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.create" => Some(respond(&req.id, teachers_create(state, &req.params))),
        "teachers.get" => Some(respond(&req.id, teachers_get(state, &req.params))),
        "teachers.list" => Some(respond(&req.id, teachers_list(state))),
        _ => None,
    }
}
