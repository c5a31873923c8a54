use serde_json::json;

use crate::directory::{resolve, Directory, ResourceRef, SqliteDirectory};
use crate::error::SisError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    current_actor, get_optional_i64, get_optional_str, get_required_i64, get_required_nonblank,
    require_db,
};
use crate::ipc::types::{AppState, Request};
use crate::policy::{self, Operation, ResourceAttrs, ResourceKind};

fn students_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let id = get_optional_i64(params, "id")?;
    let name = get_required_nonblank(params, "name")?;
    let roll_number = get_required_nonblank(params, "rollNumber")?;
    let department = get_required_nonblank(params, "department")?;
    let gender = get_optional_str(params, "gender")?;

    let target = ResourceAttrs {
        kind: ResourceKind::Student,
        department: Some(department.clone()),
        owner_id: id,
    };
    policy::require(&actor, Operation::ManageStudents, Some(&target))?;

    let dir = SqliteDirectory::new(conn);
    if let Some(id) = id {
        if dir.student(id)?.is_some() {
            return Err(HandlerErr::new("conflict", "student id already exists"));
        }
    }
    let student_id = dir.insert_student(id, &name, &roll_number, &department, gender.as_deref())?;
    Ok(json!({ "studentId": student_id }))
}

fn students_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let student_id = get_required_i64(params, "studentId")?;
    let dir = SqliteDirectory::new(conn);
    let attrs = resolve(&dir, ResourceRef::Student(student_id))?;
    policy::require(&actor, Operation::ViewStudent, Some(&attrs))?;
    let Some(student) = dir.student(student_id)? else {
        return Err(SisError::NotFound("student").into());
    };
    Ok(json!({ "student": student }))
}

fn students_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let department = get_optional_str(params, "department")?;
    let dir = SqliteDirectory::new(conn);
    let students: Vec<_> = dir
        .list_students()?
        .into_iter()
        .filter(|s| department.as_deref().map(|d| d == s.department).unwrap_or(true))
        .filter(|s| {
            let attrs = ResourceAttrs::student(s.id, Some(s.department.clone()));
            policy::decide(&actor, Operation::ViewStudent, Some(&attrs)).is_allowed()
        })
        .collect();
    Ok(json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(respond(&req.id, students_create(state, &req.params))),
        "students.get" => Some(respond(&req.id, students_get(state, &req.params))),
        "students.list" => Some(respond(&req.id, students_list(state, &req.params))),
        _ => None,
    }
}
