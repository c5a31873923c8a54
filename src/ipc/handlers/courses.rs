use serde_json::json;
use std::collections::HashMap;

use crate::directory::{resolve, Directory, ResourceRef, SqliteDirectory};
use crate::error::SisError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    current_actor, get_optional_i64, get_required_i64, get_required_nonblank, require_db,
};
use crate::ipc::types::{AppState, Request};
use crate::policy::{self, Actor, Operation, ResourceAttrs};

fn courses_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let id = get_optional_i64(params, "id")?;
    let name = get_required_nonblank(params, "name")?;
    let department = get_required_nonblank(params, "department")?;
    let credit_hours = get_optional_i64(params, "creditHours")?.unwrap_or(0);
    if credit_hours < 0 {
        return Err(HandlerErr::bad_params("creditHours must not be negative"));
    }

    let target = ResourceAttrs::course(Some(department.clone()));
    policy::require(&actor, Operation::ManageCourses, Some(&target))?;

    let dir = SqliteDirectory::new(conn);
    if let Some(id) = id {
        if dir.course(id)?.is_some() {
            return Err(HandlerErr::new("conflict", "course id already exists"));
        }
    }
    let course_id = dir.insert_course(id, &name, &department, credit_hours)?;
    Ok(json!({ "courseId": course_id }))
}

fn courses_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let course_id = get_required_i64(params, "courseId")?;
    let dir = SqliteDirectory::new(conn);
    let attrs = resolve(&dir, ResourceRef::Course(course_id))?;
    policy::require(&actor, Operation::ViewCourse, Some(&attrs))?;
    let Some(course) = dir.course(course_id)? else {
        return Err(SisError::NotFound("course").into());
    };
    let subjects = dir.list_subjects(Some(course_id))?;
    Ok(json!({ "course": course, "subjects": subjects }))
}

fn courses_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let courses: Vec<_> = SqliteDirectory::new(conn)
        .list_courses()?
        .into_iter()
        .filter(|c| can_view_course(&actor, &c.department))
        .collect();
    Ok(json!({ "courses": courses }))
}

fn can_view_course(actor: &Actor, department: &str) -> bool {
    let attrs = ResourceAttrs::course(Some(department.to_string()));
    policy::decide(actor, Operation::ViewCourse, Some(&attrs)).is_allowed()
}

fn subjects_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let id = get_optional_i64(params, "id")?;
    let name = get_required_nonblank(params, "name")?;
    let course_id = get_required_i64(params, "courseId")?;
    let teacher_id = get_optional_i64(params, "teacherId")?;
    let credit_hours = get_optional_i64(params, "creditHours")?.unwrap_or(0);
    if credit_hours < 0 {
        return Err(HandlerErr::bad_params("creditHours must not be negative"));
    }

    let dir = SqliteDirectory::new(conn);
    let attrs = resolve(&dir, ResourceRef::Course(course_id))?;
    policy::require(&actor, Operation::ManageCourses, Some(&attrs))?;
    if dir.course(course_id)?.is_none() {
        return Err(SisError::NotFound("course").into());
    }
    if let Some(tid) = teacher_id {
        if dir.teacher(tid)?.is_none() {
            return Err(SisError::NotFound("teacher").into());
        }
    }
    if let Some(id) = id {
        if dir.subject(id)?.is_some() {
            return Err(HandlerErr::new("conflict", "subject id already exists"));
        }
    }
    let subject_id = dir.insert_subject(id, &name, course_id, teacher_id, credit_hours)?;
    Ok(json!({ "subjectId": subject_id }))
}

fn subjects_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let conn = require_db(state)?;
    let course_id = get_optional_i64(params, "courseId")?;
    let dir = SqliteDirectory::new(conn);

    if let Some(cid) = course_id {
        let attrs = resolve(&dir, ResourceRef::Course(cid))?;
        policy::require(&actor, Operation::ViewCourse, Some(&attrs))?;
    }

    let departments: HashMap<i64, String> = dir
        .list_courses()?
        .into_iter()
        .map(|c| (c.id, c.department))
        .collect();
    let subjects: Vec<_> = dir
        .list_subjects(course_id)?
        .into_iter()
        .filter(|s| {
            departments
                .get(&s.course_id)
                .map(|d| can_view_course(&actor, d))
                .unwrap_or(false)
        })
        .collect();
    Ok(json!({ "subjects": subjects }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.create" => Some(respond(&req.id, courses_create(state, &req.params))),
        "courses.get" => Some(respond(&req.id, courses_get(state, &req.params))),
        "courses.list" => Some(respond(&req.id, courses_list(state))),
        "subjects.create" => Some(respond(&req.id, subjects_create(state, &req.params))),
        "subjects.list" => Some(respond(&req.id, subjects_list(state, &req.params))),
        _ => None,
    }
}
