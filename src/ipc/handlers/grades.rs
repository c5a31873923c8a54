use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::config;
use crate::db;
use crate::directory::{resolve, Directory, ResourceRef, SqliteDirectory};
use crate::error::SisError;
use crate::grading::{Assessment, Category, GpaSummary, NewAssessment, SubjectGrade};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    current_actor, get_optional_i64, get_optional_str, get_required_f64, get_required_i64,
    get_required_str, record_for,
};
use crate::ipc::types::{AppState, Request};
use crate::policy::{self, Actor, Operation, Role};
use crate::transcript::{self, TranscriptHeader};

fn authorize_student(
    dir: &SqliteDirectory<'_>,
    actor: &Actor,
    op: Operation,
    student_id: i64,
) -> Result<(), HandlerErr> {
    let attrs = resolve(dir, ResourceRef::Student(student_id))?;
    policy::require(actor, op, Some(&attrs))?;
    Ok(())
}

fn subject_grade_json(g: Option<&SubjectGrade>) -> serde_json::Value {
    match g {
        Some(g) => json!({
            "subjectId": g.subject_id,
            "semester": g.semester,
            "category": g.category,
            "percentage": g.percentage,
            "letter": g.letter,
            "gradePoints": g.grade_points(),
        }),
        None => serde_json::Value::Null,
    }
}

fn gpa_json(summary: GpaSummary) -> serde_json::Value {
    json!({
        "gpa": summary.gpa,
        "gradedSubjects": summary.graded_subjects,
        "available": summary.available().is_some(),
    })
}

fn assessment_json(a: &Assessment) -> serde_json::Value {
    json!({
        "gradeId": a.id,
        "subjectId": a.subject_id,
        "category": a.category,
        "title": a.title,
        "score": a.score,
        "maxScore": a.max_score,
        "semester": a.semester,
        "recordedAt": a.recorded_at.to_rfc3339(),
        "remark": a.remark,
        "percentage": a.percentage(),
        "letter": a.letter(),
    })
}

fn grades_add(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let AppState { db, records, .. } = state;
    let conn = db.as_ref().ok_or_else(HandlerErr::no_workspace)?;

    let student_id = get_required_i64(params, "studentId")?;
    let subject_id = get_required_i64(params, "subjectId")?;
    let category_raw = get_required_str(params, "category")?;
    let score = get_required_f64(params, "score")?;
    let max_score = get_required_f64(params, "maxScore")?;
    let semester = get_required_str(params, "semester")?;
    let title = get_optional_str(params, "title")?.unwrap_or_default();
    let remark = get_optional_str(params, "remark")?.unwrap_or_default();

    let dir = SqliteDirectory::new(conn);
    authorize_student(&dir, &actor, Operation::ManageGrades, student_id)?;

    let now = Utc::now();
    let assessment = Assessment::create(
        NewAssessment {
            student_id,
            subject_id,
            category: Category::parse_input(&category_raw)?,
            title,
            score,
            max_score,
            semester,
            remark,
        },
        Uuid::new_v4().to_string(),
        now,
    )?;
    if dir.student(student_id)?.is_none() {
        return Err(SisError::NotFound("student").into());
    }
    if dir.subject(subject_id)?.is_none() {
        return Err(SisError::NotFound("subject").into());
    }

    // Load before writing so the new row is not replayed into the record twice.
    let record = record_for(conn, records, student_id)?;
    db::insert_grade(conn, &assessment)?;
    let result = json!({
        "gradeId": assessment.id,
        "percentage": assessment.percentage(),
        "letter": assessment.letter(),
    });
    record.add_grade(assessment, now)?;
    info!(student_id, subject_id, "grade recorded");
    Ok(result)
}

fn grades_update_remark(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let AppState { db, records, .. } = state;
    let conn = db.as_ref().ok_or_else(HandlerErr::no_workspace)?;

    let student_id = get_required_i64(params, "studentId")?;
    let grade_id = get_required_str(params, "gradeId")?;
    let remark = get_required_str(params, "remark")?;

    let dir = SqliteDirectory::new(conn);
    authorize_student(&dir, &actor, Operation::ManageGrades, student_id)?;

    let record = record_for(conn, records, student_id)?;
    let now = Utc::now();
    if !db::update_grade_remark(conn, student_id, &grade_id, &remark, now)? {
        return Err(SisError::NotFound("grade").into());
    }
    record.update_remark(&grade_id, &remark, now);
    Ok(json!({ "ok": true }))
}

fn grades_list(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let AppState { db, records, .. } = state;
    let conn = db.as_ref().ok_or_else(HandlerErr::no_workspace)?;

    let student_id = get_required_i64(params, "studentId")?;
    let semester = get_optional_str(params, "semester")?;
    let subject_id = get_optional_i64(params, "subjectId")?;

    let dir = SqliteDirectory::new(conn);
    authorize_student(&dir, &actor, Operation::ViewGrades, student_id)?;

    let record = record_for(conn, records, student_id)?;
    let grades: Vec<serde_json::Value> = record
        .assessments()
        .iter()
        .filter(|a| semester.as_deref().map(|s| a.semester == s).unwrap_or(true))
        .filter(|a| subject_id.map(|id| a.subject_id == id).unwrap_or(true))
        .map(assessment_json)
        .collect();
    Ok(json!({
        "grades": grades,
        "semesters": record.semesters(),
        "subjects": record.subjects(),
        "updatedAt": record.updated_at().map(|t| t.to_rfc3339()),
    }))
}

fn grades_subject(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let AppState { db, records, .. } = state;
    let conn = db.as_ref().ok_or_else(HandlerErr::no_workspace)?;

    let student_id = get_required_i64(params, "studentId")?;
    let subject_id = get_required_i64(params, "subjectId")?;
    let semester = get_required_str(params, "semester")?;

    let dir = SqliteDirectory::new(conn);
    authorize_student(&dir, &actor, Operation::ViewGrades, student_id)?;

    let record = record_for(conn, records, student_id)?;
    let grade = record.overall_subject_grade(subject_id, &semester);
    Ok(json!({ "grade": subject_grade_json(grade.as_ref()) }))
}

fn grades_semester_gpa(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let AppState { db, records, .. } = state;
    let conn = db.as_ref().ok_or_else(HandlerErr::no_workspace)?;

    let student_id = get_required_i64(params, "studentId")?;
    let semester = get_required_str(params, "semester")?;

    let dir = SqliteDirectory::new(conn);
    authorize_student(&dir, &actor, Operation::ViewGrades, student_id)?;

    let record = record_for(conn, records, student_id)?;
    Ok(gpa_json(record.semester_gpa(&semester)))
}

fn grades_cumulative_gpa(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let AppState { db, records, .. } = state;
    let conn = db.as_ref().ok_or_else(HandlerErr::no_workspace)?;

    let student_id = get_required_i64(params, "studentId")?;

    let dir = SqliteDirectory::new(conn);
    authorize_student(&dir, &actor, Operation::ViewGrades, student_id)?;

    let record = record_for(conn, records, student_id)?;
    Ok(gpa_json(record.cumulative_gpa()))
}

fn transcript_generate(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let AppState { db, records, .. } = state;
    let conn = db.as_ref().ok_or_else(HandlerErr::no_workspace)?;

    let student_id = get_required_i64(params, "studentId")?;

    let dir = SqliteDirectory::new(conn);
    let attrs = resolve(&dir, ResourceRef::Student(student_id))?;
    let official = policy::decide(&actor, Operation::GenerateTranscripts, Some(&attrs)).is_allowed();
    let own_copy = actor.role() == Role::Student
        && policy::decide(&actor, Operation::ViewGrades, Some(&attrs)).is_allowed();
    if !official && !own_copy {
        return Err(SisError::AccessDenied {
            operation: Operation::GenerateTranscripts,
        }
        .into());
    }

    let Some(student) = dir.student(student_id)? else {
        return Err(SisError::NotFound("student").into());
    };
    let settings = config::load(conn)?;
    let record = record_for(conn, records, student_id)?;

    let mut subject_names: HashMap<i64, String> = HashMap::new();
    for &subject_id in record.subjects() {
        if let Some(subject) = dir.subject(subject_id)? {
            subject_names.insert(subject_id, subject.name);
        }
    }

    let model = record.transcript();
    let header = TranscriptHeader {
        institution: settings.transcript.institution,
        student_name: student.name,
        department: student.department,
    };
    let text = transcript::render(&model, &header, &subject_names);
    Ok(json!({ "text": text, "model": model }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.add" => Some(respond(&req.id, grades_add(state, &req.params))),
        "grades.updateRemark" => Some(respond(&req.id, grades_update_remark(state, &req.params))),
        "grades.list" => Some(respond(&req.id, grades_list(state, &req.params))),
        "grades.subject" => Some(respond(&req.id, grades_subject(state, &req.params))),
        "grades.semesterGpa" => Some(respond(&req.id, grades_semester_gpa(state, &req.params))),
        "grades.cumulativeGpa" => Some(respond(&req.id, grades_cumulative_gpa(state, &req.params))),
        "transcript.generate" => Some(respond(&req.id, transcript_generate(state, &req.params))),
        _ => None,
    }
}
