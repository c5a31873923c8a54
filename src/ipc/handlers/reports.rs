use serde_json::json;

use crate::config::{self, StandingSettings};
use crate::directory::SqliteDirectory;
use crate::grading::GpaSummary;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{current_actor, get_optional_str, record_for};
use crate::ipc::types::{AppState, Request};
use crate::policy::{self, Operation, ResourceAttrs};

fn standing_label(summary: &GpaSummary, cutoffs: &StandingSettings) -> &'static str {
    match summary.available() {
        None => "noGrades",
        Some(gpa) if gpa < cutoffs.warning_below => "warning",
        Some(gpa) if gpa >= cutoffs.deans_list_at_or_above => "deansList",
        Some(_) => "good",
    }
}

fn reports_standing(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let actor = current_actor(state)?;
    let AppState { db, records, .. } = state;
    let conn = db.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let department = get_optional_str(params, "department")?;
    policy::require(&actor, Operation::ViewReports, None)?;

    let cutoffs = config::load(conn)?.standing;
    let dir = SqliteDirectory::new(conn);

    let mut rows = Vec::new();
    let mut counts = json!({ "warning": 0, "good": 0, "deansList": 0, "noGrades": 0 });
    for student in dir.list_students()? {
        if department.as_deref().is_some_and(|d| d != student.department) {
            continue;
        }
        let attrs = ResourceAttrs::student(student.id, Some(student.department.clone()));
        if !policy::decide(&actor, Operation::GenerateReports, Some(&attrs)).is_allowed() {
            continue;
        }
        let summary = record_for(conn, records, student.id)?.cumulative_gpa();
        let standing = standing_label(&summary, &cutoffs);
        if let Some(n) = counts.get_mut(standing) {
            *n = json!(n.as_u64().unwrap_or(0) + 1);
        }
        rows.push(json!({
            "studentId": student.id,
            "name": student.name,
            "rollNumber": student.roll_number,
            "department": student.department,
            "gpa": summary.gpa,
            "gradedSubjects": summary.graded_subjects,
            "standing": standing,
        }));
    }

    Ok(json!({
        "students": rows,
        "counts": counts,
        "cutoffs": cutoffs,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.standing" => Some(respond(&req.id, reports_standing(state, &req.params))),
        _ => None,
    }
}
