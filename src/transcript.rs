use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;

use crate::grading::SubjectGrade;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterTranscript {
    pub semester: String,
    pub gpa: f64,
    pub graded_subjects: usize,
    pub courses: Vec<SubjectGrade>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptModel {
    pub student_id: i64,
    pub cumulative_gpa: f64,
    pub graded_subjects: usize,
    pub semesters: Vec<SemesterTranscript>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Directory facts printed in the transcript header.
#[derive(Debug, Clone)]
pub struct TranscriptHeader {
    pub institution: String,
    pub student_name: String,
    pub department: String,
}

/// Plain-text transcript. Output depends only on its inputs; the footer uses
/// the record's last-updated time, never the clock.
pub fn render(model: &TranscriptModel, header: &TranscriptHeader, subject_names: &HashMap<i64, String>) -> String {
    let mut out = String::new();
    let title = "ACADEMIC TRANSCRIPT";
    let _ = writeln!(out, "{}", header.institution);
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "=".repeat(title.len()));
    out.push('\n');
    let _ = writeln!(out, "Student: {}", header.student_name);
    let _ = writeln!(out, "ID: {}", model.student_id);
    let _ = writeln!(out, "Department: {}", header.department);
    let _ = writeln!(out, "Cumulative GPA: {:.2}", model.cumulative_gpa);
    out.push('\n');

    for sem in &model.semesters {
        let _ = writeln!(out, "SEMESTER: {}", sem.semester);
        let _ = writeln!(out, "GPA: {:.2}", sem.gpa);
        let _ = writeln!(out, "Courses:");
        for course in &sem.courses {
            let name = subject_names
                .get(&course.subject_id)
                .cloned()
                .unwrap_or_else(|| format!("Subject {}", course.subject_id));
            let _ = writeln!(
                out,
                "  - {}: {} ({:.2}%)",
                name, course.letter, course.percentage
            );
        }
        out.push('\n');
    }

    match model.updated_at {
        Some(ts) => {
            let _ = write!(out, "Last Updated: {}", ts.format("%d/%m/%Y %H:%M:%S"));
        }
        None => out.push_str("Last Updated: never"),
    }
    out
}
