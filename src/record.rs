use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::error::SisError;
use crate::grading::{self, Assessment, GpaSummary, SubjectGrade};
use crate::transcript::{SemesterTranscript, TranscriptModel};

/// All assessments for one student.
///
/// `assessments` is the source of truth. `by_semester` and `by_subject` hold
/// positions into it and are only ever extended together with it, so every
/// indexed position names exactly one stored assessment. Not synchronized:
/// callers keep a single writer.
#[derive(Debug, Clone)]
pub struct AcademicRecord {
    student_id: i64,
    assessments: Vec<Assessment>,
    semester_order: Vec<String>,
    by_semester: HashMap<String, Vec<usize>>,
    subject_order: Vec<i64>,
    by_subject: HashMap<i64, Vec<usize>>,
    updated_at: Option<DateTime<Utc>>,
}

impl AcademicRecord {
    pub fn new(student_id: i64) -> Self {
        Self {
            student_id,
            assessments: Vec::new(),
            semester_order: Vec::new(),
            by_semester: HashMap::new(),
            subject_order: Vec::new(),
            by_subject: HashMap::new(),
            updated_at: None,
        }
    }

    pub fn student_id(&self) -> i64 {
        self.student_id
    }

    pub fn assessments(&self) -> &[Assessment] {
        &self.assessments
    }

    /// Semester labels in the order they were first graded.
    pub fn semesters(&self) -> &[String] {
        &self.semester_order
    }

    /// Subject ids in the order they were first graded.
    pub fn subjects(&self) -> &[i64] {
        &self.subject_order
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Appends one assessment and extends both indexes. `at` becomes the
    /// record's last-modified time unless an earlier write was later.
    pub fn add_grade(&mut self, assessment: Assessment, at: DateTime<Utc>) -> Result<(), SisError> {
        if assessment.student_id != self.student_id {
            return Err(SisError::InvalidAssessment(format!(
                "assessment for student {} cannot join record of student {}",
                assessment.student_id, self.student_id
            )));
        }
        if assessment.percentage().is_none() {
            return Err(SisError::InvalidAssessment(
                "maxScore must be greater than 0".to_string(),
            ));
        }

        let pos = self.assessments.len();
        let semester = assessment.semester.clone();
        let subject_id = assessment.subject_id;
        self.assessments.push(assessment);

        match self.by_semester.get_mut(&semester) {
            Some(bucket) => bucket.push(pos),
            None => {
                self.semester_order.push(semester.clone());
                self.by_semester.insert(semester, vec![pos]);
            }
        }
        match self.by_subject.get_mut(&subject_id) {
            Some(bucket) => bucket.push(pos),
            None => {
                self.subject_order.push(subject_id);
                self.by_subject.insert(subject_id, vec![pos]);
            }
        }

        self.touch(at);
        Ok(())
    }

    /// Remark correction is the only in-place change an assessment allows.
    pub fn update_remark(&mut self, grade_id: &str, remark: &str, at: DateTime<Utc>) -> bool {
        let Some(a) = self.assessments.iter_mut().find(|a| a.id == grade_id) else {
            return false;
        };
        a.remark = remark.to_string();
        self.touch(at);
        true
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = Some(match self.updated_at {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }

    pub fn in_semester(&self, semester: &str) -> impl Iterator<Item = &Assessment> {
        self.by_semester
            .get(semester)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.assessments[pos])
    }

    pub fn for_subject(&self, subject_id: i64) -> impl Iterator<Item = &Assessment> {
        self.by_subject
            .get(&subject_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.assessments[pos])
    }

    /// Distinct subjects graded in `semester`, first-seen order.
    pub fn subjects_in_semester(&self, semester: &str) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.in_semester(semester)
            .map(|a| a.subject_id)
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn overall_subject_grade(&self, subject_id: i64, semester: &str) -> Option<SubjectGrade> {
        grading::overall_subject_grade(self.for_subject(subject_id), subject_id, semester)
    }

    fn semester_grades(&self, semester: &str) -> Vec<SubjectGrade> {
        self.subjects_in_semester(semester)
            .into_iter()
            .filter_map(|subject_id| self.overall_subject_grade(subject_id, semester))
            .collect()
    }

    pub fn semester_gpa(&self, semester: &str) -> GpaSummary {
        grading::average_grade_points(self.semester_grades(semester))
    }

    /// Every (semester, subject) pair ever recorded counts once.
    pub fn cumulative_gpa(&self) -> GpaSummary {
        grading::average_grade_points(
            self.semester_order
                .iter()
                .flat_map(|semester| self.semester_grades(semester)),
        )
    }

    pub fn transcript(&self) -> TranscriptModel {
        let semesters = self
            .semester_order
            .iter()
            .map(|semester| {
                let courses = self.semester_grades(semester);
                let summary = grading::average_grade_points(courses.iter().cloned());
                SemesterTranscript {
                    semester: semester.clone(),
                    gpa: summary.gpa,
                    graded_subjects: summary.graded_subjects,
                    courses,
                }
            })
            .collect();
        let cumulative = self.cumulative_gpa();
        TranscriptModel {
            student_id: self.student_id(),
            cumulative_gpa: cumulative.gpa,
            graded_subjects: cumulative.graded_subjects,
            semesters,
            updated_at: self.updated_at,
        }
    }

    #[cfg(test)]
    fn indexes_match_sequence(&self) -> bool {
        let mut from_semesters: Vec<usize> = self.by_semester.values().flatten().copied().collect();
        let mut from_subjects: Vec<usize> = self.by_subject.values().flatten().copied().collect();
        from_semesters.sort_unstable();
        from_subjects.sort_unstable();
        let all: Vec<usize> = (0..self.assessments.len()).collect();
        let semester_ok = self.by_semester.iter().all(|(label, ps)| {
            ps.iter().all(|&p| self.assessments[p].semester == *label)
        });
        let subject_ok = self.by_subject.iter().all(|(id, ps)| {
            ps.iter().all(|&p| self.assessments[p].subject_id == *id)
        });
        from_semesters == all && from_subjects == all && semester_ok && subject_ok
    }
}
