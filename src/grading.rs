use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::SisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Quiz,
    Assignment,
    Midterm,
    Final,
    /// Synthetic category carried by a computed subject grade. Never accepted as input.
    Course,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Quiz => "Quiz",
            Category::Assignment => "Assignment",
            Category::Midterm => "Midterm",
            Category::Final => "Final",
            Category::Course => "Course",
        }
    }

    /// Contribution of this category toward a subject's semester grade.
    /// Categories outside the weight table return `None` and are ignored.
    pub fn weight(self) -> Option<f64> {
        match self {
            Category::Quiz => Some(0.15),
            Category::Assignment => Some(0.15),
            Category::Midterm => Some(0.30),
            Category::Final => Some(0.40),
            Category::Course => None,
        }
    }

    /// Parses a category supplied by a grading workflow.
    pub fn parse_input(raw: &str) -> Result<Category, SisError> {
        match raw.parse::<Category>()? {
            Category::Course => Err(SisError::InvalidAssessment(
                "category Course is computed, not recorded".to_string(),
            )),
            c => Ok(c),
        }
    }
}

impl FromStr for Category {
    type Err = SisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        [
            Category::Quiz,
            Category::Assignment,
            Category::Midterm,
            Category::Final,
            Category::Course,
        ]
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(t))
        .ok_or_else(|| SisError::InvalidAssessment(format!("unknown category: {}", t)))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    F,
}

impl Letter {
    /// Bands are inclusive at their lower bound and checked highest first.
    /// Percentages above 100 stay in band A.
    pub fn from_percentage(percentage: f64) -> Letter {
        if percentage >= 90.0 {
            Letter::A
        } else if percentage >= 80.0 {
            Letter::B
        } else if percentage >= 70.0 {
            Letter::C
        } else if percentage >= 60.0 {
            Letter::D
        } else {
            Letter::F
        }
    }

    pub fn grade_points(self) -> f64 {
        match self {
            Letter::A => 4.0,
            Letter::B => 3.0,
            Letter::C => 2.0,
            Letter::D => 1.0,
            Letter::F => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
            Letter::F => "F",
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `score / max_score * 100`, unclamped. `None` when `max_score` cannot divide
/// or the quotient overflows.
pub fn percentage(score: f64, max_score: f64) -> Option<f64> {
    if !(max_score > 0.0 && max_score.is_finite() && score.is_finite()) {
        return None;
    }
    let pct = score / max_score * 100.0;
    pct.is_finite().then_some(pct)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub student_id: i64,
    pub subject_id: i64,
    pub category: Category,
    pub title: String,
    pub score: f64,
    pub max_score: f64,
    pub semester: String,
    pub recorded_at: DateTime<Utc>,
    pub remark: String,
}

#[derive(Debug, Clone)]
pub struct NewAssessment {
    pub student_id: i64,
    pub subject_id: i64,
    pub category: Category,
    pub title: String,
    pub score: f64,
    pub max_score: f64,
    pub semester: String,
    pub remark: String,
}

impl Assessment {
    /// Validates a new scored event. Over-credit (`score > max_score`) is kept as is.
    pub fn create(input: NewAssessment, id: String, recorded_at: DateTime<Utc>) -> Result<Assessment, SisError> {
        if !input.max_score.is_finite() || input.max_score <= 0.0 {
            return Err(SisError::InvalidAssessment(
                "maxScore must be greater than 0".to_string(),
            ));
        }
        if !input.score.is_finite() || input.score < 0.0 {
            return Err(SisError::InvalidAssessment(
                "score must be a non-negative number".to_string(),
            ));
        }
        if input.category == Category::Course {
            return Err(SisError::InvalidAssessment(
                "category Course is computed, not recorded".to_string(),
            ));
        }
        if percentage(input.score, input.max_score).is_none() {
            return Err(SisError::InvalidAssessment(
                "score / maxScore is out of range".to_string(),
            ));
        }
        let semester = input.semester.trim();
        if semester.is_empty() {
            return Err(SisError::InvalidAssessment(
                "semester must not be blank".to_string(),
            ));
        }
        Ok(Assessment {
            id,
            student_id: input.student_id,
            subject_id: input.subject_id,
            category: input.category,
            title: input.title,
            score: input.score,
            max_score: input.max_score,
            semester: semester.to_string(),
            recorded_at,
            remark: input.remark,
        })
    }

    pub fn percentage(&self) -> Option<f64> {
        percentage(self.score, self.max_score)
    }

    pub fn letter(&self) -> Option<Letter> {
        self.percentage().map(Letter::from_percentage)
    }
}

/// Weighted course grade for one subject in one semester.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGrade {
    pub subject_id: i64,
    pub semester: String,
    pub category: Category,
    pub percentage: f64,
    pub letter: Letter,
}

impl SubjectGrade {
    pub fn grade_points(&self) -> f64 {
        self.letter.grade_points()
    }
}

/// Weighted average of the given assessments' percentages, renormalized over
/// the weights actually present. Unweighted categories and assessments with
/// an unusable `max_score` contribute nothing to either side of the ratio.
pub fn weighted_percentage<'a, I>(assessments: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Assessment>,
{
    let mut weighted_sum = 0.0_f64;
    let mut weight_total = 0.0_f64;
    for a in assessments {
        let Some(weight) = a.category.weight() else {
            continue;
        };
        let Some(pct) = a.percentage() else {
            continue;
        };
        weighted_sum += pct * weight;
        weight_total += weight;
    }
    if weight_total > 0.0 {
        Some(weighted_sum / weight_total)
    } else {
        None
    }
}

/// Course grade for `subject_id` in `semester`, or `None` when nothing weighted was recorded.
pub fn overall_subject_grade<'a, I>(assessments: I, subject_id: i64, semester: &str) -> Option<SubjectGrade>
where
    I: IntoIterator<Item = &'a Assessment>,
{
    let pct = weighted_percentage(
        assessments
            .into_iter()
            .filter(|a| a.subject_id == subject_id && a.semester == semester),
    )?;
    Some(SubjectGrade {
        subject_id,
        semester: semester.to_string(),
        category: Category::Course,
        percentage: pct,
        letter: Letter::from_percentage(pct),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpaSummary {
    pub gpa: f64,
    pub graded_subjects: usize,
}

impl GpaSummary {
    /// Distinguishes "no graded subjects" from a genuine 0.0 GPA.
    pub fn available(&self) -> Option<f64> {
        if self.graded_subjects > 0 {
            Some(self.gpa)
        } else {
            None
        }
    }
}

/// Equal-weight mean of grade points. Empty input yields 0.0 with zero graded subjects.
pub fn average_grade_points<I>(grades: I) -> GpaSummary
where
    I: IntoIterator<Item = SubjectGrade>,
{
    let mut total = 0.0_f64;
    let mut count: usize = 0;
    for g in grades {
        total += g.grade_points();
        count += 1;
    }
    let gpa = if count > 0 { total / (count as f64) } else { 0.0 };
    GpaSummary {
        gpa,
        graded_subjects: count,
    }
}
