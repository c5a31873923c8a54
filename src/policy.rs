use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::SisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Administrator,
    Teacher,
    FinancialOfficer,
    Registrar,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::Teacher => "Teacher",
            Role::FinancialOfficer => "FinancialOfficer",
            Role::Registrar => "Registrar",
            Role::Student => "Student",
        }
    }
}

impl FromStr for Role {
    type Err = SisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "administrator" | "admin" => Ok(Role::Administrator),
            "teacher" => Ok(Role::Teacher),
            "financialofficer" => Ok(Role::FinancialOfficer),
            "registrar" => Ok(Role::Registrar),
            "student" => Ok(Role::Student),
            _ => Err(SisError::InvalidActor(format!("unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity a decision is evaluated for. Owns no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    role: Role,
    department: Option<String>,
    associated_id: Option<i64>,
}

impl Actor {
    /// A Student actor must carry the student id it speaks for. An empty
    /// department string is the same as no department.
    pub fn new(role: Role, department: Option<String>, associated_id: Option<i64>) -> Result<Actor, SisError> {
        if role == Role::Student && associated_id.is_none() {
            return Err(SisError::InvalidActor(
                "a Student actor requires an associated student id".to_string(),
            ));
        }
        Ok(Actor {
            role,
            department: department.filter(|d| !d.is_empty()),
            associated_id,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn department(&self) -> Option<&str> {
        self.department.as_deref()
    }

    pub fn associated_id(&self) -> Option<i64> {
        self.associated_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ManageUsers,
    ManageStudents,
    ManageTeachers,
    ManageCourses,
    ManageFees,
    ManageGrades,
    ManageAttendance,
    ViewStudent,
    ViewTeacher,
    ViewCourse,
    ViewGrades,
    ViewAttendance,
    ViewFees,
    GenerateReports,
    ViewReports,
    GenerateTranscripts,
}

impl Operation {
    pub const ALL: [Operation; 16] = [
        Operation::ManageUsers,
        Operation::ManageStudents,
        Operation::ManageTeachers,
        Operation::ManageCourses,
        Operation::ManageFees,
        Operation::ManageGrades,
        Operation::ManageAttendance,
        Operation::ViewStudent,
        Operation::ViewTeacher,
        Operation::ViewCourse,
        Operation::ViewGrades,
        Operation::ViewAttendance,
        Operation::ViewFees,
        Operation::GenerateReports,
        Operation::ViewReports,
        Operation::GenerateTranscripts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::ManageUsers => "manage_users",
            Operation::ManageStudents => "manage_students",
            Operation::ManageTeachers => "manage_teachers",
            Operation::ManageCourses => "manage_courses",
            Operation::ManageFees => "manage_fees",
            Operation::ManageGrades => "manage_grades",
            Operation::ManageAttendance => "manage_attendance",
            Operation::ViewStudent => "view_student",
            Operation::ViewTeacher => "view_teacher",
            Operation::ViewCourse => "view_course",
            Operation::ViewGrades => "view_grades",
            Operation::ViewAttendance => "view_attendance",
            Operation::ViewFees => "view_fees",
            Operation::GenerateReports => "generate_reports",
            Operation::ViewReports => "view_reports",
            Operation::GenerateTranscripts => "generate_transcripts",
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Operation::ManageUsers
                | Operation::ManageStudents
                | Operation::ManageTeachers
                | Operation::ManageCourses
                | Operation::ManageFees
                | Operation::ManageGrades
                | Operation::ManageAttendance
        )
    }
}

impl FromStr for Operation {
    type Err = SisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| SisError::UnknownOperation(s.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Student,
    Teacher,
    Course,
}

impl ResourceKind {
    pub fn parse(s: &str) -> Option<ResourceKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Some(ResourceKind::Student),
            "teacher" => Some(ResourceKind::Teacher),
            "course" => Some(ResourceKind::Course),
            _ => None,
        }
    }
}

/// Facts about a resource fetched from the directory before a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttrs {
    pub kind: ResourceKind,
    pub department: Option<String>,
    pub owner_id: Option<i64>,
}

impl ResourceAttrs {
    pub fn student(owner_id: i64, department: Option<String>) -> Self {
        ResourceAttrs {
            kind: ResourceKind::Student,
            department,
            owner_id: Some(owner_id),
        }
    }

    pub fn teacher(department: Option<String>) -> Self {
        ResourceAttrs {
            kind: ResourceKind::Teacher,
            department,
            owner_id: None,
        }
    }

    pub fn course(department: Option<String>) -> Self {
        ResourceAttrs {
            kind: ResourceKind::Course,
            department,
            owner_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

fn same_department(actor: &Actor, resource: Option<&ResourceAttrs>) -> bool {
    match (actor.department(), resource.and_then(|r| r.department.as_deref())) {
        (Some(mine), Some(theirs)) => mine == theirs,
        _ => false,
    }
}

fn is_self(actor: &Actor, resource: Option<&ResourceAttrs>) -> bool {
    match (actor.associated_id(), resource) {
        (Some(me), Some(r)) => r.kind == ResourceKind::Student && r.owner_id == Some(me),
        _ => false,
    }
}

fn is_any_student(resource: Option<&ResourceAttrs>) -> bool {
    resource.map(|r| r.kind == ResourceKind::Student).unwrap_or(true)
}

fn allows(actor: &Actor, op: Operation, resource: Option<&ResourceAttrs>) -> bool {
    use Operation::*;

    if op == ViewReports {
        return match resource {
            None => true,
            Some(_) => allows(actor, ViewStudent, resource),
        };
    }

    match actor.role() {
        Role::Administrator => true,
        Role::FinancialOfficer => match op {
            ManageFees | ViewFees | ViewStudent => is_any_student(resource),
            GenerateReports => true,
            _ => false,
        },
        Role::Registrar => {
            matches!(
                op,
                ManageStudents
                    | ManageTeachers
                    | ManageCourses
                    | ViewStudent
                    | ViewTeacher
                    | ViewCourse
                    | ViewGrades
                    | ViewAttendance
                    | ViewFees
                    | GenerateReports
                    | GenerateTranscripts
            ) && same_department(actor, resource)
        }
        Role::Teacher => {
            matches!(
                op,
                ManageCourses
                    | ManageGrades
                    | ManageAttendance
                    | ViewStudent
                    | ViewTeacher
                    | ViewCourse
                    | ViewGrades
                    | ViewAttendance
                    | GenerateReports
            ) && same_department(actor, resource)
        }
        Role::Student => {
            matches!(op, ViewStudent | ViewGrades | ViewAttendance | ViewFees)
                && is_self(actor, resource)
        }
    }
}

/// Pure access decision. Allows when any rule for the actor's role matches.
pub fn decide(actor: &Actor, op: Operation, resource: Option<&ResourceAttrs>) -> Decision {
    let decision = if allows(actor, op, resource) {
        Decision::Allow
    } else {
        Decision::Deny
    };
    debug!(
        role = %actor.role(),
        operation = %op,
        resource = ?resource.map(|r| r.kind),
        ?decision,
        "access decision"
    );
    if decision == Decision::Deny && op.is_mutation() {
        warn!(role = %actor.role(), operation = %op, "mutation denied");
    }
    decision
}

/// Decides on an operation given by wire name. Unknown names are a caller
/// bug: they are logged and denied.
pub fn decide_named(actor: &Actor, op: &str, resource: Option<&ResourceAttrs>) -> Decision {
    match op.parse::<Operation>() {
        Ok(op) => decide(actor, op, resource),
        Err(_) => {
            warn!(operation = op, "unknown operation requested; denying");
            Decision::Deny
        }
    }
}

pub fn require(actor: &Actor, op: Operation, resource: Option<&ResourceAttrs>) -> Result<(), SisError> {
    match decide(actor, op, resource) {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(SisError::AccessDenied { operation: op }),
    }
}
