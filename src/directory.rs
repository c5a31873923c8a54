use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::error::SisError;
use crate::policy::{ResourceAttrs, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: i64,
    pub name: String,
    pub roll_number: String,
    pub department: String,
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRow {
    pub id: i64,
    pub name: String,
    pub department: String,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRow {
    pub id: i64,
    pub name: String,
    pub department: String,
    pub credit_hours: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRow {
    pub id: i64,
    pub name: String,
    pub course_id: i64,
    pub teacher_id: Option<i64>,
    pub credit_hours: i64,
}

/// Lookup of people and catalog entries by stable id. The access policy
/// never calls this; handlers resolve resource facts through it first.
pub trait Directory {
    fn student(&self, id: i64) -> Result<Option<StudentRow>, SisError>;
    fn teacher(&self, id: i64) -> Result<Option<TeacherRow>, SisError>;
    fn course(&self, id: i64) -> Result<Option<CourseRow>, SisError>;
    fn subject(&self, id: i64) -> Result<Option<SubjectRow>, SisError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    Student(i64),
    Teacher(i64),
    Course(i64),
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: i64) -> Self {
        match kind {
            ResourceKind::Student => ResourceRef::Student(id),
            ResourceKind::Teacher => ResourceRef::Teacher(id),
            ResourceKind::Course => ResourceRef::Course(id),
        }
    }
}

/// Fetches the attributes a decision needs. A missing row yields attributes
/// without a department, which department-scoped rules treat as a denial.
/// Student identity comes from the requested id, not the row, so self-scope
/// never depends on whether the row exists.
pub fn resolve<D: Directory + ?Sized>(dir: &D, resource: ResourceRef) -> Result<ResourceAttrs, SisError> {
    Ok(match resource {
        ResourceRef::Student(id) => {
            ResourceAttrs::student(id, dir.student(id)?.map(|s| s.department))
        }
        ResourceRef::Teacher(id) => ResourceAttrs::teacher(dir.teacher(id)?.map(|t| t.department)),
        ResourceRef::Course(id) => ResourceAttrs::course(dir.course(id)?.map(|c| c.department)),
    })
}

pub struct SqliteDirectory<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteDirectory<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn list_students(&self) -> Result<Vec<StudentRow>, SisError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, roll_number, department, gender FROM students ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_teachers(&self) -> Result<Vec<TeacherRow>, SisError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, department, specialization FROM teachers ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], teacher_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_courses(&self) -> Result<Vec<CourseRow>, SisError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, department, credit_hours FROM courses ORDER BY id")?;
        let rows = stmt
            .query_map([], course_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_subjects(&self, course_id: Option<i64>) -> Result<Vec<SubjectRow>, SisError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, course_id, teacher_id, credit_hours
             FROM subjects
             WHERE ?1 IS NULL OR course_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map([course_id], subject_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Inserts with the caller's id, or lets SQLite pick one. Returns the id.
    pub fn insert_student(
        &self,
        id: Option<i64>,
        name: &str,
        roll_number: &str,
        department: &str,
        gender: Option<&str>,
    ) -> Result<i64, SisError> {
        self.conn.execute(
            "INSERT INTO students(id, name, roll_number, department, gender) VALUES(?, ?, ?, ?, ?)",
            (id, name, roll_number, department, gender),
        )?;
        Ok(id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    pub fn insert_teacher(
        &self,
        id: Option<i64>,
        name: &str,
        department: &str,
        specialization: Option<&str>,
    ) -> Result<i64, SisError> {
        self.conn.execute(
            "INSERT INTO teachers(id, name, department, specialization) VALUES(?, ?, ?, ?)",
            (id, name, department, specialization),
        )?;
        Ok(id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    pub fn insert_course(
        &self,
        id: Option<i64>,
        name: &str,
        department: &str,
        credit_hours: i64,
    ) -> Result<i64, SisError> {
        self.conn.execute(
            "INSERT INTO courses(id, name, department, credit_hours) VALUES(?, ?, ?, ?)",
            (id, name, department, credit_hours),
        )?;
        Ok(id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    pub fn insert_subject(
        &self,
        id: Option<i64>,
        name: &str,
        course_id: i64,
        teacher_id: Option<i64>,
        credit_hours: i64,
    ) -> Result<i64, SisError> {
        self.conn.execute(
            "INSERT INTO subjects(id, name, course_id, teacher_id, credit_hours) VALUES(?, ?, ?, ?, ?)",
            (id, name, course_id, teacher_id, credit_hours),
        )?;
        Ok(id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }
}

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        id: r.get(0)?,
        name: r.get(1)?,
        roll_number: r.get(2)?,
        department: r.get(3)?,
        gender: r.get(4)?,
    })
}

fn teacher_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<TeacherRow> {
    Ok(TeacherRow {
        id: r.get(0)?,
        name: r.get(1)?,
        department: r.get(2)?,
        specialization: r.get(3)?,
    })
}

fn course_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<CourseRow> {
    Ok(CourseRow {
        id: r.get(0)?,
        name: r.get(1)?,
        department: r.get(2)?,
        credit_hours: r.get(3)?,
    })
}

fn subject_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<SubjectRow> {
    Ok(SubjectRow {
        id: r.get(0)?,
        name: r.get(1)?,
        course_id: r.get(2)?,
        teacher_id: r.get(3)?,
        credit_hours: r.get(4)?,
    })
}

impl Directory for SqliteDirectory<'_> {
    fn student(&self, id: i64) -> Result<Option<StudentRow>, SisError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, roll_number, department, gender FROM students WHERE id = ?",
                [id],
                student_from_row,
            )
            .optional()?)
    }

    fn teacher(&self, id: i64) -> Result<Option<TeacherRow>, SisError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, department, specialization FROM teachers WHERE id = ?",
                [id],
                teacher_from_row,
            )
            .optional()?)
    }

    fn course(&self, id: i64) -> Result<Option<CourseRow>, SisError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, department, credit_hours FROM courses WHERE id = ?",
                [id],
                course_from_row,
            )
            .optional()?)
    }

    fn subject(&self, id: i64) -> Result<Option<SubjectRow>, SisError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, course_id, teacher_id, credit_hours FROM subjects WHERE id = ?",
                [id],
                subject_from_row,
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{decide, Actor, Operation, Role};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapDirectory {
        students: HashMap<i64, StudentRow>,
    }

    impl Directory for MapDirectory {
        fn student(&self, id: i64) -> Result<Option<StudentRow>, SisError> {
            Ok(self.students.get(&id).cloned())
        }
        fn teacher(&self, _id: i64) -> Result<Option<TeacherRow>, SisError> {
            Ok(None)
        }
        fn course(&self, _id: i64) -> Result<Option<CourseRow>, SisError> {
            Ok(None)
        }
        fn subject(&self, _id: i64) -> Result<Option<SubjectRow>, SisError> {
            Ok(None)
        }
    }

    fn with_student(id: i64, department: &str) -> MapDirectory {
        let mut dir = MapDirectory::default();
        dir.students.insert(
            id,
            StudentRow {
                id,
                name: "Ada".to_string(),
                roll_number: "R1".to_string(),
                department: department.to_string(),
                gender: None,
            },
        );
        dir
    }

    #[test]
    fn resolve_student_carries_department_and_identity() {
        let dir = with_student(4, "CS");
        let attrs = resolve(&dir, ResourceRef::Student(4)).expect("resolve");
        assert_eq!(attrs.department.as_deref(), Some("CS"));
        assert_eq!(attrs.owner_id, Some(4));
    }

    #[test]
    fn missing_and_foreign_rows_deny_alike_for_scoped_roles() {
        let dir = with_student(4, "EE");
        let teacher = Actor::new(Role::Teacher, Some("CS".into()), None).expect("actor");
        let missing = resolve(&dir, ResourceRef::Student(99)).expect("resolve");
        let foreign = resolve(&dir, ResourceRef::Student(4)).expect("resolve");
        assert_eq!(decide(&teacher, Operation::ViewGrades, Some(&missing)), decide(&teacher, Operation::ViewGrades, Some(&foreign)));
        assert!(!decide(&teacher, Operation::ViewGrades, Some(&missing)).is_allowed());
    }

    #[test]
    fn sqlite_directory_inserts_and_resolves() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let conn = crate::db::open_db(tmp.path()).expect("open");
        let dir = SqliteDirectory::new(&conn);
        let cid = dir.insert_course(None, "BSc Computing", "CS", 120).expect("course");
        let sid = dir.insert_subject(Some(30), "Algorithms", cid, None, 4).expect("subject");
        assert_eq!(sid, 30);
        dir.insert_student(Some(7), "Ada", "R-7", "CS", Some("female")).expect("student");

        let attrs = resolve(&dir, ResourceRef::Course(cid)).expect("resolve");
        assert_eq!(attrs.department.as_deref(), Some("CS"));
        assert_eq!(dir.subject(30).expect("query").map(|s| s.course_id), Some(cid));
        assert_eq!(dir.list_subjects(Some(cid)).expect("list").len(), 1);
        assert_eq!(dir.list_subjects(Some(cid + 1)).expect("list").len(), 0);
        assert_eq!(dir.list_students().expect("list")[0].roll_number, "R-7");
    }
}
