use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracing::warn;

use crate::grading::{Assessment, Category};
use crate::record::AcademicRecord;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("sis.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            username TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL,
            department TEXT,
            associated_id INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            roll_number TEXT NOT NULL,
            department TEXT NOT NULL,
            gender TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_department ON students(department)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            specialization TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            department TEXT NOT NULL,
            credit_hours INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            course_id INTEGER NOT NULL,
            teacher_id INTEGER,
            credit_hours INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_course ON subjects(course_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            seq INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            subject_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            title TEXT NOT NULL,
            score REAL NOT NULL,
            max_score REAL NOT NULL,
            semester TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            remark TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            UNIQUE(student_id, seq)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id, seq)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    seed_default_users(&conn)?;
    Ok(conn)
}

/// Accounts every fresh workspace starts with. Existing rows are left alone.
fn seed_default_users(conn: &Connection) -> anyhow::Result<()> {
    let defaults: [(&str, &str, &str, Option<&str>); 4] = [
        ("admin", "Administrator", "Administrator", None),
        ("teacher", "Default Teacher", "Teacher", Some("Computer Science")),
        ("finance", "Financial Officer", "FinancialOfficer", None),
        ("registrar", "Registrar", "Registrar", None),
    ];
    for (username, full_name, role, department) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO users(username, full_name, role, department, associated_id)
             VALUES(?, ?, ?, ?, NULL)",
            (username, full_name, role, department),
        )?;
    }
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub department: Option<String>,
    pub associated_id: Option<i64>,
}

fn user_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        username: r.get(0)?,
        full_name: r.get(1)?,
        role: r.get(2)?,
        department: r.get(3)?,
        associated_id: r.get(4)?,
    })
}

pub fn find_user(conn: &Connection, username: &str) -> rusqlite::Result<Option<UserRow>> {
    conn.query_row(
        "SELECT username, full_name, role, department, associated_id
         FROM users WHERE username = ?",
        [username],
        user_from_row,
    )
    .optional()
}

pub fn list_users(conn: &Connection) -> rusqlite::Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT username, full_name, role, department, associated_id
         FROM users ORDER BY username",
    )?;
    let rows = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_user(conn: &Connection, user: &UserRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users(username, full_name, role, department, associated_id)
         VALUES(?, ?, ?, ?, ?)",
        (
            &user.username,
            &user.full_name,
            &user.role,
            &user.department,
            user.associated_id,
        ),
    )?;
    Ok(())
}

/// Persists one assessment at the end of the student's sequence.
pub fn insert_grade(conn: &Connection, a: &Assessment) -> rusqlite::Result<()> {
    let seq: i64 = conn.query_row(
        "SELECT COALESCE(MAX(seq), -1) + 1 FROM grades WHERE student_id = ?",
        [a.student_id],
        |r| r.get(0),
    )?;
    let stamp = a.recorded_at.to_rfc3339();
    conn.execute(
        "INSERT INTO grades(
            id, seq, student_id, subject_id, category, title, score, max_score,
            semester, recorded_at, updated_at, remark
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            a.id,
            seq,
            a.student_id,
            a.subject_id,
            a.category.as_str(),
            a.title,
            a.score,
            a.max_score,
            a.semester,
            stamp,
            stamp,
            a.remark,
        ],
    )?;
    Ok(())
}

/// Returns false when no grade with that id belongs to the student.
pub fn update_grade_remark(
    conn: &Connection,
    student_id: i64,
    grade_id: &str,
    remark: &str,
    at: DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE grades SET remark = ?, updated_at = ? WHERE id = ? AND student_id = ?",
        (remark, at.to_rfc3339(), grade_id, student_id),
    )?;
    Ok(changed > 0)
}

fn parse_stamp(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

/// Rebuilds a student's record from the stored sequence, replaying inserts in order.
pub fn load_record(conn: &Connection, student_id: i64) -> rusqlite::Result<AcademicRecord> {
    let mut stmt = conn.prepare(
        "SELECT id, subject_id, category, title, score, max_score, semester,
                recorded_at, updated_at, remark
         FROM grades
         WHERE student_id = ?
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            let category_raw: String = r.get(2)?;
            let category = category_raw.parse::<Category>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?;
            let recorded_at: String = r.get(7)?;
            let updated_at: String = r.get(8)?;
            Ok((
                Assessment {
                    id: r.get(0)?,
                    student_id,
                    subject_id: r.get(1)?,
                    category,
                    title: r.get(3)?,
                    score: r.get(4)?,
                    max_score: r.get(5)?,
                    semester: r.get(6)?,
                    recorded_at: parse_stamp(&recorded_at)?,
                    remark: r.get(9)?,
                },
                parse_stamp(&updated_at)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut record = AcademicRecord::new(student_id);
    for (assessment, at) in rows {
        let grade_id = assessment.id.clone();
        if let Err(e) = record.add_grade(assessment, at) {
            warn!(student_id, grade_id = %grade_id, error = %e, "stored grade skipped");
        }
    }
    Ok(record)
}
