use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_sisd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn sisd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn read_line(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let value = read_line(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(json!({}))
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let login = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.login",
        json!({ "username": "admin" }),
    );
    assert_eq!(login["actor"]["role"], json!("Administrator"));

    let course = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "courses.create",
        json!({ "name": "BSc Computing", "department": "Computer Science", "creditHours": 120 }),
    );
    let course_id = course["courseId"].as_i64().expect("courseId");
    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "teachers.create",
        json!({ "name": "Grace Hopper", "department": "Computer Science" }),
    );
    let teacher_id = teacher["teacherId"].as_i64().expect("teacherId");
    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "subjects.create",
        json!({ "name": "Algorithms", "courseId": course_id, "teacherId": teacher_id, "creditHours": 3 }),
    );
    let subject_id = subject["subjectId"].as_i64().expect("subjectId");
    request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.create",
        json!({ "id": 7, "name": "Ada Byron", "rollNumber": "CS-007", "department": "Computer Science" }),
    );

    let _ = request_ok(&mut stdin, &mut reader, "8", "students.list", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "9", "students.get", json!({ "studentId": 7 }));
    let _ = request_ok(&mut stdin, &mut reader, "10", "teachers.list", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "11", "teachers.get", json!({ "teacherId": teacher_id }));
    let _ = request_ok(&mut stdin, &mut reader, "12", "courses.list", json!({}));
    let got = request_ok(&mut stdin, &mut reader, "13", "courses.get", json!({ "courseId": course_id }));
    assert_eq!(got["subjects"].as_array().map(|a| a.len()), Some(1));
    let _ = request_ok(&mut stdin, &mut reader, "14", "subjects.list", json!({ "courseId": course_id }));

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "grades.add",
        json!({
            "studentId": 7,
            "subjectId": subject_id,
            "category": "Quiz",
            "score": 18,
            "maxScore": 20,
            "semester": "Fall 2024",
        }),
    );
    let grade_id = added["gradeId"].as_str().expect("gradeId").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "grades.updateRemark",
        json!({ "studentId": 7, "gradeId": grade_id, "remark": "late submission" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "17", "grades.list", json!({ "studentId": 7 }));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "grades.subject",
        json!({ "studentId": 7, "subjectId": subject_id, "semester": "Fall 2024" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "grades.semesterGpa",
        json!({ "studentId": 7, "semester": "Fall 2024" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "20", "grades.cumulativeGpa", json!({ "studentId": 7 }));
    let _ = request_ok(&mut stdin, &mut reader, "21", "transcript.generate", json!({ "studentId": 7 }));
    let _ = request_ok(&mut stdin, &mut reader, "22", "reports.standing", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "23",
        "access.check",
        json!({ "operation": "manage_grades", "resource": { "kind": "student", "id": 7 } }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "24", "settings.get", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "25", "users.list", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "26", "session.whoami", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "27", "session.logout", json!({}));

    writeln!(stdin, r#"{{"id":"28","method":"does.not.exist","params":{{}}}}"#).expect("write");
    stdin.flush().expect("flush");
    let unknown = read_line(&mut reader);
    assert_eq!(unknown["ok"], json!(false));
    assert_eq!(unknown["error"]["code"], json!("not_implemented"));

    writeln!(stdin, "this is not json").expect("write");
    stdin.flush().expect("flush");
    let bad = read_line(&mut reader);
    assert_eq!(bad["ok"], json!(false));
    assert_eq!(bad["error"]["code"], json!("bad_json"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn requests_before_workspace_or_login_are_rejected() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let no_ws = request(
        &mut stdin,
        &mut reader,
        "1",
        "session.login",
        json!({ "username": "admin" }),
    );
    assert_eq!(no_ws["error"]["code"], json!("no_workspace"));

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let no_session = request(&mut stdin, &mut reader, "3", "students.list", json!({}));
    assert_eq!(no_session["error"]["code"], json!("no_session"));

    let unknown_user = request(
        &mut stdin,
        &mut reader,
        "4",
        "session.login",
        json!({ "username": "nobody" }),
    );
    assert_eq!(unknown_user["error"]["code"], json!("unknown_user"));

    drop(stdin);
    let _ = child.wait();
}
