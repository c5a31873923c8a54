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

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
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

fn add(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    subject_id: i64,
    category: &str,
    score: f64,
    semester: &str,
) {
    request_ok(
        stdin,
        reader,
        id,
        "grades.add",
        json!({
            "studentId": 7,
            "subjectId": subject_id,
            "category": category,
            "score": score,
            "maxScore": 100,
            "semester": semester,
        }),
    );
}

#[test]
fn transcript_text_is_stable_and_complete() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": workspace.path().to_string_lossy() }));
    request_ok(&mut stdin, &mut reader, "2", "session.login", json!({ "username": "admin" }));
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "settings.update",
        json!({ "section": "transcript", "patch": { "institution": "Northfield College" } }),
    );
    let course_id = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "courses.create",
        json!({ "name": "BSc Computing", "department": "Computer Science" }),
    )["courseId"]
        .as_i64()
        .expect("courseId");
    let databases = request_ok(&mut stdin, &mut reader, "5", "subjects.create", json!({ "name": "Databases", "courseId": course_id }))
        ["subjectId"]
        .as_i64()
        .expect("subjectId");
    let algorithms = request_ok(&mut stdin, &mut reader, "6", "subjects.create", json!({ "name": "Algorithms", "courseId": course_id }))
        ["subjectId"]
        .as_i64()
        .expect("subjectId");
    request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.create",
        json!({ "id": 7, "name": "Ada Byron", "rollNumber": "CS-007", "department": "Computer Science" }),
    );

    add(&mut stdin, &mut reader, "8", databases, "Quiz", 90.0, "Fall 2024");
    add(&mut stdin, &mut reader, "9", databases, "Assignment", 85.0, "Fall 2024");
    add(&mut stdin, &mut reader, "10", databases, "Midterm", 70.0, "Fall 2024");
    add(&mut stdin, &mut reader, "11", databases, "Final", 95.0, "Fall 2024");
    add(&mut stdin, &mut reader, "12", algorithms, "Final", 95.0, "Spring 2025");

    let first = request_ok(&mut stdin, &mut reader, "13", "transcript.generate", json!({ "studentId": 7 }));
    let second = request_ok(&mut stdin, &mut reader, "14", "transcript.generate", json!({ "studentId": 7 }));
    assert_eq!(first["text"], second["text"]);

    let text = first["text"].as_str().expect("text");
    assert!(text.starts_with("Northfield College\nACADEMIC TRANSCRIPT\n"), "{}", text);
    assert!(text.contains("Student: Ada Byron\n"));
    assert!(text.contains("ID: 7\n"));
    assert!(text.contains("Department: Computer Science\n"));
    assert!(text.contains("Cumulative GPA: 3.50\n"));
    assert!(text.contains("SEMESTER: Fall 2024\nGPA: 3.00\nCourses:\n  - Databases: B (85.25%)\n"));
    assert!(text.contains("SEMESTER: Spring 2025\nGPA: 4.00\nCourses:\n  - Algorithms: A (95.00%)\n"));
    let fall_at = text.find("SEMESTER: Fall 2024").expect("fall");
    let spring_at = text.find("SEMESTER: Spring 2025").expect("spring");
    assert!(fall_at < spring_at);
    assert!(text.contains("Last Updated: "));
    assert!(!text.contains("Last Updated: never"));

    let model = &first["model"];
    assert_eq!(model["studentId"], json!(7));
    assert_eq!(model["gradedSubjects"], json!(2));
    assert_eq!(model["semesters"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(model["semesters"][0]["courses"][0]["letter"], json!("B"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn empty_record_renders_header_only() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": workspace.path().to_string_lossy() }));
    request_ok(&mut stdin, &mut reader, "2", "session.login", json!({ "username": "admin" }));
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "id": 3, "name": "Alan Turing", "rollNumber": "CS-003", "department": "Computer Science" }),
    );

    let out = request_ok(&mut stdin, &mut reader, "4", "transcript.generate", json!({ "studentId": 3 }));
    let text = out["text"].as_str().expect("text");
    assert!(text.starts_with("Student Information System\n"));
    assert!(text.contains("Cumulative GPA: 0.00\n"));
    assert!(!text.contains("SEMESTER:"));
    assert!(text.ends_with("Last Updated: never"));

    let missing = request(&mut stdin, &mut reader, "5", "transcript.generate", json!({ "studentId": 404 }));
    assert_eq!(missing["error"]["code"], json!("not_found"));

    drop(stdin);
    let _ = child.wait();
}
