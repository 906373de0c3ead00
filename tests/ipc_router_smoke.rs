use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
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
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

#[test]
fn health_reports_version_and_course_count() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["version"], json!(env!("CARGO_PKG_VERSION")));
    assert_eq!(health["courseCount"], json!(0));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.upsert",
        json!({ "code": "CS101", "name": "Intro", "credits": 3 }),
    );
    let health = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert_eq!(health["courseCount"], json!(1));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn every_method_family_answers() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let cases: &[(&str, serde_json::Value)] = &[
        ("courses.list", json!({})),
        ("weights.list", json!({})),
        ("scores.list", json!({})),
        ("quizzes.list", json!({})),
        ("attempts.list", json!({})),
        ("transcript.list", json!({ "studentId": "s1" })),
        ("transcript.gpa", json!({ "studentId": "s1" })),
        ("settings.letterScale.get", json!({})),
    ];
    for (i, (method, params)) in cases.iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            method,
            params.clone(),
        );
    }

    let scale = request_ok(
        &mut stdin,
        &mut reader,
        "scale",
        "settings.letterScale.get",
        json!({}),
    );
    assert_eq!(scale["isDefault"], json!(true));
    assert_eq!(scale["scale"]["floorLetter"], json!("F"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unknown_method_and_missing_params_are_errors() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let unknown = request(&mut stdin, &mut reader, "1", "grades.curve", json!({}));
    assert_eq!(unknown["ok"], json!(false));
    assert_eq!(error_code(&unknown), "not_implemented");

    let missing = request(&mut stdin, &mut reader, "2", "grades.course", json!({ "studentId": "s1" }));
    assert_eq!(error_code(&missing), "bad_params");

    let blank = request(
        &mut stdin,
        &mut reader,
        "3",
        "grades.course",
        json!({ "studentId": "  ", "courseId": "c1" }),
    );
    assert_eq!(error_code(&blank), "bad_params");

    let no_weights = request(
        &mut stdin,
        &mut reader,
        "4",
        "grades.course",
        json!({ "studentId": "s1", "courseId": "c1" }),
    );
    assert_eq!(error_code(&no_weights), "weights_not_found");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_line_gets_bad_json_and_loop_continues() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
    assert_eq!(value["ok"], json!(false));
    assert_eq!(error_code(&value), "bad_json");

    // Blank lines are skipped without a response.
    writeln!(stdin).expect("write blank line");
    let health = request_ok(&mut stdin, &mut reader, "after", "health", json!({}));
    assert!(health.get("version").is_some());

    drop(stdin);
    let _ = child.wait();
}
