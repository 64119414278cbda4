use guardian::picker::{ChoiceSet, PickerMode, PickerRequest, PickerResponse};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn customers() -> ChoiceSet {
    let mut set = ChoiceSet::new("Seleção de Cliente");
    set.push("42", "42 - Cliente Teste", Vec::new());
    set.push("43", "43 - Outro Cliente", Vec::new());
    set.push("44", "44 - Terceiro", Vec::new());
    set
}

fn pick(mode: &str, request: &Path, answer: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_guardian-picker"))
        .args([mode, "--request"])
        .arg(request)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(answer.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn response(output: &Output) -> PickerResponse {
    PickerResponse::parse(&String::from_utf8_lossy(&output.stdout)).unwrap()
}

#[test]
fn single_select_returns_the_chosen_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("request.json");
    PickerRequest::new(PickerMode::Single, &customers())
        .write(&path)
        .unwrap();

    let output = pick("single", &path, "2\n");

    assert!(output.status.success());
    assert_eq!(
        response(&output),
        PickerResponse::Selected {
            codes: vec!["43".to_string()]
        }
    );
}

#[test]
fn single_select_defaults_to_the_first_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("request.json");
    PickerRequest::new(PickerMode::Single, &customers())
        .write(&path)
        .unwrap();

    let output = pick("single", &path, "\n");

    assert_eq!(
        response(&output),
        PickerResponse::Selected {
            codes: vec!["42".to_string()]
        }
    );
}

#[test]
fn invalid_answers_are_asked_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("request.json");
    PickerRequest::new(PickerMode::Single, &customers())
        .write(&path)
        .unwrap();

    let output = pick("single", &path, "9\nabc\n3\n");

    assert_eq!(
        response(&output),
        PickerResponse::Selected {
            codes: vec!["44".to_string()]
        }
    );
}

#[test]
fn multi_select_accepts_ranges() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("request.json");
    let choices = customers().with_headers(["Selecionar", "Código", "Cliente"]);
    PickerRequest::new(PickerMode::Multi, &choices)
        .write(&path)
        .unwrap();

    let output = pick("multi", &path, "1,2-3\n");

    assert!(output.status.success());
    assert_eq!(
        response(&output),
        PickerResponse::Selected {
            codes: vec!["42".to_string(), "43".to_string(), "44".to_string()]
        }
    );
}

#[test]
fn quitting_or_closing_input_cancels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("request.json");
    PickerRequest::new(PickerMode::Multi, &customers())
        .write(&path)
        .unwrap();

    let quit = pick("multi", &path, "q\n");
    assert!(quit.status.success());
    assert_eq!(response(&quit), PickerResponse::Cancelled);

    let closed = pick("multi", &path, "");
    assert!(closed.status.success());
    assert_eq!(response(&closed), PickerResponse::Cancelled);
}

#[test]
fn unreadable_request_exits_with_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");

    let output = pick("single", &path, "");

    assert_eq!(output.status.code(), Some(1));
    assert!(matches!(response(&output), PickerResponse::Error { .. }));
}

#[test]
fn newer_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("request.json");
    std::fs::write(
        &path,
        r#"{"schema_version": 2, "mode": "single", "title": "x", "items": []}"#,
    )
    .unwrap();

    let output = pick("single", &path, "");

    assert_eq!(output.status.code(), Some(1));
}
