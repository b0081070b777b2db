use std::fs;
use std::path::Path;
use std::process::Command;

fn run_svars(args: &[&str]) -> std::process::Output {
    let bin = env!("CARGO_BIN_EXE_svars");
    Command::new(bin)
        .args(args)
        .output()
        .expect("svars command should run")
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn line_value<'a>(stdout: &'a str, prefix: &str) -> Option<&'a str> {
    stdout.lines().find_map(|line| line.strip_prefix(prefix))
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("path should be utf-8")
}

#[test]
fn init_apply_resolve_flow_round_trips_through_state_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state_dir = path_str(dir.path());
    let config = dir.path().join("alice.json");
    fs::write(
        &config,
        r#"{
            "variables": [
                {"name": "goodwill", "type": "number", "value": 10},
                {"name": "secret", "type": "string", "value": "真心话",
                 "visibility": {"kind": "expr", "expr": "goodwill >= 80"}}
            ]
        }"#,
    )
    .expect("config should be written");

    let init = run_svars(&[
        "init",
        "--state-dir",
        state_dir,
        "--character",
        "alice",
        "--config",
        path_str(&config),
    ]);
    assert!(init.status.success(), "init failed: {}", stdout_of(&init));
    let init_stdout = stdout_of(&init);
    assert!(init_stdout.contains("RESULT:OK"));
    assert_eq!(line_value(&init_stdout, "SCOPE:"), Some("character:alice"));
    assert_eq!(line_value(&init_stdout, "VARIABLES:"), Some("2"));

    let hidden = run_svars(&[
        "resolve",
        "--state-dir",
        state_dir,
        "--character",
        "alice",
        "--text",
        "[${secret}]",
    ]);
    assert_eq!(line_value(&stdout_of(&hidden), "TEXT_JSON:"), Some("\"[]\""));

    let apply = run_svars(&[
        "apply",
        "--state-dir",
        state_dir,
        "--character",
        "alice",
        "--strip",
        "--text",
        r#"她笑了。<setVar name="goodwill" value="85">好感提升</setVar><setVar name="x" value=>bad</setVar>"#,
    ]);
    assert!(apply.status.success(), "apply failed");
    let apply_stdout = stdout_of(&apply);
    assert_eq!(line_value(&apply_stdout, "APPLIED:"), Some("1"));
    assert_eq!(line_value(&apply_stdout, "TOUCHED:"), Some("character:alice"));
    assert!(line_value(&apply_stdout, "COMMAND_ERROR:")
        .is_some_and(|value| value.starts_with("MALFORMED_LITERAL|")));
    assert!(line_value(&apply_stdout, "TEXT_JSON:").is_some_and(|value| value.contains("她笑了。")));

    let visible = run_svars(&[
        "resolve",
        "--state-dir",
        state_dir,
        "--character",
        "alice",
        "--text",
        "[${secret}]",
    ]);
    assert_eq!(
        line_value(&stdout_of(&visible), "TEXT_JSON:"),
        Some("\"[真心话]\"")
    );

    let show = run_svars(&[
        "show",
        "--state-dir",
        state_dir,
        "--character",
        "alice",
        "--path",
        "goodwill",
    ]);
    assert_eq!(line_value(&stdout_of(&show), "VALUE_JSON:"), Some("85"));
}

#[test]
fn missing_character_state_reports_error_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = run_svars(&[
        "show",
        "--state-dir",
        path_str(dir.path()),
        "--character",
        "ghost",
    ]);
    assert!(!output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("RESULT:ERROR"));
    assert_eq!(line_value(&stdout, "ERROR_CODE:"), Some("UNKNOWN_SCOPE"));
    assert!(line_value(&stdout, "ERROR_MSG_JSON:").is_some());
}

#[test]
fn global_todo_list_is_created_on_first_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state_dir = path_str(dir.path());
    let apply = run_svars(&[
        "apply",
        "--state-dir",
        state_dir,
        "--text",
        r#"<setVar name="ToDoList.chapterList.0" value="第一章"/>"#,
    ]);
    assert!(apply.status.success());
    assert_eq!(line_value(&stdout_of(&apply), "TOUCHED:"), Some("global"));

    let show = run_svars(&["show", "--state-dir", state_dir]);
    let stdout = stdout_of(&show);
    let todo = line_value(&stdout, "VARIABLE:ToDoList|").expect("ToDoList listed");
    assert!(todo.starts_with("object|"));
    assert!(todo.contains(r#""chapterList":["第一章"]"#));
    assert!(todo.contains(r#""in_progress":[]"#));
}
