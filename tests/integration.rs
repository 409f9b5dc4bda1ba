use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn teapot_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("teapot");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("brewing.md"),
        "Oolong tea is steeped at ninety degrees for three minutes.\n\nGreen tea prefers cooler water around seventy degrees.",
    )
    .unwrap();

    let config_content = format!(
        r#"[storage]
path = "{}/data/teapot.sqlite"

[chunking]
max_words = 64

[retrieval]
rag_top_k = 5
memory_top_k = 3

[generation]
provider = "echo"
system_prompt = "Answer briefly."

[server]
bind = "127.0.0.1:0"
"#,
        root.display()
    );

    let config_path = config_dir.join("teapot.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_teapot(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = teapot_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run teapot binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Add the fixture file and return the new document id.
fn add_brewing_doc(tmp: &TempDir, config_path: &Path) -> String {
    let file = tmp.path().join("files").join("brewing.md");
    let (stdout, stderr, success) =
        run_teapot(config_path, &["docs", "add", "--file", file.to_str().unwrap()]);
    assert!(success, "docs add failed: stdout={}, stderr={}", stdout, stderr);
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("added "))
        .expect("docs add prints the new id")
        .trim()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_teapot(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("teapot.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_teapot(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_teapot(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_fresh_store_is_seeded() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_teapot(&config_path, &["docs", "list"]);
    assert!(success);
    assert!(stdout.contains("Default Context"));
    assert_eq!(stdout.lines().count(), 1);
}

#[test]
fn test_docs_add_from_file() {
    let (tmp, config_path) = setup_test_env();
    let id = add_brewing_doc(&tmp, &config_path);

    let (stdout, _, _) = run_teapot(&config_path, &["docs", "list"]);
    assert!(stdout.contains("Default Context"));
    assert!(stdout.contains("brewing.md"));
    assert!(stdout.contains("(2 chunks"));

    let (stdout, _, success) = run_teapot(&config_path, &["docs", "show", &id]);
    assert!(success);
    assert!(stdout.contains("--- Chunks (2) ---"));
    assert!(stdout.contains("Green tea prefers cooler water"));
}

#[test]
fn test_docs_add_text_auto_title() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_teapot(
        &config_path,
        &["docs", "add", "Rooibos is caffeine free and naturally sweet."],
    );
    assert!(success);
    assert!(stdout.contains("title:  Rooibos is caffeine free and..."));
}

#[test]
fn test_docs_add_blank_is_skipped() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_teapot(&config_path, &["docs", "add", "   "]);
    assert!(success);
    assert!(stdout.contains("skipped"));

    let (stdout, _, _) = run_teapot(&config_path, &["docs", "list"]);
    assert_eq!(stdout.lines().count(), 1);
}

#[test]
fn test_docs_delete() {
    let (tmp, config_path) = setup_test_env();
    let id = add_brewing_doc(&tmp, &config_path);

    let (_, _, success) = run_teapot(&config_path, &["docs", "delete", &id]);
    assert!(success);

    let (stdout, _, _) = run_teapot(&config_path, &["docs", "list"]);
    assert!(!stdout.contains("brewing.md"));

    let (_, stderr, success) = run_teapot(&config_path, &["docs", "delete", &id]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_docs_show_unknown() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_teapot(&config_path, &["docs", "show", "nope"]);
    assert!(!success);
    assert!(stderr.contains("document not found"));
}

#[test]
fn test_search_ranks_best_first() {
    let (tmp, config_path) = setup_test_env();
    add_brewing_doc(&tmp, &config_path);

    let (stdout, stderr, success) =
        run_teapot(&config_path, &["search", "oolong tea steeping", "--limit", "2"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);

    let first = stdout.lines().next().unwrap();
    assert!(first.starts_with("1. [3] docs"), "unexpected first line: {}", first);
    assert!(stdout.contains("Oolong tea is steeped"));
    assert!(stdout.contains("2. [1] docs"));
}

#[test]
fn test_search_unknown_corpus() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_teapot(&config_path, &["search", "x", "--corpus", "web"]);
    assert!(!success);
    assert!(stderr.contains("Unknown corpus"));
}

#[test]
fn test_chat_echo_and_sessions() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_teapot(
        &config_path,
        &["chat", "Tell me about brewing a perfect pot of oolong"],
    );
    assert!(success, "chat failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(stdout.trim(), "Tell me about brewing a perfect pot of oolong");

    let (stdout, _, success) = run_teapot(&config_path, &["sessions", "list"]);
    assert!(success);
    // Titles are the first 30 characters of the first message.
    assert!(stdout.contains("  Tell me about brewing a perfec  (2 messages"));
}

#[test]
fn test_chat_show_prompt() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_teapot(
        &config_path,
        &["chat", "What is Teapot?", "--show-prompt"],
    );
    assert!(success);
    assert!(stdout.contains("--- Prompt ---"));
    assert!(stdout.contains("Teapot is a small open-source language model"));
    assert!(stdout.contains("Answer briefly.\nWhat is Teapot?"));
}

#[test]
fn test_memory_carries_across_resume() {
    let (_tmp, config_path) = setup_test_env();

    run_teapot(&config_path, &["chat", "My favourite tea is oolong"]);

    let (stdout, _, success) = run_teapot(&config_path, &["context", "which oolong"]);
    assert!(success);
    assert!(stdout.contains("User: My favourite tea is oolong"));

    let (stdout, _, success) = run_teapot(&config_path, &["search", "oolong", "--corpus", "memory"]);
    assert!(success);
    assert!(stdout.contains("Assistant: My favourite tea is oolong"));
}

/// Id of the listed session whose title starts with `title`.
fn session_id(config_path: &Path, title: &str) -> String {
    let (stdout, _, _) = run_teapot(config_path, &["sessions", "list"]);
    stdout
        .lines()
        .find(|l| l.contains(&format!("  {}", title)))
        .and_then(|l| l.split_whitespace().next())
        .unwrap_or_else(|| panic!("no session titled {:?} in:\n{}", title, stdout))
        .to_string()
}

#[test]
fn test_chat_in_older_session() {
    let (_tmp, config_path) = setup_test_env();

    run_teapot(&config_path, &["chat", "Oolong is rolled by hand"]);
    run_teapot(&config_path, &["chat", "Rooibos grows in the Cederberg"]);
    let older = session_id(&config_path, "Oolong is rolled by hand");

    let (stdout, stderr, success) = run_teapot(
        &config_path,
        &["chat", "--session", &older, "How is oolong shaped?"],
    );
    assert!(success, "chat failed: stdout={}, stderr={}", stdout, stderr);

    let (stdout, _, _) = run_teapot(&config_path, &["sessions", "list"]);
    let older_line = stdout.lines().find(|l| l.starts_with(&older)).unwrap();
    assert!(older_line.contains("(4 messages"));
    let newer_line = stdout
        .lines()
        .find(|l| l.contains("Rooibos grows in the Cederberg"))
        .unwrap();
    assert!(newer_line.contains("(2 messages"));

    let (stdout, _, success) =
        run_teapot(&config_path, &["context", "oolong", "--session", &older]);
    assert!(success);
    assert!(stdout.contains("User: How is oolong shaped?"));
    assert!(!stdout.contains("Rooibos"));
}

#[test]
fn test_chat_unknown_session() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_teapot(&config_path, &["chat", "--session", "missing", "hi"]);
    assert!(!success);
    assert!(stderr.contains("session not found: missing"));
}

#[test]
fn test_chat_repl_from_stdin() {
    let (_tmp, config_path) = setup_test_env();

    let mut child = Command::new(teapot_binary())
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("chat")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"first question\n\nsecond question\n/quit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("first question"));
    assert!(stdout.contains("second question"));

    let (stdout, _, _) = run_teapot(&config_path, &["sessions", "list"]);
    // Blank lines are ignored, both questions land in one session.
    assert!(stdout.contains("(4 messages"));
}

#[test]
fn test_missing_config_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let output = Command::new(teapot_binary())
        .current_dir(tmp.path())
        .args(["docs", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Default Context"));
    assert!(tmp.path().join("data").join("teapot.sqlite").exists());
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(&config_path, "[chunking]\nmax_words = 0\n").unwrap();

    let (_, stderr, success) = run_teapot(&config_path, &["docs", "list"]);
    assert!(!success);
    assert!(stderr.contains("max_words"));
}
