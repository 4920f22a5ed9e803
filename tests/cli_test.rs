//! CLI contract tests
//!
//! Runs the built binary for the commands that need no LLM access
//! (`init`, `chunk`, `compare`).

use smellcmp::ai::{parse_reply, AttemptState};
use smellcmp::models::Chunk;
use smellcmp::store::ChunkStore;
use std::path::Path;
use std::process::Command;

fn smellcmp_bin() -> String {
    env!("CARGO_BIN_EXE_smellcmp").to_string()
}

fn run(cwd: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(smellcmp_bin())
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run smellcmp");
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn setup_repo(root: &Path) -> std::path::PathBuf {
    let repo = root.join("demo");
    std::fs::create_dir_all(repo.join("src")).unwrap();
    let body: String = (1..=40)
        .map(|i| format!("    int field{} = {};\n", i, i))
        .collect();
    std::fs::write(
        repo.join("src/Foo.java"),
        format!("public class Foo {{\n{}}}\n", body),
    )
    .unwrap();
    repo
}

/// Store one successful LLM output for `src/Foo.java`.
fn seed_store(out: &Path) {
    let store = ChunkStore::new(out, "demo");
    let chunk = Chunk {
        source_path: "src/Foo.java".into(),
        start_line: 1,
        end_line: 42,
        text: String::new(),
        sequence_index: 0,
        estimated_tokens: 0,
        oversized: false,
        trivial: false,
    };
    let report = parse_reply(
        r#"{"smells_detectados": ["God Class"],
            "descricao": {"God Class": "Foo holds too many fields"},
            "localizacao": {"God Class": "1-42"},
            "confianca": {"God Class": "baixo"}}"#,
    )
    .unwrap();
    store
        .persist(
            &chunk,
            &AttemptState::Success {
                attempts: 1,
                report,
            },
        )
        .unwrap();
}

#[test]
fn test_init_writes_config_once() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().to_str().unwrap();

    let (code, stdout, _) = run(dir.path(), &["init", target]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Created"));
    let written = std::fs::read_to_string(dir.path().join("smellcmp.toml")).unwrap();
    assert!(written.contains("[chunking]"));

    let (code, stdout, _) = run(dir.path(), &["init", target]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Already initialized"));
}

#[test]
fn test_chunk_respects_max_tokens() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup_repo(dir.path());
    let file = repo.join("src/Foo.java");

    let (code, stdout, _) = run(dir.path(), &["chunk", file.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("1 chunk(s)"), "stdout: {}", stdout);

    let (code, stdout, _) = run(
        dir.path(),
        &["chunk", file.to_str().unwrap(), "--max-tokens", "30"],
    );
    assert_eq!(code, 0);
    assert!(!stdout.contains(" 1 chunk(s)"), "stdout: {}", stdout);
    assert!(stdout.contains("#1"));
}

#[test]
fn test_chunk_rejects_directory() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup_repo(dir.path());
    let (code, _, stderr) = run(dir.path(), &["chunk", repo.to_str().unwrap()]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Not a file"));
}

#[test]
fn test_compare_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup_repo(dir.path());
    let out = dir.path().join("outputs");
    seed_store(&out);

    let checkstyle = dir.path().join("checkstyle.json");
    std::fs::write(
        &checkstyle,
        format!(
            r#"{{"code_smells": [
                {{"file": "{}/src/Foo.java", "line": "1", "source": "ClassDataAbstractionCouplingCheck",
                  "severity": "warning", "message": "too coupled"}}
            ]}}"#,
            repo.display()
        ),
    )
    .unwrap();

    let (code, stdout, stderr) = run(
        dir.path(),
        &[
            "compare",
            repo.to_str().unwrap(),
            "--static",
            checkstyle.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "-f",
            "json",
        ],
    );
    assert_eq!(code, 0, "stderr: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&stdout).expect("stdout is JSON");
    assert_eq!(json["repository"], "demo");
    assert_eq!(json["llm_total"], 1);
    assert_eq!(json["static_total"], 1);
    assert_eq!(json["intersection"], 1);

    let reports = out.join("reports").join("demo");
    assert!(reports.join("comparison.json").exists());
    let markdown = std::fs::read_to_string(reports.join("comparison.md")).unwrap();
    assert!(markdown.contains("God Class"));
}

#[test]
fn test_compare_rejects_analyzer_error() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup_repo(dir.path());
    let broken = dir.path().join("sonar.json");
    std::fs::write(&broken, r#"{"error": "analysis aborted"}"#).unwrap();

    let (code, _, stderr) = run(
        dir.path(),
        &[
            "compare",
            repo.to_str().unwrap(),
            "--static",
            broken.to_str().unwrap(),
        ],
    );
    assert_ne!(code, 0);
    assert!(stderr.contains("analysis aborted"));
}
