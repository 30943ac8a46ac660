//! CLI parsing and end-to-end runs of the `dpack` binary against a real,
//! throwaway git repository. End-to-end tests are skipped without git.

mod util;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use clap::Parser;
use diffpack::cli::{Cli, Commands, FileArgs, PackArgs};
use diffpack::core::budgeter::CounterKind;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;
use util::{git, git_available, make_repo};

fn dpack(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("dpack").expect("bin");
    cmd.current_dir(dir).env_remove("RUST_LOG").env("NO_COLOR", "1");
    cmd
}

macro_rules! require_git {
    () => {
        if !git_available() {
            eprintln!("git not available, skipping");
            return;
        }
    };
}

#[test]
fn pack_flag_parsing() {
    // Given
    let argv = vec![
        "dpack", "pack", "--target", "main", "--include", "src/*", "--budget", "2000",
        "--counter", "approx", "--json",
    ];

    // When
    let cmd = Cli::parse_from(argv);

    // Then
    match cmd.command {
        Commands::Pack(PackArgs { diff, budget, counter, json, .. }) => {
            assert_eq!(diff.target.as_deref(), Some("main"));
            assert_eq!(diff.include, vec!["src/*".to_string()]);
            assert_eq!(budget, Some(2000));
            assert_eq!(counter, Some(CounterKind::Approx));
            assert!(json);
        }
        _ => panic!("expected Pack command"),
    }
}

#[test]
fn file_defaults_to_head() {
    let cmd = Cli::parse_from(["dpack", "file", "src/lib.rs"]);
    match cmd.command {
        Commands::File(FileArgs { path, reference, max_lines, .. }) => {
            assert_eq!(path, "src/lib.rs");
            assert_eq!(reference, "HEAD");
            assert_eq!(max_lines, None);
        }
        _ => panic!("expected File command"),
    }
}

#[test]
fn pack_between_refs_prints_context() {
    require_git!();
    let repo = make_repo();

    dpack(repo.path())
        .args(["--quiet", "pack", "--target", "main", "--source", "topic", "--counter", "chars"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Repository: "))
        .stdout(predicate::str::contains("Source Branch: topic\nTarget Branch: main\nFiles Changed: 4"))
        .stdout(predicate::str::contains("--- src/lib.rs --- [Language: rust]\nStats: +4 -0"))
        .stdout(predicate::str::contains("--- old.txt --- (deleted) [Language: text]"))
        .stdout(predicate::str::contains("--- src/new.py --- (added) [Language: python]"))
        .stdout(predicate::str::contains("+pub fn two() -> u32 {"))
        .stdout(predicate::str::contains("truncated").not());
}

#[test]
fn pack_json_reports_truncation_and_filters() {
    require_git!();
    let repo = make_repo();

    let out = dpack(repo.path())
        .args([
            "--quiet", "pack", "--target", "main", "--source", "topic", "--exclude", "*.lock",
            "--max-files", "2", "--counter", "chars", "--budget", "10000", "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v: Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(v["filtered_out"], 1);
    assert_eq!(v["candidates"], 3);
    assert_eq!(v["omitted"], 1);
    assert_eq!(v["diff_summary"]["total_files"], 2);
    assert_eq!(v["truncation"][0]["reason"], "file_limit");
    assert!(
        v["context"]
            .as_str()
            .unwrap()
            .ends_with("... (truncated: 1 files skipped, reason: file limit)")
    );
    assert!(v["payload_tokens"].as_u64().unwrap() <= 10000);
}

#[test]
fn tiny_budget_keeps_only_the_header() {
    require_git!();
    let repo = make_repo();

    dpack(repo.path())
        .args(["--quiet", "pack", "-t", "main", "-s", "topic", "--counter", "chars", "--budget", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("=== FILE CHANGES ===\n... (truncated: 4 files skipped, reason: size limit)"))
        .stdout(predicate::str::contains("--- src/").not());
}

#[test]
fn uncommitted_and_working_tree_modes() {
    require_git!();
    let repo = make_repo();
    repo.child("src/lib.rs")
        .write_str("pub fn one() -> u32 {\n    11\n}\n")
        .expect("edit");

    dpack(repo.path())
        .args(["--quiet", "pack", "--uncommitted", "--counter", "chars"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Source Branch: topic\nTarget Branch: uncommitted\nFiles Changed: 1"))
        .stdout(predicate::str::contains("--- src/lib.rs --- [Language: rust]\nStats: +1 -5"))
        .stdout(predicate::str::contains("\n+    11\n"))
        .stdout(predicate::str::contains("\n-pub fn two() -> u32 {\n"));

    // Target against the working tree picks up committed and uncommitted work
    dpack(repo.path())
        .args(["--quiet", "stats", "--target", "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Refs: topic -> main"))
        .stdout(predicate::str::contains("Files: 4 (1 new, 1 deleted, 2 modified, 0 binary)"));
}

#[test]
fn renames_keep_both_paths() {
    require_git!();
    let repo = make_repo();
    git(repo.path(), &["checkout", "-q", "-b", "moved"]);
    git(repo.path(), &["mv", "src/lib.rs", "src/core.rs"]);
    git(repo.path(), &["commit", "-q", "-m", "move"]);

    let out = dpack(repo.path())
        .args(["--quiet", "stats", "--target", "topic", "--source", "moved", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v: Value = serde_json::from_slice(&out).expect("json");
    let files = v["diff"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["change_type"], "renamed");
    assert_eq!(files[0]["old_path"], "src/lib.rs");
    assert_eq!(files[0]["new_path"], "src/core.rs");
    assert_eq!(v["summary"]["new_files"], 0);

    dpack(repo.path())
        .args(["--quiet", "pack", "-t", "topic", "-s", "moved", "--counter", "chars"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--- src/core.rs --- (renamed) [Language: rust]\nStats: +0 -0"));
}

#[test]
fn non_ascii_paths_are_not_escaped() {
    require_git!();
    let repo = make_repo();
    git(repo.path(), &["checkout", "-q", "-b", "accents"]);
    repo.child("café.py").write_str("print('olá')\n").expect("write");
    git(repo.path(), &["add", "-A"]);
    git(repo.path(), &["commit", "-q", "-m", "accents"]);

    let out = dpack(repo.path())
        .args(["--quiet", "stats", "--target", "topic", "--source", "accents", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v: Value = serde_json::from_slice(&out).expect("json");
    let files = v["diff"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["new_path"], "café.py");
    assert_eq!(files[0]["language"], "python");
}

#[test]
fn user_diff_prefix_settings_are_ignored() {
    require_git!();
    let repo = make_repo();
    git(repo.path(), &["config", "diff.mnemonicPrefix", "true"]);
    git(repo.path(), &["config", "diff.srcPrefix", "old/"]);
    git(repo.path(), &["config", "diff.dstPrefix", "new/"]);
    repo.child("src/lib.rs")
        .write_str("pub fn one() -> u32 {\n    1\n}\n\npub fn two() -> u32 {\n    22\n}\n")
        .expect("edit");

    dpack(repo.path())
        .args(["--quiet", "pack", "--uncommitted", "--counter", "chars"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--- src/lib.rs --- [Language: rust]\nStats: +1 -1"))
        .stdout(predicate::str::contains("w/src").not())
        .stdout(predicate::str::contains("new/src").not());
}

#[test]
fn stats_json_is_machine_readable() {
    require_git!();
    let repo = make_repo();

    let out = dpack(repo.path())
        .args(["stats", "--target", "main", "--source", "topic", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v: Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(v["summary"]["new_files"], 1);
    assert_eq!(v["summary"]["deleted_files"], 1);
    assert_eq!(v["diff"]["target_ref"], "main");
    assert_eq!(v["diff"]["files"].as_array().unwrap().len(), 4);
}

#[test]
fn unknown_ref_fails_with_its_name() {
    require_git!();
    let repo = make_repo();

    dpack(repo.path())
        .args(["--quiet", "pack", "--target", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist"));
}

#[test]
fn outside_a_repository_fails() {
    require_git!();
    let tmp = assert_fs::TempDir::new().unwrap();

    dpack(tmp.path())
        .args(["--quiet", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("repository error"));
}

#[test]
fn file_context_from_a_ref() {
    require_git!();
    let repo = make_repo();

    dpack(repo.path())
        .args(["--quiet", "file", "src/lib.rs", "--ref", "topic", "--max-lines", "2"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "=== src/lib.rs ===\nLanguage: rust\nTotal Lines: 8\n\n```rust\npub fn one() -> u32 {\n    1\n...\n(File truncated after 2 lines)\n```",
        ));

    dpack(repo.path())
        .args(["--quiet", "file", "old.txt", "--ref", "topic"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist at topic"));
}

#[test]
fn config_file_supplies_defaults() {
    require_git!();
    let repo = make_repo();
    git(repo.path(), &["checkout", "-q", "main"]);

    dpack(repo.path()).args(["--quiet", "init"]).assert().success();
    repo.child("diffpack.toml").assert(predicate::str::contains("[context]"));

    repo.child("diffpack.toml")
        .write_str("[diff]\ntarget = \"topic\"\nexclude = [\"*.lock\"]\n\n[context]\ncounter = \"chars\"\n")
        .expect("write config");

    // main checked out, diffed against topic in the working tree
    dpack(repo.path())
        .args(["--quiet", "pack"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Source Branch: main\nTarget Branch: topic"))
        .stdout(predicate::str::contains("Cargo.lock").not());

    dpack(repo.path()).args(["--quiet", "init"]).assert().failure();
}

#[test]
fn completions_to_stdout() {
    Command::cargo_bin("dpack")
        .expect("bin")
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dpack"));
}

#[test]
fn completions_detect_shell_from_env() {
    Command::cargo_bin("dpack")
        .expect("bin")
        .env("SHELL", "/usr/bin/fish")
        .args(["completions", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete -c dpack"));

    Command::cargo_bin("dpack")
        .expect("bin")
        .env_remove("SHELL")
        .args(["completions", "--stdout"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("$SHELL is not set"));
}
