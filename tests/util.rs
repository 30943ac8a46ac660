//! Shared test utilities for integration tests
//!
//! Canned diffs, an in-memory version-control source and a helper that
//! builds a throwaway git repository.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_fs::prelude::*;
use diffpack::core::git::{ChangedPath, DiffError, DiffRange, VcsSource};

/// File A gains one line in a 3-line hunk; file B is binary
pub const TWO_FILE_DIFF: &str = "\
diff --git a/src/app.py b/src/app.py
index 83db48f..bf269f4 100644
--- a/src/app.py
+++ b/src/app.py
@@ -1,3 +1,4 @@
 import os
+import sys

 def main():
diff --git a/assets/logo.png b/assets/logo.png
index 1111111..2222222 100644
Binary files a/assets/logo.png and b/assets/logo.png differ
";

/// Unified diff of `path` replacing `lines` old lines with new ones
pub fn single_file_diff(path: &str, lines: usize) -> String {
    let mut out = format!(
        "diff --git a/{path} b/{path}\nindex 0000001..0000002 100644\n--- a/{path}\n+++ b/{path}\n@@ -1,{lines} +1,{lines} @@\n"
    );
    for i in 0..lines {
        out.push_str(&format!("-old line {i}\n+new line {i}\n"));
    }
    out
}

/// In-memory [`VcsSource`] returning canned diff text
#[derive(Debug, Default)]
pub struct FakeVcs {
    pub refs: HashSet<String>,
    pub branch: String,
    pub name: String,
    pub paths: Vec<ChangedPath>,
    pub diffs: HashMap<String, String>,
    pub contents: HashMap<(String, String), String>,
    pub failing_path: Option<String>,
}

impl FakeVcs {
    pub fn new(refs: &[&str]) -> Self {
        Self {
            refs: refs.iter().map(|r| r.to_string()).collect(),
            branch: "feature".to_string(),
            name: "fake-repo".to_string(),
            ..Self::default()
        }
    }

    /// Register a changed path with its diff text
    pub fn with_file(mut self, path: &str, diff: impl Into<String>) -> Self {
        self.paths.push(ChangedPath::new(path));
        self.diffs.insert(path.to_string(), diff.into());
        self
    }

    /// Register a rename listed as one change, keyed by its new path
    pub fn with_rename(mut self, old: &str, new: &str, diff: impl Into<String>) -> Self {
        self.paths.push(ChangedPath::renamed(old, new));
        self.diffs.insert(new.to_string(), diff.into());
        self
    }

    pub fn with_content(mut self, reference: &str, path: &str, content: &str) -> Self {
        self.contents
            .insert((reference.to_string(), path.to_string()), content.to_string());
        self
    }
}

impl VcsSource for FakeVcs {
    fn repository_root(&self) -> Result<PathBuf, DiffError> {
        Ok(PathBuf::from("/fake/repo"))
    }

    fn repository_name(&self) -> Result<String, DiffError> {
        Ok(self.name.clone())
    }

    fn resolve_ref(&self, reference: &str) -> Result<String, DiffError> {
        if self.refs.contains(reference) {
            Ok(format!("{reference}-sha"))
        } else {
            Err(DiffError::RefNotFound {
                reference: reference.to_string(),
            })
        }
    }

    fn current_branch(&self) -> Result<String, DiffError> {
        Ok(self.branch.clone())
    }

    fn changed_paths(&self, _range: &DiffRange) -> Result<Vec<ChangedPath>, DiffError> {
        Ok(self.paths.clone())
    }

    fn file_diff(
        &self,
        _range: &DiffRange,
        change: &ChangedPath,
        _ignore_whitespace: bool,
    ) -> Result<Vec<u8>, DiffError> {
        let path = change.path.as_str();
        if self.failing_path.as_deref() == Some(path) {
            return Err(DiffError::ToolExecution {
                command: format!("git diff -- {path}"),
                status: "exit status: 128".to_string(),
                stderr: "fatal: bad object".to_string(),
            });
        }
        Ok(self.diffs.get(path).cloned().unwrap_or_default().into_bytes())
    }

    fn file_content(&self, reference: &str, path: &str) -> Result<Option<String>, DiffError> {
        self.resolve_ref(reference)?;
        Ok(self
            .contents
            .get(&(reference.to_string(), path.to_string()))
            .cloned())
    }
}

/// Whether a usable `git` is on PATH
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with a fixed identity, panicking on failure
pub fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        status.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&status.stderr)
    );
}

/// Repository with a `main` commit and a `topic` branch that edits one
/// file, adds a second and deletes a third
pub fn make_repo() -> assert_fs::TempDir {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let dir = tmp.path();

    git(dir, &["init", "-q"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    tmp.child("src/lib.rs")
        .write_str("pub fn one() -> u32 {\n    1\n}\n")
        .expect("write lib");
    tmp.child("old.txt").write_str("legacy\n").expect("write old");
    tmp.child("Cargo.lock").write_str("# lock v1\n").expect("write lock");
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", "initial"]);

    git(dir, &["checkout", "-q", "-b", "topic"]);
    tmp.child("src/lib.rs")
        .write_str("pub fn one() -> u32 {\n    1\n}\n\npub fn two() -> u32 {\n    2\n}\n")
        .expect("edit lib");
    tmp.child("src/new.py").write_str("print('hi')\n").expect("write new");
    tmp.child("Cargo.lock").write_str("# lock v2\n").expect("edit lock");
    git(dir, &["rm", "-q", "old.txt"]);
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-q", "-m", "topic work"]);

    tmp
}
