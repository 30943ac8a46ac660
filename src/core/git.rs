//! Diff acquisition from version control
//!
//! The core talks to version control through the narrow [`VcsSource`]
//! capability (resolve, list, diff one file, read one file). [`GitCli`]
//! implements it by shelling out to `git` in read-only mode, one process per
//! request, each bounded by a timeout. [`Acquirer`] drives a source to build
//! a [`GitDiff`] file by file.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use tracing::{debug, info, instrument, warn};

use crate::core::filter::PathFilter;
use crate::core::model::{GitDiff, GitDiffBuilder};
use crate::core::parser::{ParseWarning, parse_one};

/// Files processed per acquisition unless the caller says otherwise
pub const DEFAULT_MAX_FILES: usize = 50;

/// Upper bound on a single `git` invocation unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Target label recorded for working-tree-against-HEAD diffs
pub const UNCOMMITTED: &str = "uncommitted";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pin the settings that change how paths and diff headers are printed
const CONFIG_OVERRIDES: [&str; 8] = [
    "-c",
    "core.quotePath=false",
    "-c",
    "diff.noprefix=false",
    "-c",
    "diff.mnemonicPrefix=false",
    "-c",
    "color.ui=never",
];

/// Failures of diff acquisition
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A ref could not be resolved to a commit
    #[error("reference not found: '{reference}'")]
    RefNotFound { reference: String },

    /// Not inside a repository, or the repository is unreadable
    #[error("repository error at {}: {message}", path.display())]
    Repository { path: PathBuf, message: String },

    /// The version-control tool could not be run or exited non-zero
    #[error("`{command}` failed ({status}): {stderr}")]
    ToolExecution {
        command: String,
        status: String,
        stderr: String,
    },

    /// The version-control tool did not finish in time and was killed
    #[error("`{command}` timed out after {}s", timeout.as_secs_f32())]
    TimedOut { command: String, timeout: Duration },

    /// An include/exclude glob did not compile
    #[error("invalid path pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

impl DiffError {
    /// Whether re-running the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DiffError::ToolExecution { .. } | DiffError::TimedOut { .. })
    }
}

/// Which two sides a diff compares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffRange {
    /// Two committed refs: `git diff <target> <source>`
    Refs { target: String, source: String },

    /// A ref against the working tree: `git diff <base>`
    WorkingTree { base: String },
}

impl DiffRange {
    fn args(&self) -> Vec<&str> {
        match self {
            DiffRange::Refs { target, source } => vec![target.as_str(), source.as_str()],
            DiffRange::WorkingTree { base } => vec![base.as_str()],
        }
    }
}

/// One entry of the changed-path listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    /// Path after the change (the deleted path for deletions)
    pub path: String,

    /// Source path of a rename or copy
    pub old_path: Option<String>,
}

impl ChangedPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            old_path: None,
        }
    }

    pub fn renamed(old_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            old_path: Some(old_path.into()),
        }
    }

    /// Pathspecs that select this change, source first
    fn pathspecs(&self) -> Vec<&str> {
        self.old_path
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.path.as_str()))
            .collect()
    }
}

/// Parse `git diff --name-status -z` output.
///
/// Each record is a status token followed by one path, or two for
/// renames (`R<score>`) and copies (`C<score>`).
pub fn parse_name_status(raw: &[u8]) -> Vec<ChangedPath> {
    let mut tokens = raw
        .split(|b| *b == 0)
        .filter(|t| !t.is_empty())
        .map(|t| String::from_utf8_lossy(t).into_owned());

    let mut changes = Vec::new();
    while let Some(status) = tokens.next() {
        let paired = status.starts_with('R') || status.starts_with('C');
        let Some(first) = tokens.next() else {
            warn!(%status, "name-status record without a path");
            break;
        };
        if !paired {
            changes.push(ChangedPath::new(first));
            continue;
        }
        match tokens.next() {
            Some(second) => changes.push(ChangedPath::renamed(first, second)),
            None => {
                warn!(%status, path = %first, "rename record without a destination");
                changes.push(ChangedPath::new(first));
            }
        }
    }
    changes
}

/// Version-control queries the acquisition pipeline needs
pub trait VcsSource {
    /// Top-level directory of the repository
    fn repository_root(&self) -> Result<PathBuf, DiffError>;

    /// Human-readable repository identifier
    fn repository_name(&self) -> Result<String, DiffError>;

    /// Resolve a ref to a commit id; `RefNotFound` when it does not exist
    fn resolve_ref(&self, reference: &str) -> Result<String, DiffError>;

    fn ref_exists(&self, reference: &str) -> Result<bool, DiffError> {
        match self.resolve_ref(reference) {
            Ok(_) => Ok(true),
            Err(DiffError::RefNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Name of the checked-out branch, `HEAD` when detached
    fn current_branch(&self) -> Result<String, DiffError>;

    /// Changed paths in the tool's own listing order, renames paired up
    fn changed_paths(&self, range: &DiffRange) -> Result<Vec<ChangedPath>, DiffError>;

    /// Raw unified diff of one listed change
    fn file_diff(
        &self,
        range: &DiffRange,
        change: &ChangedPath,
        ignore_whitespace: bool,
    ) -> Result<Vec<u8>, DiffError>;

    /// Content of `path` at `reference`, `None` when absent there
    fn file_content(&self, reference: &str, path: &str) -> Result<Option<String>, DiffError>;
}

/// Captured result of one process run
#[derive(Debug)]
struct RunOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: String,
}

/// [`VcsSource`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run git, killing it once the timeout elapses
    fn run(&self, args: &[&str]) -> Result<RunOutput, DiffError> {
        let command = format!("git {}", args.join(" "));

        if !self.workdir.is_dir() {
            return Err(DiffError::Repository {
                path: self.workdir.clone(),
                message: "directory does not exist".to_string(),
            });
        }

        debug!(%command, "running");

        let mut child = Command::new("git")
            .args(CONFIG_OVERRIDES)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DiffError::ToolExecution {
                command: command.clone(),
                status: "spawn failed".to_string(),
                stderr: e.to_string(),
            })?;

        // Drain both pipes concurrently so a full pipe never stalls the child
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(%command, "timed out");
                    return Err(DiffError::TimedOut {
                        command,
                        timeout: self.timeout,
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(DiffError::ToolExecution {
                        command,
                        status: "wait failed".to_string(),
                        stderr: e.to_string(),
                    });
                }
            }
        };

        let join = |h: Option<thread::JoinHandle<Vec<u8>>>| {
            h.and_then(|h| h.join().ok()).unwrap_or_default()
        };

        Ok(RunOutput {
            status,
            stdout: join(stdout),
            stderr: String::from_utf8_lossy(&join(stderr)).trim().to_string(),
        })
    }

    /// Run git and require success
    fn run_ok(&self, args: &[&str]) -> Result<Vec<u8>, DiffError> {
        let out = self.run(args)?;
        if out.status.success() {
            return Ok(out.stdout);
        }
        Err(self.failure(args, out))
    }

    /// Run `git diff`; exit status 1 with a silent stderr only signals differences
    fn run_diff(&self, args: &[&str]) -> Result<Vec<u8>, DiffError> {
        let out = self.run(args)?;
        if out.status.success() || (out.status.code() == Some(1) && out.stderr.is_empty()) {
            return Ok(out.stdout);
        }
        Err(self.failure(args, out))
    }

    fn failure(&self, args: &[&str], out: RunOutput) -> DiffError {
        if out.stderr.contains("not a git repository") {
            return DiffError::Repository {
                path: self.workdir.clone(),
                message: out.stderr,
            };
        }
        DiffError::ToolExecution {
            command: format!("git {}", args.join(" ")),
            status: out.status.to_string(),
            stderr: out.stderr,
        }
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn stdout_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

impl VcsSource for GitCli {
    fn repository_root(&self) -> Result<PathBuf, DiffError> {
        let out = self.run(&["rev-parse", "--show-toplevel"])?;
        if out.status.success() {
            return Ok(PathBuf::from(stdout_line(&out.stdout)));
        }
        Err(DiffError::Repository {
            path: self.workdir.clone(),
            message: out.stderr,
        })
    }

    fn repository_name(&self) -> Result<String, DiffError> {
        let remote = self.run(&["remote", "get-url", "origin"])?;
        if remote.status.success()
            && let Some(name) = name_from_remote(&stdout_line(&remote.stdout))
        {
            return Ok(name);
        }

        let root = self.repository_root()?;
        Ok(root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string()))
    }

    fn resolve_ref(&self, reference: &str) -> Result<String, DiffError> {
        if reference.trim().is_empty() || reference.starts_with('-') {
            return Err(DiffError::RefNotFound {
                reference: reference.to_string(),
            });
        }

        let rev = format!("{reference}^{{commit}}");
        let out = self.run(&["rev-parse", "--verify", "--quiet", &rev])?;

        if out.status.success() {
            return Ok(stdout_line(&out.stdout));
        }
        if out.stderr.contains("not a git repository") {
            return Err(DiffError::Repository {
                path: self.workdir.clone(),
                message: out.stderr,
            });
        }
        Err(DiffError::RefNotFound {
            reference: reference.to_string(),
        })
    }

    fn current_branch(&self) -> Result<String, DiffError> {
        let out = self.run(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        if out.status.success() {
            return Ok(stdout_line(&out.stdout));
        }
        Ok("HEAD".to_string())
    }

    fn changed_paths(&self, range: &DiffRange) -> Result<Vec<ChangedPath>, DiffError> {
        let mut args = vec!["diff", "--name-status", "-z", "--no-color", "-C"];
        args.extend(range.args());

        let raw = self.run_diff(&args)?;
        Ok(parse_name_status(&raw))
    }

    fn file_diff(
        &self,
        range: &DiffRange,
        change: &ChangedPath,
        ignore_whitespace: bool,
    ) -> Result<Vec<u8>, DiffError> {
        let mut args = vec![
            "diff",
            "--no-color",
            "--no-ext-diff",
            "--no-textconv",
            "--src-prefix=a/",
            "--dst-prefix=b/",
            "-C",
        ];
        if ignore_whitespace {
            args.push("--ignore-all-space");
        }
        args.extend(range.args());
        args.push("--");
        args.extend(change.pathspecs());

        self.run_diff(&args)
    }

    fn file_content(&self, reference: &str, path: &str) -> Result<Option<String>, DiffError> {
        self.resolve_ref(reference)?;

        let rev = format!("{reference}:{path}");
        let out = self.run(&["show", &rev])?;
        if out.status.success() {
            return Ok(Some(String::from_utf8_lossy(&out.stdout).into_owned()));
        }
        debug!(reference, path, stderr = %out.stderr, "file not present at ref");
        Ok(None)
    }
}

/// Last path segment of a remote URL without its `.git` suffix
pub fn name_from_remote(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    let url = url.strip_suffix(".git").unwrap_or(url);
    url.rsplit(['/', ':'])
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parameters of one acquisition
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    pub target_ref: String,

    /// `None` compares the target against the working tree
    pub source_ref: Option<String>,

    pub max_files: usize,
    pub ignore_whitespace: bool,
    pub filter: PathFilter,
}

impl AcquireOptions {
    pub fn new(target_ref: impl Into<String>) -> Self {
        Self {
            target_ref: target_ref.into(),
            source_ref: None,
            max_files: DEFAULT_MAX_FILES,
            ignore_whitespace: true,
            filter: PathFilter::default(),
        }
    }

    pub fn source_ref(mut self, source_ref: Option<String>) -> Self {
        self.source_ref = source_ref;
        self
    }

    pub fn max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn ignore_whitespace(mut self, ignore: bool) -> Self {
        self.ignore_whitespace = ignore;
        self
    }

    pub fn filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// A finished acquisition with its bookkeeping
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub diff: GitDiff,

    /// Paths listed by version control that passed the filter
    pub candidates: usize,

    /// Paths listed by version control that the filter rejected
    pub filtered_out: usize,

    /// Candidates never examined because the file bound was reached
    pub omitted: usize,

    pub warnings: Vec<ParseWarning>,
}

/// Builds a [`GitDiff`] by asking a [`VcsSource`] for one file at a time
pub struct Acquirer<'a, V: VcsSource + ?Sized> {
    vcs: &'a V,
    progress: Option<ProgressBar>,
}

impl<'a, V: VcsSource + ?Sized> Acquirer<'a, V> {
    pub fn new(vcs: &'a V) -> Self {
        Self {
            vcs,
            progress: None,
        }
    }

    /// Tick `bar` once per examined file
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Diff `target_ref` against `source_ref`, or against the working tree
    /// when no source is given
    #[instrument(skip_all, fields(target = %opts.target_ref, source = ?opts.source_ref))]
    pub fn acquire(&self, opts: &AcquireOptions) -> Result<Acquisition, DiffError> {
        self.vcs.repository_root()?;
        self.vcs.resolve_ref(&opts.target_ref)?;

        let (source_label, range) = match &opts.source_ref {
            Some(source) => {
                self.vcs.resolve_ref(source)?;
                let range = DiffRange::Refs {
                    target: opts.target_ref.clone(),
                    source: source.clone(),
                };
                (source.clone(), range)
            }
            None => {
                let range = DiffRange::WorkingTree {
                    base: opts.target_ref.clone(),
                };
                (self.vcs.current_branch()?, range)
            }
        };

        info!(source = %source_label, target = %opts.target_ref, "collecting diff");

        let builder = GitDiff::builder(opts.target_ref.clone())
            .source_ref(source_label)
            .repository(self.repository_name());

        self.collect(builder, &range, opts)
    }

    /// Diff staged and unstaged changes against `HEAD`
    #[instrument(skip_all)]
    pub fn acquire_uncommitted(
        &self,
        max_files: usize,
        ignore_whitespace: bool,
        filter: PathFilter,
    ) -> Result<Acquisition, DiffError> {
        self.vcs.repository_root()?;
        self.vcs.resolve_ref("HEAD")?;

        let opts = AcquireOptions::new(UNCOMMITTED)
            .max_files(max_files)
            .ignore_whitespace(ignore_whitespace)
            .filter(filter);
        let range = DiffRange::WorkingTree {
            base: "HEAD".to_string(),
        };

        let builder = GitDiff::builder(UNCOMMITTED)
            .source_ref(self.vcs.current_branch()?)
            .repository(self.repository_name());

        self.collect(builder, &range, &opts)
    }

    fn repository_name(&self) -> String {
        self.vcs.repository_name().unwrap_or_else(|e| {
            warn!(error = %e, "could not determine repository name");
            "unknown".to_string()
        })
    }

    fn collect(
        &self,
        mut builder: GitDiffBuilder,
        range: &DiffRange,
        opts: &AcquireOptions,
    ) -> Result<Acquisition, DiffError> {
        let listed = self.vcs.changed_paths(range)?;
        let listed_len = listed.len();

        let candidates: Vec<ChangedPath> = listed
            .into_iter()
            .filter(|c| opts.filter.matches(&c.path))
            .collect();
        let filtered_out = listed_len - candidates.len();

        if let Some(bar) = &self.progress {
            bar.set_length(candidates.len().min(opts.max_files) as u64);
        }

        let mut warnings = Vec::new();
        let mut examined = 0;

        for change in &candidates {
            if builder.len() >= opts.max_files {
                break;
            }
            examined += 1;

            let raw = self.vcs.file_diff(range, change, opts.ignore_whitespace)?;
            let (file, mut file_warnings) = parse_one(&raw, &change.path);
            warnings.append(&mut file_warnings);

            match file {
                Some(file) => builder.push(file),
                None => debug!(path = %change.path, "no textual difference"),
            }

            if let Some(bar) = &self.progress {
                bar.inc(1);
            }
        }

        let omitted = candidates.len() - examined;
        if omitted > 0 {
            info!(omitted, max_files = opts.max_files, "file limit reached");
        }
        builder.set_omitted(omitted);

        let diff = builder.finish();
        info!(
            files = diff.total_files(),
            additions = diff.total_additions(),
            deletions = diff.total_deletions(),
            "diff collected"
        );

        Ok(Acquisition {
            diff,
            candidates: candidates.len(),
            filtered_out,
            omitted,
            warnings,
        })
    }
}

/// Convenience wrapper around [`Acquirer::acquire`]
pub fn acquire<V: VcsSource + ?Sized>(
    vcs: &V,
    opts: &AcquireOptions,
) -> Result<Acquisition, DiffError> {
    Acquirer::new(vcs).acquire(opts)
}
