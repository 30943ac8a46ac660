//! Structured model of a parsed unified diff.
//!
//! `GitDiff` owns its files, each `DiffFile` owns its hunks. Nothing holds a
//! back-reference to its parent. Statistics and totals are derived values:
//! they are recomputed whenever hunks or files are replaced and cannot be
//! written directly.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change applied to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Deleted => "deleted",
            ChangeType::Modified => "modified",
            ChangeType::Renamed => "renamed",
            ChangeType::Copied => "copied",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single hunk row, serialized as its diff marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineKind {
    #[serde(rename = " ")]
    Context,
    #[serde(rename = "+")]
    Addition,
    #[serde(rename = "-")]
    Deletion,
}

impl LineKind {
    /// Map a unified-diff marker character to a line kind
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(LineKind::Context),
            '+' => Some(LineKind::Addition),
            '-' => Some(LineKind::Deletion),
            _ => None,
        }
    }

    /// The one-character marker used in unified diffs
    pub fn marker(self) -> char {
        match self {
            LineKind::Context => ' ',
            LineKind::Addition => '+',
            LineKind::Deletion => '-',
        }
    }
}

/// One row of a hunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// 1-based line number in the old file (context and deletions)
    pub old_line: Option<usize>,

    /// 1-based line number in the new file (context and additions)
    pub new_line: Option<usize>,

    /// Line text without the leading marker and trailing newline
    pub content: String,

    pub kind: LineKind,
}

impl DiffLine {
    pub fn context(old_line: usize, new_line: usize, content: impl Into<String>) -> Self {
        Self {
            old_line: Some(old_line),
            new_line: Some(new_line),
            content: content.into(),
            kind: LineKind::Context,
        }
    }

    pub fn addition(new_line: usize, content: impl Into<String>) -> Self {
        Self {
            old_line: None,
            new_line: Some(new_line),
            content: content.into(),
            kind: LineKind::Addition,
        }
    }

    pub fn deletion(old_line: usize, content: impl Into<String>) -> Self {
        Self {
            old_line: Some(old_line),
            new_line: None,
            content: content.into(),
            kind: LineKind::Deletion,
        }
    }

    pub fn is_addition(&self) -> bool {
        self.kind == LineKind::Addition
    }

    pub fn is_deletion(&self) -> bool {
        self.kind == LineKind::Deletion
    }

    pub fn is_context(&self) -> bool {
        self.kind == LineKind::Context
    }

    /// Render the row the way it appears inside a unified diff
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.content.len() + 1);
        out.push(self.kind.marker());
        out.push_str(&self.content);
        out
    }
}

/// A contiguous change region of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,

    /// Text after the closing `@@`, typically the enclosing function
    pub section_header: Option<String>,

    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Render the `@@` header in git's format.
    ///
    /// Counts equal to 1 are omitted, which is how git writes single-line
    /// ranges, so a header produced by git renders back byte-for-byte.
    pub fn header(&self) -> String {
        let mut header = format!(
            "@@ -{} +{} @@",
            range(self.old_start, self.old_count),
            range(self.new_start, self.new_count)
        );
        if let Some(section) = &self.section_header {
            header.push(' ');
            header.push_str(section);
        }
        header
    }

    pub fn added_lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.is_addition())
    }

    pub fn deleted_lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.is_deletion())
    }

    pub fn context_lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.is_context())
    }

    /// Number of rows present on the old side (context + deletions)
    pub fn old_side_len(&self) -> usize {
        self.lines.iter().filter(|l| !l.is_addition()).count()
    }

    /// Number of rows present on the new side (context + additions)
    pub fn new_side_len(&self) -> usize {
        self.lines.iter().filter(|l| !l.is_deletion()).count()
    }
}

fn range(start: usize, count: usize) -> String {
    if count == 1 {
        start.to_string()
    } else {
        format!("{start},{count}")
    }
}

/// Line statistics derived from a file's hunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
}

impl DiffStats {
    pub fn from_hunks(hunks: &[DiffHunk]) -> Self {
        hunks.iter().flat_map(|h| h.lines.iter()).fold(
            Self::default(),
            |mut acc, line| {
                match line.kind {
                    LineKind::Addition => acc.additions += 1,
                    LineKind::Deletion => acc.deletions += 1,
                    LineKind::Context => {}
                }
                acc
            },
        )
    }

    /// Additions plus deletions
    pub fn total_changes(&self) -> usize {
        self.additions + self.deletions
    }

    /// Additions minus deletions
    pub fn net_change(&self) -> i64 {
        self.additions as i64 - self.deletions as i64
    }
}

/// One changed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFile {
    /// Path before the change (`None` for added files)
    pub old_path: Option<String>,

    /// Path after the change (`None` for deleted files)
    pub new_path: Option<String>,

    pub change_type: ChangeType,

    /// File modes from `old mode` / `deleted file mode` / `index` lines
    pub old_mode: Option<String>,
    pub new_mode: Option<String>,

    /// Abbreviated blob ids from the `index` line
    pub old_hash: Option<String>,
    pub new_hash: Option<String>,

    /// Similarity percentage reported for renames and copies
    pub similarity: Option<u8>,

    /// Language tag from the file classifier
    pub language: Option<String>,

    binary: bool,
    hunks: Vec<DiffHunk>,
    stats: DiffStats,
}

impl DiffFile {
    pub fn new(
        old_path: Option<String>,
        new_path: Option<String>,
        change_type: ChangeType,
    ) -> Self {
        Self {
            old_path,
            new_path,
            change_type,
            old_mode: None,
            new_mode: None,
            old_hash: None,
            new_hash: None,
            similarity: None,
            language: None,
            binary: false,
            hunks: Vec::new(),
            stats: DiffStats::default(),
        }
    }

    /// New path if present, else old path
    pub fn path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or("unknown")
    }

    pub fn is_new_file(&self) -> bool {
        self.change_type == ChangeType::Added || self.old_path.is_none()
    }

    pub fn is_deleted_file(&self) -> bool {
        self.change_type == ChangeType::Deleted || self.new_path.is_none()
    }

    pub fn is_renamed(&self) -> bool {
        self.change_type == ChangeType::Renamed
    }

    pub fn is_modified(&self) -> bool {
        self.change_type == ChangeType::Modified
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    pub fn hunks(&self) -> &[DiffHunk] {
        &self.hunks
    }

    pub fn stats(&self) -> DiffStats {
        self.stats
    }

    /// Replace the hunks and recompute statistics.
    /// Ignored for binary files, which never carry hunks.
    pub fn set_hunks(&mut self, hunks: Vec<DiffHunk>) {
        if self.binary {
            return;
        }
        self.stats = DiffStats::from_hunks(&hunks);
        self.hunks = hunks;
    }

    /// Flag the file as binary, dropping any hunks and statistics
    pub fn mark_binary(&mut self) {
        self.binary = true;
        self.hunks.clear();
        self.stats = DiffStats::default();
    }

    /// Lowercased extension of `path()`, without the dot
    pub fn extension(&self) -> Option<String> {
        Path::new(self.path())
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// Aggregate counts over a whole changeset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub total_files: usize,
    pub total_additions: usize,
    pub total_deletions: usize,
    pub net_change: i64,
    pub new_files: usize,
    pub deleted_files: usize,
    pub modified_files: usize,
    pub binary_files: usize,
}

/// A whole changeset between two refs.
///
/// Built through [`GitDiffBuilder`]; once finished it is read-only. Narrowing
/// the file list produces a new value via [`GitDiff::with_files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitDiff {
    pub source_ref: Option<String>,
    pub target_ref: String,
    pub repository: Option<String>,
    pub created_at: DateTime<Utc>,

    files: Vec<DiffFile>,
    total_files: usize,
    total_additions: usize,
    total_deletions: usize,

    /// Candidates dropped by the file-count bound during acquisition
    omitted_files: usize,
}

impl GitDiff {
    pub fn builder(target_ref: impl Into<String>) -> GitDiffBuilder {
        GitDiffBuilder::new(target_ref)
    }

    pub fn files(&self) -> &[DiffFile] {
        &self.files
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn total_additions(&self) -> usize {
        self.total_additions
    }

    pub fn total_deletions(&self) -> usize {
        self.total_deletions
    }

    pub fn omitted_files(&self) -> usize {
        self.omitted_files
    }

    /// Copy of this diff carrying a different file list, totals recomputed
    pub fn with_files(&self, files: Vec<DiffFile>) -> GitDiff {
        let mut out = GitDiff {
            source_ref: self.source_ref.clone(),
            target_ref: self.target_ref.clone(),
            repository: self.repository.clone(),
            created_at: self.created_at,
            files,
            total_files: 0,
            total_additions: 0,
            total_deletions: 0,
            omitted_files: self.omitted_files,
        };
        out.compute_totals();
        out
    }

    pub fn files_by_extension(&self, extension: &str) -> Vec<&DiffFile> {
        let wanted = extension.trim_start_matches('.').to_lowercase();
        self.files
            .iter()
            .filter(|f| f.extension().as_deref() == Some(wanted.as_str()))
            .collect()
    }

    pub fn files_by_change_type(&self, change_type: ChangeType) -> Vec<&DiffFile> {
        self.files
            .iter()
            .filter(|f| f.change_type == change_type)
            .collect()
    }

    pub fn modified_files(&self) -> Vec<&DiffFile> {
        self.files.iter().filter(|f| f.is_modified()).collect()
    }

    pub fn new_files(&self) -> Vec<&DiffFile> {
        self.files.iter().filter(|f| f.is_new_file()).collect()
    }

    pub fn deleted_files(&self) -> Vec<&DiffFile> {
        self.files.iter().filter(|f| f.is_deleted_file()).collect()
    }

    pub fn binary_files(&self) -> Vec<&DiffFile> {
        self.files.iter().filter(|f| f.is_binary()).collect()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            total_files: self.total_files,
            total_additions: self.total_additions,
            total_deletions: self.total_deletions,
            net_change: self.total_additions as i64 - self.total_deletions as i64,
            new_files: self.new_files().len(),
            deleted_files: self.deleted_files().len(),
            modified_files: self.modified_files().len(),
            binary_files: self.binary_files().len(),
        }
    }

    fn compute_totals(&mut self) {
        self.total_files = self.files.len();
        self.total_additions = self.files.iter().map(|f| f.stats.additions).sum();
        self.total_deletions = self.files.iter().map(|f| f.stats.deletions).sum();
    }
}

/// Accumulator filled file by file during acquisition
#[derive(Debug, Clone)]
pub struct GitDiffBuilder {
    source_ref: Option<String>,
    target_ref: String,
    repository: Option<String>,
    created_at: DateTime<Utc>,
    files: Vec<DiffFile>,
    omitted_files: usize,
}

impl GitDiffBuilder {
    pub fn new(target_ref: impl Into<String>) -> Self {
        Self {
            source_ref: None,
            target_ref: target_ref.into(),
            repository: None,
            created_at: Utc::now(),
            files: Vec::new(),
            omitted_files: 0,
        }
    }

    pub fn source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    pub fn repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn files(mut self, files: impl IntoIterator<Item = DiffFile>) -> Self {
        self.files.extend(files);
        self
    }

    pub fn push(&mut self, file: DiffFile) {
        self.files.push(file);
    }

    pub fn set_omitted(&mut self, omitted: usize) {
        self.omitted_files = omitted;
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Finalize totals and hand ownership of the files to a `GitDiff`
    pub fn finish(self) -> GitDiff {
        let mut diff = GitDiff {
            source_ref: self.source_ref,
            target_ref: self.target_ref,
            repository: self.repository,
            created_at: self.created_at,
            files: self.files,
            total_files: 0,
            total_additions: 0,
            total_deletions: 0,
            omitted_files: self.omitted_files,
        };
        diff.compute_totals();
        diff
    }
}
