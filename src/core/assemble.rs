//! Budget-bounded context assembly.
//!
//! A single greedy pass over the files of a [`GitDiff`] in stored order. The
//! header is always emitted; each file header and hunk is appended only when
//! its cost still fits. The first piece that does not fit ends the walk, so
//! raising the budget only ever appends payload.
//!
//! Truncation markers are bookkeeping and are not charged against the budget.
//! [`strip_markers`] recovers the payload from assembled text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::core::budgeter::TokenCounter;
use crate::core::model::{ChangeType, DiffFile, DiffHunk, GitDiff};

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\.\.\. \(truncated: (\d+) (files|hunks) skipped(?: in (.+))?, reason: (size limit|file limit)\)$",
    )
    .expect("marker regex is valid")
});

/// Why content was left out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    /// The token budget ran out
    SizeLimit,
    /// Acquisition stopped at its file bound
    FileLimit,
}

impl TruncationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TruncationReason::SizeLimit => "size limit",
            TruncationReason::FileLimit => "file limit",
        }
    }
}

impl fmt::Display for TruncationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line standing in for omitted content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TruncationMarker {
    Files {
        skipped: usize,
        reason: TruncationReason,
    },
    Hunks {
        skipped: usize,
        path: String,
        reason: TruncationReason,
    },
}

impl TruncationMarker {
    /// Recover a marker from one line of assembled text
    pub fn parse(line: &str) -> Option<Self> {
        let caps = MARKER.captures(line.trim_end_matches('\r'))?;
        let skipped = caps[1].parse().ok()?;
        let reason = match &caps[4] {
            "file limit" => TruncationReason::FileLimit,
            _ => TruncationReason::SizeLimit,
        };

        match (&caps[2], caps.get(3)) {
            ("files", None) => Some(TruncationMarker::Files { skipped, reason }),
            ("hunks", Some(path)) => Some(TruncationMarker::Hunks {
                skipped,
                path: path.as_str().to_string(),
                reason,
            }),
            _ => None,
        }
    }

    pub fn skipped(&self) -> usize {
        match self {
            TruncationMarker::Files { skipped, .. } | TruncationMarker::Hunks { skipped, .. } => {
                *skipped
            }
        }
    }
}

impl fmt::Display for TruncationMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TruncationMarker::Files { skipped, reason } => {
                write!(f, "... (truncated: {skipped} files skipped, reason: {reason})")
            }
            TruncationMarker::Hunks {
                skipped,
                path,
                reason,
            } => write!(
                f,
                "... (truncated: {skipped} hunks skipped in {path}, reason: {reason})"
            ),
        }
    }
}

/// Assembled text plus what was kept and what was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledContext {
    pub text: String,

    /// Budget consumed by header, file headers and hunks
    pub payload_tokens: usize,

    /// Files whose header made it into the text
    pub files_rendered: usize,
    pub files_skipped: usize,
    pub hunks_skipped: usize,
    pub markers: Vec<TruncationMarker>,
}

impl AssembledContext {
    pub fn is_truncated(&self) -> bool {
        !self.markers.is_empty()
    }
}

/// Pack `diff` into at most `max_tokens` of payload as measured by `counter`
pub fn assemble(diff: &GitDiff, counter: &dyn TokenCounter, max_tokens: usize) -> String {
    assemble_context(diff, counter, max_tokens).text
}

/// Like [`assemble`], also reporting what was truncated
pub fn assemble_context(
    diff: &GitDiff,
    counter: &dyn TokenCounter,
    max_tokens: usize,
) -> AssembledContext {
    let header = render_header(diff);
    let mut used = counter.count(&header);

    let mut out = AssembledContext {
        text: header,
        payload_tokens: 0,
        files_rendered: 0,
        files_skipped: 0,
        hunks_skipped: 0,
        markers: Vec::new(),
    };

    let files = diff.files();

    'files: for (index, file) in files.iter().enumerate() {
        let file_header = render_file_header(file);
        let cost = counter.count(&file_header);

        if used + cost > max_tokens {
            out.files_skipped = files.len() - index;
            out.markers.push(TruncationMarker::Files {
                skipped: out.files_skipped,
                reason: TruncationReason::SizeLimit,
            });
            break;
        }

        out.text.push_str(&file_header);
        used += cost;
        out.files_rendered += 1;

        if file.is_binary() {
            continue;
        }

        let hunks = file.hunks();
        for (hunk_index, hunk) in hunks.iter().enumerate() {
            let piece = format!("\n{}", render_hunk(hunk));
            let cost = counter.count(&piece);

            if used + cost > max_tokens {
                out.hunks_skipped = hunks.len() - hunk_index;
                out.markers.push(TruncationMarker::Hunks {
                    skipped: out.hunks_skipped,
                    path: file.path().to_string(),
                    reason: TruncationReason::SizeLimit,
                });

                out.files_skipped = files.len() - index - 1;
                if out.files_skipped > 0 {
                    out.markers.push(TruncationMarker::Files {
                        skipped: out.files_skipped,
                        reason: TruncationReason::SizeLimit,
                    });
                }
                break 'files;
            }

            out.text.push_str(&piece);
            used += cost;
        }
    }

    if diff.omitted_files() > 0 {
        out.markers.push(TruncationMarker::Files {
            skipped: diff.omitted_files(),
            reason: TruncationReason::FileLimit,
        });
    }

    for marker in &out.markers {
        out.text.push('\n');
        out.text.push_str(&marker.to_string());
    }

    out.payload_tokens = used;
    debug!(
        used,
        max_tokens,
        files_rendered = out.files_rendered,
        files_skipped = out.files_skipped,
        "context assembled"
    );
    out
}

/// Fixed summary block opening every context
pub fn render_header(diff: &GitDiff) -> String {
    [
        format!("Repository: {}", diff.repository.as_deref().unwrap_or("unknown")),
        format!("Source Branch: {}", diff.source_ref.as_deref().unwrap_or("unknown")),
        format!("Target Branch: {}", diff.target_ref),
        format!("Files Changed: {}", diff.total_files()),
        format!("Lines Added: {}", diff.total_additions()),
        format!("Lines Deleted: {}", diff.total_deletions()),
        String::new(),
        "=== FILE CHANGES ===".to_string(),
    ]
    .join("\n")
}

/// Per-file sub-header, including its leading newline
pub fn render_file_header(file: &DiffFile) -> String {
    let mut header = format!("\n--- {} ---", file.path());

    if file.change_type != ChangeType::Modified {
        header.push_str(&format!(" ({})", file.change_type));
    }
    if let Some(language) = &file.language {
        header.push_str(&format!(" [Language: {language}]"));
    }

    let stats = file.stats();
    header.push_str(&format!("\nStats: +{} -{}", stats.additions, stats.deletions));
    header
}

/// Hunk header followed by every line with its marker character
pub fn render_hunk(hunk: &DiffHunk) -> String {
    let mut out = hunk.header();
    for line in &hunk.lines {
        out.push('\n');
        out.push_str(&line.render());
    }
    out
}

/// Drop truncation marker lines, leaving the budgeted payload
pub fn strip_markers(text: &str) -> String {
    text.split('\n')
        .filter(|line| TruncationMarker::parse(line).is_none())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whole-file context: title, language, line count and fenced content
/// cut after `max_lines`
pub fn file_context(content: &str, path: &str, language: Option<&str>, max_lines: usize) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let fence = format!("```{}", language.unwrap_or(""));

    let mut parts = vec![format!("=== {path} ===")];
    if let Some(language) = language {
        parts.push(format!("Language: {language}"));
    }
    parts.push(format!("Total Lines: {}", lines.len()));
    parts.push(String::new());
    parts.push(fence);

    if lines.len() > max_lines {
        parts.extend(lines[..max_lines].iter().map(|l| l.to_string()));
        parts.push("...".to_string());
        parts.push(format!("(File truncated after {max_lines} lines)"));
    } else {
        parts.extend(lines.iter().map(|l| l.to_string()));
    }
    parts.push("```".to_string());

    parts.join("\n")
}
