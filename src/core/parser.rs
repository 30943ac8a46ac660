//! Unified-diff parser
//!
//! Turns `git diff` output (one file or a multi-file stream) into
//! [`DiffFile`] values. Parsing is total: malformed sections are dropped
//! and undecodable ones are downgraded to binary, each leaving a
//! [`ParseWarning`] behind instead of failing the batch.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::classify::detect_language;
use crate::core::model::{ChangeType, DiffFile, DiffHunk, DiffLine, LineKind};

/// `@@ -<old_start>[,<old_count>] +<new_start>[,<new_count>] @@[ <section>]`
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@(?:\s+(.*))?$")
        .expect("hunk header pattern compiles")
});

const FILE_HEADER: &[u8] = b"diff --git ";

/// A locally recovered problem with one section of the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// File the warning concerns, when it could be identified
    pub path: Option<String>,

    /// Byte offset into the raw input
    pub offset: usize,

    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{path} (byte {}): {}", self.offset, self.message),
            None => write!(f, "byte {}: {}", self.offset, self.message),
        }
    }
}

/// Files parsed from one input plus the warnings raised along the way
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub files: Vec<DiffFile>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse a multi-file unified diff, discarding warnings
pub fn parse(raw: &str) -> Vec<DiffFile> {
    parse_bytes(raw.as_bytes()).files
}

/// Parse a multi-file unified diff
pub fn parse_with_warnings(raw: &str) -> ParseOutput {
    parse_bytes(raw.as_bytes())
}

/// Parse raw diff bytes. Sections that are not valid UTF-8 are decoded
/// lossily for their headers and the resulting file is marked binary.
pub fn parse_bytes(raw: &[u8]) -> ParseOutput {
    let mut out = ParseOutput::default();

    for (offset, bytes) in split_sections(raw) {
        let (text, invalid_at) = match std::str::from_utf8(bytes) {
            Ok(text) => (Cow::Borrowed(text), None),
            Err(e) => (String::from_utf8_lossy(bytes), Some(offset + e.valid_up_to())),
        };

        let Some(mut file) = parse_section(&text, offset, &mut out.warnings) else {
            if !text.trim().is_empty() {
                warn!(offset, "dropping diff section without file paths");
                out.warnings.push(ParseWarning {
                    path: None,
                    offset,
                    message: "section has no identifiable old or new path".to_string(),
                });
            }
            continue;
        };

        if let Some(at) = invalid_at {
            warn!(path = file.path(), offset = at, "undecodable diff content, treating as binary");
            file.mark_binary();
            out.warnings.push(ParseWarning {
                path: Some(file.path().to_string()),
                offset: at,
                message: "diff content is not valid UTF-8; treated as binary".to_string(),
            });
        }

        out.files.push(file);
    }

    out
}

/// Parse the diff of a single, already identified file.
///
/// Returns `None` when the input holds no parseable section, e.g. when
/// whitespace-insensitive comparison left nothing to show. If the input
/// unexpectedly holds several sections, the one matching `path` wins.
pub fn parse_one(raw: &[u8], path: &str) -> (Option<DiffFile>, Vec<ParseWarning>) {
    let ParseOutput { mut files, warnings } = parse_bytes(raw);

    if files.len() > 1 {
        debug!(path, sections = files.len(), "single-file diff held several sections");
    }

    let idx = files
        .iter()
        .position(|f| f.path() == path || f.old_path.as_deref() == Some(path))
        .unwrap_or(0);

    if files.is_empty() {
        (None, warnings)
    } else {
        (Some(files.swap_remove(idx)), warnings)
    }
}

/// Split on `diff --git` lines, yielding (byte offset, section bytes).
/// Text before the first marker forms its own section, which covers plain
/// `---`/`+++` diffs without git headers.
fn split_sections(raw: &[u8]) -> Vec<(usize, &[u8])> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in raw.split_inclusive(|b| *b == b'\n') {
        if line.starts_with(FILE_HEADER) && offset > start {
            sections.push((start, &raw[start..offset]));
            start = offset;
        }
        offset += line.len();
    }

    if offset > start {
        sections.push((start, &raw[start..offset]));
    }

    sections
}

/// Metadata collected from the lines preceding the first hunk
#[derive(Debug, Default)]
struct SectionHeader {
    git_old: Option<String>,
    git_new: Option<String>,

    /// `Some(None)` records an explicit `/dev/null`
    minus: Option<Option<String>>,
    plus: Option<Option<String>>,

    rename_from: Option<String>,
    rename_to: Option<String>,
    copy_from: Option<String>,
    copy_to: Option<String>,

    new_file: bool,
    deleted_file: bool,
    binary: bool,

    old_mode: Option<String>,
    new_mode: Option<String>,
    old_hash: Option<String>,
    new_hash: Option<String>,
    similarity: Option<u8>,
}

impl SectionHeader {
    fn read(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            let (old, new) = split_git_paths(rest);
            self.git_old = old;
            self.git_new = new;
        } else if let Some(rest) = line.strip_prefix("--- ") {
            self.minus = Some(clean_path(rest, "a/"));
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            self.plus = Some(clean_path(rest, "b/"));
        } else if let Some(mode) = line.strip_prefix("new file mode ") {
            self.new_file = true;
            self.new_mode = Some(mode.trim().to_string());
        } else if let Some(mode) = line.strip_prefix("deleted file mode ") {
            self.deleted_file = true;
            self.old_mode = Some(mode.trim().to_string());
        } else if let Some(mode) = line.strip_prefix("old mode ") {
            self.old_mode = Some(mode.trim().to_string());
        } else if let Some(mode) = line.strip_prefix("new mode ") {
            self.new_mode = Some(mode.trim().to_string());
        } else if let Some(pct) = line.strip_prefix("similarity index ") {
            self.similarity = pct.trim().trim_end_matches('%').parse().ok();
        } else if let Some(p) = line.strip_prefix("rename from ") {
            self.rename_from = Some(unquote(p.trim_end()).into_owned());
        } else if let Some(p) = line.strip_prefix("rename to ") {
            self.rename_to = Some(unquote(p.trim_end()).into_owned());
        } else if let Some(p) = line.strip_prefix("copy from ") {
            self.copy_from = Some(unquote(p.trim_end()).into_owned());
        } else if let Some(p) = line.strip_prefix("copy to ") {
            self.copy_to = Some(unquote(p.trim_end()).into_owned());
        } else if let Some(rest) = line.strip_prefix("index ") {
            self.read_index(rest);
        } else if let Some(rest) = line.strip_prefix("Binary files ") {
            self.binary = true;
            if let Some((old, new)) = rest.trim_end_matches(" differ").split_once(" and ") {
                if self.minus.is_none() {
                    self.minus = Some(clean_path(old, "a/"));
                }
                if self.plus.is_none() {
                    self.plus = Some(clean_path(new, "b/"));
                }
            }
        } else if line.starts_with("GIT binary patch") {
            self.binary = true;
        }
    }

    /// `index <old>..<new>[ <mode>]`
    fn read_index(&mut self, rest: &str) {
        let mut parts = rest.split_whitespace();
        if let Some((old, new)) = parts.next().and_then(|ids| ids.split_once("..")) {
            self.old_hash = Some(old.to_string());
            self.new_hash = Some(new.to_string());
        }
        if let Some(mode) = parts.next() {
            self.old_mode.get_or_insert_with(|| mode.to_string());
            self.new_mode.get_or_insert_with(|| mode.to_string());
        }
    }

    fn change_type(&self) -> ChangeType {
        if self.new_file || matches!(self.minus, Some(None)) {
            ChangeType::Added
        } else if self.deleted_file || matches!(self.plus, Some(None)) {
            ChangeType::Deleted
        } else if self.rename_from.is_some() || self.rename_to.is_some() {
            ChangeType::Renamed
        } else if self.copy_from.is_some() || self.copy_to.is_some() {
            ChangeType::Copied
        } else {
            ChangeType::Modified
        }
    }

    fn into_file(self) -> Option<DiffFile> {
        let change_type = self.change_type();

        let old_path = match (change_type, self.minus) {
            (ChangeType::Added, _) => None,
            (_, Some(p)) => p,
            (_, None) => self.rename_from.or(self.copy_from).or(self.git_old),
        };
        let new_path = match (change_type, self.plus) {
            (ChangeType::Deleted, _) => None,
            (_, Some(p)) => p,
            (_, None) => self.rename_to.or(self.copy_to).or(self.git_new),
        };

        if old_path.is_none() && new_path.is_none() {
            return None;
        }

        let mut file = DiffFile::new(old_path, new_path, change_type);
        file.old_mode = self.old_mode;
        file.new_mode = self.new_mode;
        file.old_hash = self.old_hash;
        file.new_hash = self.new_hash;
        file.similarity = self.similarity;
        file.language = detect_language(file.path()).map(str::to_string);
        if self.binary {
            file.mark_binary();
        }
        Some(file)
    }
}

/// Parse one file section; `None` when no path can be identified
fn parse_section(
    text: &str,
    base_offset: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Option<DiffFile> {
    let mut header = SectionHeader::default();
    let mut rows = lines_with_offsets(text).peekable();

    while let Some(&(_, line)) = rows.peek() {
        if HUNK_HEADER.is_match(line) {
            break;
        }
        header.read(line);
        rows.next();
        if header.binary {
            break;
        }
    }

    let binary = header.binary;
    let mut file = header.into_file()?;

    if !binary {
        let hunks = parse_hunks(rows, base_offset, file.path(), warnings);
        file.set_hunks(hunks);
    }

    Some(file)
}

/// Hunk under construction with its running line cursors
struct OpenHunk {
    hunk: DiffHunk,
    old_line: usize,
    new_line: usize,
    old_left: usize,
    new_left: usize,
}

impl OpenHunk {
    fn start(hunk: DiffHunk) -> Self {
        Self {
            old_line: hunk.old_start,
            new_line: hunk.new_start,
            old_left: hunk.old_count,
            new_left: hunk.new_count,
            hunk,
        }
    }

    fn is_complete(&self) -> bool {
        self.old_left == 0 && self.new_left == 0
    }

    /// Append a row, advancing only the cursors of the sides it belongs to
    fn push(&mut self, kind: LineKind, content: &str) -> bool {
        let line = match kind {
            LineKind::Context if self.old_left > 0 && self.new_left > 0 => {
                let line = DiffLine::context(self.old_line, self.new_line, content);
                self.old_line += 1;
                self.new_line += 1;
                self.old_left -= 1;
                self.new_left -= 1;
                line
            }
            LineKind::Deletion if self.old_left > 0 => {
                let line = DiffLine::deletion(self.old_line, content);
                self.old_line += 1;
                self.old_left -= 1;
                line
            }
            LineKind::Addition if self.new_left > 0 => {
                let line = DiffLine::addition(self.new_line, content);
                self.new_line += 1;
                self.new_left -= 1;
                line
            }
            _ => return false,
        };
        self.hunk.lines.push(line);
        true
    }
}

fn parse_hunks<'a>(
    rows: impl Iterator<Item = (usize, &'a str)>,
    base_offset: usize,
    path: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let mut open: Option<OpenHunk> = None;

    for (offset, line) in rows {
        if let Some(hunk) = parse_hunk_header(line) {
            hunks.extend(open.take().map(|o| o.hunk));
            open = Some(OpenHunk::start(hunk));
            continue;
        }

        let Some(cur) = open.as_mut() else {
            continue;
        };

        // "\ No newline at end of file"
        if line.starts_with('\\') {
            continue;
        }

        if cur.is_complete() {
            debug!(path, offset = base_offset + offset, "ignoring text after complete hunk");
            continue;
        }

        let mut chars = line.chars();
        let (kind, content) = match chars.next() {
            Some(c) => match LineKind::from_marker(c) {
                Some(kind) => (kind, chars.as_str()),
                None => {
                    warnings.push(ParseWarning {
                        path: Some(path.to_string()),
                        offset: base_offset + offset,
                        message: format!("unexpected line in hunk: {line:?}"),
                    });
                    continue;
                }
            },
            // Some tools strip the single space of empty context lines
            None => (LineKind::Context, ""),
        };

        if !cur.push(kind, content) {
            warnings.push(ParseWarning {
                path: Some(path.to_string()),
                offset: base_offset + offset,
                message: format!(
                    "line exceeds hunk range {}",
                    cur.hunk.header()
                ),
            });
        }
    }

    hunks.extend(open.map(|o| o.hunk));
    hunks
}

/// Parse a hunk header into an empty hunk. Missing counts default to 1.
pub fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let caps = HUNK_HEADER.captures(line)?;
    let num = |i: usize, default: usize| -> Option<usize> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    Some(DiffHunk {
        old_start: num(1, 0)?,
        old_count: num(2, 1)?,
        new_start: num(3, 0)?,
        new_count: num(4, 1)?,
        section_header: caps
            .get(5)
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        lines: Vec::new(),
    })
}

/// Lines without their `\n`, paired with their byte offset in `text`
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_inclusive('\n').scan(0, |offset, raw| {
        let at = *offset;
        *offset += raw.len();
        Some((at, raw.strip_suffix('\n').unwrap_or(raw)))
    })
}

/// Split `a/<old> b/<new>` from a `diff --git` line.
///
/// Paths may contain spaces, so the symmetric split is tried first. Quoted
/// paths are split on their closing quote.
fn split_git_paths(rest: &str) -> (Option<String>, Option<String>) {
    let rest = rest.trim_end();

    if (rest.starts_with('"') || rest.ends_with('"'))
        && let Some((old, new)) = split_quoted(rest)
    {
        return (Some(strip(old, "a/")), Some(strip(new, "b/")));
    }

    if rest.len() % 2 == 1 {
        let mid = rest.len() / 2;
        if rest.is_char_boundary(mid) && rest.as_bytes()[mid] == b' ' {
            let (old_s, new_s) = (strip(&rest[..mid], "a/"), strip(&rest[mid + 1..], "b/"));
            if old_s == new_s {
                return (Some(old_s), Some(new_s));
            }
        }
    }

    match rest.find(" b/") {
        Some(idx) => (
            Some(strip(&rest[..idx], "a/")),
            Some(strip(&rest[idx + 1..], "b/")),
        ),
        None => (None, None),
    }
}

/// Split two space-separated tokens where either may be a quoted string
fn split_quoted(rest: &str) -> Option<(&str, &str)> {
    if rest.starts_with('"') {
        let end = closing_quote(rest)?;
        let (old, tail) = rest.split_at(end + 1);
        return Some((old, tail.strip_prefix(' ')?));
    }
    // Only the new side is quoted
    let start = rest.find(" \"")?;
    Some((&rest[..start], &rest[start + 1..]))
}

/// Byte index of the quote closing the one at index 0
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, b) in s.bytes().enumerate().skip(1) {
        match b {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Normalize a `---`/`+++` path: drop timestamps, quotes, and the side prefix
fn clean_path(raw: &str, prefix: &str) -> Option<String> {
    let raw = if raw.starts_with('"') {
        closing_quote(raw).map_or(raw, |end| &raw[..=end])
    } else {
        raw.split('\t').next().unwrap_or(raw)
    };
    let raw = raw.trim_end();
    if raw == "/dev/null" {
        None
    } else {
        Some(strip(raw, prefix))
    }
}

fn strip(path: &str, prefix: &str) -> String {
    let path = unquote(path);
    path.strip_prefix(prefix)
        .map(str::to_string)
        .unwrap_or_else(|| path.to_string())
}

/// Undo git's C-style path quoting (`"caf\303\251.py"` is `café.py`)
fn unquote(s: &str) -> Cow<'_, str> {
    let Some(inner) = s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return Cow::Borrowed(s);
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.bytes().peekable();
    while let Some(b) = rest.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match rest.next() {
            Some(d @ b'0'..=b'7') => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match rest.peek() {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            rest.next();
                        }
                        _ => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b't') => bytes.push(b'\t'),
            Some(b'n') => bytes.push(b'\n'),
            Some(b'v') => bytes.push(0x0b),
            Some(b'f') => bytes.push(0x0c),
            Some(b'r') => bytes.push(b'\r'),
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }

    Cow::Owned(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODIFIED: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
index 1111111..2222222 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,4 @@ pub mod a;
 line one
-line two
+line 2
+line 2.5
 line three
@@ -20 +21,2 @@
 tail
+more
";

    #[test]
    fn parses_header_metadata_and_hunks() {
        let files = parse(MODIFIED);
        assert_eq!(files.len(), 1);
        let f = &files[0];
        assert_eq!(f.change_type, ChangeType::Modified);
        assert_eq!(f.old_path.as_deref(), Some("src/lib.rs"));
        assert_eq!(f.new_path.as_deref(), Some("src/lib.rs"));
        assert_eq!(f.old_hash.as_deref(), Some("1111111"));
        assert_eq!(f.new_mode.as_deref(), Some("100644"));
        assert_eq!(f.language.as_deref(), Some("rust"));
        assert_eq!(f.hunks().len(), 2);
        assert_eq!(f.stats().additions, 3);
        assert_eq!(f.stats().deletions, 1);

        let h = &f.hunks()[0];
        assert_eq!(h.section_header.as_deref(), Some("pub mod a;"));
        assert_eq!(h.header(), "@@ -1,3 +1,4 @@ pub mod a;");
        assert_eq!(h.lines[1], DiffLine::deletion(2, "line two"));
        assert_eq!(h.lines[2], DiffLine::addition(2, "line 2"));
        assert_eq!(h.lines[4], DiffLine::context(3, 4, "line three"));

        let h2 = &f.hunks()[1];
        assert_eq!((h2.old_start, h2.old_count), (20, 1));
        assert_eq!(h2.header(), "@@ -20 +21,2 @@");
        assert_eq!(h2.lines[0], DiffLine::context(20, 21, "tail"));
        assert_eq!(h2.lines[1], DiffLine::addition(22, "more"));
    }

    #[test]
    fn detects_added_and_deleted_files() {
        let raw = "\
diff --git a/new.py b/new.py
new file mode 100644
index 0000000..abcdef0
--- /dev/null
+++ b/new.py
@@ -0,0 +1,2 @@
+import os
+print(os)
diff --git a/gone.txt b/gone.txt
deleted file mode 100644
index abcdef0..0000000
--- a/gone.txt
+++ /dev/null
@@ -1 +0,0 @@
-bye
";
        let files = parse(raw);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].change_type, ChangeType::Added);
        assert!(files[0].old_path.is_none());
        assert!(files[0].is_new_file());
        assert_eq!(files[0].hunks()[0].lines[1], DiffLine::addition(2, "print(os)"));
        assert_eq!(files[1].change_type, ChangeType::Deleted);
        assert!(files[1].new_path.is_none());
        assert_eq!(files[1].path(), "gone.txt");
        assert_eq!(files[1].stats().deletions, 1);
    }

    #[test]
    fn pure_rename_has_zero_hunks() {
        let raw = "\
diff --git a/old name.rs b/new name.rs
similarity index 100%
rename from old name.rs
rename to new name.rs
";
        let files = parse(raw);
        assert_eq!(files.len(), 1);
        let f = &files[0];
        assert_eq!(f.change_type, ChangeType::Renamed);
        assert_eq!(f.old_path.as_deref(), Some("old name.rs"));
        assert_eq!(f.new_path.as_deref(), Some("new name.rs"));
        assert_eq!(f.similarity, Some(100));
        assert!(f.hunks().is_empty());
    }

    #[test]
    fn mode_change_uses_git_header_paths() {
        let raw = "\
diff --git a/run.sh b/run.sh
old mode 100644
new mode 100755
";
        let f = &parse(raw)[0];
        assert_eq!(f.change_type, ChangeType::Modified);
        assert_eq!(f.path(), "run.sh");
        assert_eq!(f.old_mode.as_deref(), Some("100644"));
        assert_eq!(f.new_mode.as_deref(), Some("100755"));
    }

    #[test]
    fn binary_marker_skips_hunks() {
        let raw = "\
diff --git a/logo.png b/logo.png
new file mode 100644
index 0000000..1234567
Binary files /dev/null and b/logo.png differ
";
        let f = &parse(raw)[0];
        assert!(f.is_binary());
        assert!(f.hunks().is_empty());
        assert_eq!(f.change_type, ChangeType::Added);
        assert_eq!(f.path(), "logo.png");
    }

    #[test]
    fn invalid_utf8_downgrades_to_binary() {
        let mut raw = b"diff --git a/data.txt b/data.txt\n--- a/data.txt\n+++ b/data.txt\n@@ -1 +1 @@\n-".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe, b'\n']);
        raw.extend_from_slice(b"+ok\n");

        let out = parse_bytes(&raw);
        assert_eq!(out.files.len(), 1);
        assert!(out.files[0].is_binary());
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].offset, 76);
    }

    #[test]
    fn headerless_sections_are_dropped() {
        let out = parse_with_warnings("garbage line\nmore garbage\n");
        assert!(out.files.is_empty());
        assert_eq!(out.warnings.len(), 1);
        assert!(parse("").is_empty());
    }

    #[test]
    fn trailing_signature_is_not_a_deletion() {
        let raw = "\
--- a/x.txt
+++ b/x.txt
@@ -1 +1 @@
-a
+b
--
2.43.0
";
        let f = &parse(raw)[0];
        assert_eq!(f.stats().deletions, 1);
        assert_eq!(f.stats().additions, 1);
    }

    #[test]
    fn no_newline_marker_is_skipped() {
        let raw = "\
--- a/x.txt
+++ b/x.txt
@@ -1 +1 @@
-a
\\ No newline at end of file
+b
\\ No newline at end of file
";
        let f = &parse(raw)[0];
        assert_eq!(f.hunks()[0].lines.len(), 2);
    }

    #[test]
    fn parse_one_picks_matching_path() {
        let (file, warnings) = parse_one(MODIFIED.as_bytes(), "src/lib.rs");
        assert!(warnings.is_empty());
        assert_eq!(file.map(|f| f.path().to_string()).as_deref(), Some("src/lib.rs"));

        let (none, _) = parse_one(b"", "src/lib.rs");
        assert!(none.is_none());
    }

    #[test]
    fn quoted_paths_are_decoded() {
        let raw = "\
diff --git \"a/caf\\303\\251.py\" \"b/caf\\303\\251.py\"
index 1111111..2222222 100644
--- \"a/caf\\303\\251.py\"
+++ \"b/caf\\303\\251.py\"
@@ -1 +1 @@
-print('a')
+print('b')
";
        let f = &parse(raw)[0];
        assert_eq!(f.path(), "café.py");
        assert_eq!(f.old_path.as_deref(), Some("café.py"));
        assert_eq!(f.language.as_deref(), Some("python"));

        let (picked, _) = parse_one(raw.as_bytes(), "café.py");
        assert_eq!(picked.map(|f| f.path().to_string()).as_deref(), Some("café.py"));
    }

    #[test]
    fn quoted_rename_headers_and_escapes() {
        let raw = "\
diff --git a/plain.txt \"b/tab\\there.txt\"
similarity index 100%
rename from plain.txt
rename to \"tab\\there.txt\"
";
        let f = &parse(raw)[0];
        assert_eq!(f.change_type, ChangeType::Renamed);
        assert_eq!(f.old_path.as_deref(), Some("plain.txt"));
        assert_eq!(f.new_path.as_deref(), Some("tab\there.txt"));

        assert_eq!(unquote(r#""say \"hi\"\\n""#), "say \"hi\"\\n");
        assert_eq!(unquote("no quotes"), "no quotes");
    }

    #[test]
    fn hunk_header_defaults_counts() {
        let h = parse_hunk_header("@@ -5 +7 @@").unwrap();
        assert_eq!((h.old_start, h.old_count, h.new_start, h.new_count), (5, 1, 7, 1));
        assert!(h.section_header.is_none());
        assert!(parse_hunk_header("@@ bogus @@").is_none());
    }
}
