//! Path-based file classification: language tag and binary verdict.
//!
//! Pure lookups over static tables. Unknown extensions yield no language
//! and default to text; a reviewable file wrongly skipped costs more than
//! a binary file wrongly attempted.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

/// Result of classifying one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileClass {
    pub language: Option<&'static str>,
    pub likely_binary: bool,
}

/// Filenames recognized regardless of extension (compared lowercased)
const SPECIAL_FILENAMES: &[(&str, &str)] = &[
    ("dockerfile", "dockerfile"),
    ("makefile", "makefile"),
    ("gnumakefile", "makefile"),
    ("gemfile", "gemfile"),
    ("rakefile", "rakefile"),
    ("vagrantfile", "vagrantfile"),
    ("cmakelists.txt", "cmake"),
    ("justfile", "just"),
];

pub fn classify(path: &str) -> FileClass {
    FileClass {
        language: detect_language(path),
        likely_binary: is_likely_binary(path),
    }
}

/// Detect the language of `path` from its filename, then its extension
pub fn detect_language(path: &str) -> Option<&'static str> {
    if path.is_empty() {
        return None;
    }

    let p = Path::new(path);

    if let Some(name) = p.file_name() {
        let name = name.to_string_lossy().to_lowercase();
        if let Some((_, lang)) = SPECIAL_FILENAMES.iter().find(|(n, _)| *n == name.as_str()) {
            return Some(*lang);
        }
    }

    language_for_extension(&extension(p)?)
}

/// Whether the extension marks `path` as a binary format
pub fn is_likely_binary(path: &str) -> bool {
    extension(Path::new(path)).is_some_and(|ext| is_binary_extension(&ext))
}

/// Count languages across `paths`, most frequent first (ties by name)
pub fn language_counts<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<(&'static str, usize)> {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for path in paths {
        if let Some(lang) = detect_language(path) {
            *counts.entry(lang).or_default() += 1;
        }
    }

    let mut out: Vec<_> = counts.into_iter().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    out
}

fn extension(p: &Path) -> Option<String> {
    p.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn language_for_extension(ext: &str) -> Option<&'static str> {
    let lang = match ext {
        "py" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cxx" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "go" => "go",
        "rs" => "rust",
        "php" => "php",
        "sh" | "bash" => "bash",
        "zsh" => "zsh",
        "fish" => "fish",
        "ps1" => "powershell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "sass" => "sass",
        "less" => "less",
        "xml" => "xml",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "ini" | "cfg" => "ini",
        "conf" => "config",
        "md" | "markdown" => "markdown",
        "rst" => "rst",
        "txt" => "text",
        "log" => "log",
        "dockerfile" => "dockerfile",
        "r" => "r",
        "m" => "matlab",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "pl" => "perl",
        "lua" => "lua",
        "vim" => "vim",
        "ex" | "exs" => "elixir",
        "erl" | "hrl" => "erlang",
        "clj" | "cljs" => "clojure",
        "hs" => "haskell",
        "elm" => "elm",
        "dart" => "dart",
        "groovy" => "groovy",
        "gradle" => "gradle",
        "mk" => "makefile",
        "cmake" => "cmake",
        _ => return None,
    };
    Some(lang)
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        // images
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tiff" | "svg" | "ico" | "webp"
        // archives
        | "zip" | "tar" | "gz" | "bz2" | "7z" | "rar" | "xz"
        // executables and libraries
        | "exe" | "dll" | "so" | "dylib" | "bin" | "app"
        // documents
        | "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx"
        // media
        | "mp3" | "mp4" | "avi" | "mov" | "wav" | "flac" | "ogg"
        // fonts
        | "ttf" | "otf" | "woff" | "woff2" | "eot"
        // compiled objects
        | "class" | "jar" | "war" | "ear" | "pyc" | "pyo" | "o" | "obj"
    )
}
