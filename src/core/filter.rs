//! Include/exclude filtering of candidate paths before diffs are fetched.
//!
//! Exclude globs are checked first; when any include glob is set a path
//! must match one of them. `*` also crosses `/`, the way shell-style
//! `fnmatch` patterns behave.

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::core::classify::is_likely_binary;
use crate::core::git::DiffError;

#[derive(Debug, Clone)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: GlobSet,
    skip_binary: bool,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self {
            include: None,
            exclude: GlobSet::empty(),
            skip_binary: false,
        }
    }
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, DiffError> {
        let include = if include.is_empty() {
            None
        } else {
            Some(build_set(include)?)
        };

        Ok(Self {
            include,
            exclude: build_set(exclude)?,
            skip_binary: false,
        })
    }

    /// Also reject paths the classifier considers binary
    pub fn with_skip_binary(mut self, skip: bool) -> Self {
        self.skip_binary = skip;
        self
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.exclude.is_match(path) {
            return false;
        }
        if self.skip_binary && is_likely_binary(path) {
            return false;
        }
        match &self.include {
            Some(set) => set.is_match(path),
            None => true,
        }
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet, DiffError> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| DiffError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }

    builder.build().map_err(|source| DiffError::InvalidPattern {
        pattern: patterns.join(","),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let f = PathFilter::default();
        assert!(f.matches("src/main.rs"));
        assert!(f.matches("logo.png"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let f = PathFilter::new(&strings(&["*.rs"]), &strings(&["src/generated/*"])).unwrap();
        assert!(f.matches("src/lib.rs"));
        assert!(!f.matches("src/generated/api.rs"));
        assert!(!f.matches("README.md"));
    }

    #[test]
    fn star_crosses_directories() {
        let f = PathFilter::new(&[], &strings(&["*.lock"])).unwrap();
        assert!(!f.matches("deep/nested/Cargo.lock"));
    }

    #[test]
    fn skip_binary_uses_classifier() {
        let f = PathFilter::default().with_skip_binary(true);
        assert!(!f.matches("assets/icon.png"));
        assert!(f.matches("src/lib.rs"));
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = PathFilter::new(&strings(&["src/[unclosed"]), &[]).unwrap_err();
        assert!(err.to_string().contains("src/[unclosed"));
    }
}
