//! **diffpack** - Turn a git diff into a token-budgeted context for LLM code review
//!
//! Acquires per-file unified diffs from git, parses them into a structured model and
//! packs that model greedily into a bounded text with parseable truncation markers.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - acquisition, parsing and budgeted assembly
pub mod core {
    /// Files, hunks, lines and whole-changeset totals
    pub mod model;
    pub use model::{ChangeType, DiffFile, DiffHunk, DiffLine, DiffStats, DiffSummary, GitDiff, LineKind};

    /// Language tags and binary verdicts from paths
    pub mod classify;
    pub use classify::{FileClass, classify, detect_language, is_likely_binary};

    /// Unified-diff text to structured model, with recoverable warnings
    pub mod parser;
    pub use parser::{ParseOutput, ParseWarning, parse, parse_bytes};

    /// Version-control capability, the git CLI backend and the acquirer
    pub mod git;
    pub use git::{
        AcquireOptions, Acquirer, Acquisition, ChangedPath, DiffError, DiffRange, GitCli, VcsSource,
        acquire,
    };

    /// Include/exclude glob filtering of candidate paths
    pub mod filter;
    pub use filter::PathFilter;

    /// Token counters (tiktoken with moka caching, character heuristics)
    pub mod budgeter;
    pub use budgeter::{ApproxCounter, Budgeter, CharCounter, CounterKind, TokenCounter, counter_for};

    /// Greedy budgeted context assembly and whole-file context
    pub mod assemble;
    pub use assemble::{AssembledContext, TruncationMarker, TruncationReason, assemble, assemble_context};

    /// `pack`, `stats` and `file` command runners
    pub mod pack;
    pub use pack::{file_run, run as pack_run, stats_run};
}

/// Infrastructure - configuration and logging
pub mod infra {
    /// Layered configuration (file + DIFFPACK_* environment)
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Tracing subscriber setup
    pub mod logging;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::{file_run, pack_run, stats_run};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use core::{
    AssembledContext, DiffError, DiffFile, DiffHunk, DiffLine, GitDiff, TokenCounter, assemble,
    parse,
};
