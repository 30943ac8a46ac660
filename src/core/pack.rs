//! Command runners: `pack`, `stats` and `file`.

use std::fmt::Display;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Style};
use serde::Serialize;
use tracing::warn;

use crate::cli::{AppContext, DiffArgs, FileArgs, PackArgs, StatsArgs};
use crate::core::assemble::{TruncationMarker, assemble_context, file_context};
use crate::core::budgeter::counter_for;
use crate::core::classify::{detect_language, language_counts};
use crate::core::filter::PathFilter;
use crate::core::git::{AcquireOptions, Acquirer, Acquisition, GitCli, VcsSource};
use crate::core::model::{ChangeType, DiffFile, DiffSummary, GitDiff};
use crate::core::parser::ParseWarning;
use crate::infra::config::{DiffConfig, load_config};

#[derive(Serialize)]
struct PackReport<'a> {
    context: &'a str,
    diff_summary: DiffSummary,
    budget: usize,
    payload_tokens: usize,
    candidates: usize,
    filtered_out: usize,
    omitted: usize,
    truncation: &'a [TruncationMarker],
    warnings: &'a [ParseWarning],
}

#[derive(Serialize)]
struct StatsReport<'a> {
    summary: DiffSummary,
    candidates: usize,
    filtered_out: usize,
    omitted: usize,
    warnings: &'a [ParseWarning],
    diff: &'a GitDiff,
}

pub fn run(args: PackArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let acquisition = acquire(&args.diff, &config.diff, ctx)?;

    let kind = args.counter.unwrap_or(config.context.counter);
    let model = args.model.as_deref().unwrap_or(&config.context.model);
    let counter = counter_for(kind, model)
        .with_context(|| format!("Failed to set up {kind:?} token counter"))?;
    let budget = args.budget.unwrap_or(config.context.max_tokens);

    let assembled = assemble_context(&acquisition.diff, counter.as_ref(), budget);

    let rendered = if args.json {
        let report = PackReport {
            context: &assembled.text,
            diff_summary: acquisition.diff.summary(),
            budget,
            payload_tokens: assembled.payload_tokens,
            candidates: acquisition.candidates,
            filtered_out: acquisition.filtered_out,
            omitted: acquisition.omitted,
            truncation: &assembled.markers,
            warnings: &acquisition.warnings,
        };
        serde_json::to_string_pretty(&report).context("Failed to serialize pack report")?
    } else {
        assembled.text.clone()
    };

    write_output(&rendered, args.output.as_deref())?;

    if args.clipboard {
        copy_to_clipboard(&rendered)?;
    }

    if !ctx.quiet {
        eprintln!(
            "{} Packed {} of {} files into {} / {} tokens{}",
            paint(ctx, "✓", Style::new().green()),
            assembled.files_rendered,
            acquisition.diff.total_files(),
            assembled.payload_tokens,
            budget,
            if assembled.is_truncated() {
                paint(ctx, " (truncated)", Style::new().yellow())
            } else {
                String::new()
            }
        );
    }

    Ok(())
}

pub fn stats_run(args: StatsArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let acquisition = acquire(&args.diff, &config.diff, ctx)?;

    if args.json {
        let report = StatsReport {
            summary: acquisition.diff.summary(),
            candidates: acquisition.candidates,
            filtered_out: acquisition.filtered_out,
            omitted: acquisition.omitted,
            warnings: &acquisition.warnings,
            diff: &acquisition.diff,
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize stats")?;
        println!("{json}");
        return Ok(());
    }

    print!("{}", render_stats(&acquisition, ctx));
    Ok(())
}

pub fn file_run(args: FileArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let timeout = args.timeout.unwrap_or(config.diff.timeout_secs);
    let git = GitCli::new(&args.repo).with_timeout(Duration::from_secs(timeout));

    let content = git
        .file_content(&args.reference, &args.path)
        .with_context(|| format!("Failed to read {} at {}", args.path, args.reference))?
        .ok_or_else(|| anyhow::anyhow!("'{}' does not exist at {}", args.path, args.reference))?;

    let max_lines = args.max_lines.unwrap_or(config.context.file_max_lines);
    let text = file_context(&content, &args.path, detect_language(&args.path), max_lines);

    println!("{text}");
    if !ctx.quiet && content.split('\n').count() > max_lines {
        eprintln!("{}", paint(ctx, format!("truncated after {max_lines} lines"), Style::new().yellow()));
    }
    Ok(())
}

/// Resolve flags against config and run the acquisition
pub fn acquire(args: &DiffArgs, cfg: &DiffConfig, ctx: &AppContext) -> Result<Acquisition> {
    let include = if args.include.is_empty() { &cfg.include } else { &args.include };
    let exclude = if args.exclude.is_empty() { &cfg.exclude } else { &args.exclude };
    let filter = PathFilter::new(include, exclude)?.with_skip_binary(args.skip_binary || cfg.skip_binary);

    let timeout = Duration::from_secs(args.timeout.unwrap_or(cfg.timeout_secs));
    let git = GitCli::new(&args.repo).with_timeout(timeout);
    let max_files = args.max_files.unwrap_or(cfg.max_files);
    let ignore_whitespace = args.ignore_whitespace.unwrap_or(cfg.ignore_whitespace);

    let progress = progress_bar(ctx);
    let acquirer = Acquirer::new(&git).with_progress(progress.clone());

    let result = if args.uncommitted {
        acquirer.acquire_uncommitted(max_files, ignore_whitespace, filter)
    } else {
        let target = args.target.clone().unwrap_or_else(|| cfg.target.clone());
        let opts = AcquireOptions::new(target)
            .source_ref(args.source.clone())
            .max_files(max_files)
            .ignore_whitespace(ignore_whitespace)
            .filter(filter);
        acquirer.acquire(&opts)
    };
    progress.finish_and_clear();

    let acquisition = result.context("Failed to collect diff")?;
    for warning in &acquisition.warnings {
        warn!(%warning, "diff section downgraded");
    }
    Ok(acquisition)
}

fn progress_bar(ctx: &AppContext) -> ProgressBar {
    if ctx.quiet {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn paint(ctx: &AppContext, text: impl Display, style: Style) -> String {
    if ctx.no_color {
        text.to_string()
    } else {
        text.style(style).to_string()
    }
}

fn change_letter(file: &DiffFile) -> &'static str {
    match file.change_type {
        ChangeType::Added => "A",
        ChangeType::Deleted => "D",
        ChangeType::Modified => "M",
        ChangeType::Renamed => "R",
        ChangeType::Copied => "C",
    }
}

/// Human-readable stats block
pub fn render_stats(acquisition: &Acquisition, ctx: &AppContext) -> String {
    let diff = &acquisition.diff;
    let summary = diff.summary();
    let mut out = String::new();

    out.push_str(&format!(
        "{} {}\n",
        paint(ctx, "Repository:", Style::new().bold()),
        diff.repository.as_deref().unwrap_or("unknown")
    ));
    out.push_str(&format!(
        "{} {} -> {}\n",
        paint(ctx, "Refs:", Style::new().bold()),
        diff.source_ref.as_deref().unwrap_or("unknown"),
        diff.target_ref
    ));
    out.push_str(&format!(
        "{} {} ({} new, {} deleted, {} modified, {} binary)\n",
        paint(ctx, "Files:", Style::new().bold()),
        summary.total_files,
        summary.new_files,
        summary.deleted_files,
        summary.modified_files,
        summary.binary_files
    ));
    out.push_str(&format!(
        "{} {} {} (net {:+})\n",
        paint(ctx, "Lines:", Style::new().bold()),
        paint(ctx, format!("+{}", summary.total_additions), Style::new().green()),
        paint(ctx, format!("-{}", summary.total_deletions), Style::new().red()),
        summary.net_change
    ));

    let languages = language_counts(diff.files().iter().map(DiffFile::path));
    if !languages.is_empty() {
        let list: Vec<String> = languages.iter().map(|(l, n)| format!("{l} {n}")).collect();
        out.push_str(&format!("{} {}\n", paint(ctx, "Languages:", Style::new().bold()), list.join(", ")));
    }

    if acquisition.filtered_out > 0 || acquisition.omitted > 0 {
        out.push_str(&format!(
            "{}\n",
            paint(
                ctx,
                format!("{} filtered out, {} omitted by file limit", acquisition.filtered_out, acquisition.omitted),
                Style::new().yellow()
            )
        ));
    }

    for file in diff.files() {
        let stats = file.stats();
        let detail = if file.is_binary() {
            paint(ctx, "binary", Style::new().dimmed())
        } else {
            format!(
                "{} {}",
                paint(ctx, format!("+{}", stats.additions), Style::new().green()),
                paint(ctx, format!("-{}", stats.deletions), Style::new().red())
            )
        };
        let path = match (&file.old_path, file.is_renamed()) {
            (Some(old), true) => format!("{old} -> {}", file.path()),
            _ => file.path().to_string(),
        };
        out.push_str(&format!("  {} {path}  {detail}\n", change_letter(file)));
    }

    out
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write to {}", path.display())),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

// Clipboard support
fn copy_to_clipboard(content: &str) -> Result<()> {
    let mut cb = arboard::Clipboard::new().context("clipboard init")?;
    cb.set_text(content.to_string()).context("clipboard set_text")?;
    Ok(())
}
