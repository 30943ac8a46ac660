//! Shell completion scripts for `dpack`

use std::path::Path;
use std::{fs, io};

use anyhow::{Context, Result, bail};
use clap::CommandFactory;
use clap_complete::{Shell as CompletionShell, generate, generate_to};
use tracing::debug;

use crate::cli::{Cli, CompletionsArgs, Shell};

const BIN_NAME: &str = "dpack";

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

impl Shell {
    /// Shell named by a `$SHELL`-style path such as `/usr/bin/zsh`
    pub fn from_path(path: &str) -> Option<Self> {
        let name = Path::new(path).file_stem()?.to_str()?;
        match name {
            "bash" => Some(Shell::Bash),
            "zsh" => Some(Shell::Zsh),
            "fish" => Some(Shell::Fish),
            "pwsh" | "powershell" => Some(Shell::PowerShell),
            "elvish" => Some(Shell::Elvish),
            _ => None,
        }
    }
}

fn resolve_shell(explicit: Option<Shell>, env_shell: Option<&str>) -> Result<Shell> {
    if let Some(shell) = explicit {
        return Ok(shell);
    }
    match env_shell {
        Some(path) => Shell::from_path(path)
            .with_context(|| format!("Unsupported shell '{path}'; pass one explicitly")),
        None => bail!("$SHELL is not set; pass a shell explicitly"),
    }
}

pub fn run(args: CompletionsArgs) -> Result<()> {
    let env_shell = std::env::var("SHELL").ok();
    let shell = resolve_shell(args.shell, env_shell.as_deref())?;
    debug!(?shell, "generating completions");

    let mut cmd = Cli::command();
    let target: CompletionShell = shell.into();

    if args.stdout {
        generate(target, &mut cmd, BIN_NAME, &mut io::stdout());
        return Ok(());
    }

    let Some(dir) = args.out_dir else {
        bail!("--out-dir is required unless --stdout is set");
    };

    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = generate_to(target, &mut cmd, BIN_NAME, &dir)
        .with_context(|| format!("Failed to write {shell:?} completions"))?;

    eprintln!("Wrote completion to {}", path.display());
    Ok(())
}
