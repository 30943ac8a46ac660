use anyhow::Result;
use clap::Parser;
use diffpack::cli::{AppContext, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    diffpack::infra::logging::init(cli.verbose, cli.quiet);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color || std::env::var_os("NO_COLOR").is_some(),
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Pack(args) => diffpack::pack_run(args, &ctx),
        Commands::Stats(args) => diffpack::stats_run(args, &ctx),
        Commands::File(args) => diffpack::file_run(args, &ctx),
        Commands::Init(args) => diffpack::infra::config::init(args, &ctx),
        Commands::Completions(args) => diffpack::completion::run(args),
    }
}
