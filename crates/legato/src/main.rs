use anyhow::Result;
use clap::{Parser, Subcommand};

mod cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(if cli.verbose { "debug" } else { "info" });
    match cli.command {
        Command::Check(args) => args.run(),
        Command::Plan(args) => args.run(),
    }
}

#[derive(Parser)]
#[command(name = "legato", about = "Offline tooling for the Legato motion core")]
struct Cli {
    /// Log every resolved segment.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a machine configuration and print a summary.
    Check(cli::check::CheckArgs),
    /// Resolve a list of motion requests and print one JSON object per segment.
    Plan(cli::plan::PlanArgs),
}
