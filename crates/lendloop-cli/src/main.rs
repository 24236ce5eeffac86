//! # lendloop Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use clap::Parser;

use lendloop_cli::config::Config;
use lendloop_cli::serve;

/// Lendloop — rental lifecycle transition engine.
///
/// Serves the command and read surfaces over HTTP and promotes
/// time-gated rentals on a schedule.
#[derive(Parser, Debug)]
#[command(name = "lendloop", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP surface with the scheduled activator.
    Serve(ServeArgs),
    /// Run a single activation sweep and exit.
    Activate(ActivateArgs),
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Postgres URL (defaults to LENDLOOP_DATABASE_URL / DATABASE_URL).
    #[arg(long)]
    database_url: Option<String>,
    /// Bind address (defaults to LENDLOOP_BIND or 0.0.0.0:8080).
    #[arg(long)]
    bind: Option<String>,
    /// Seconds between activation sweeps (defaults to hourly).
    #[arg(long)]
    activation_interval: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct ActivateArgs {
    /// Postgres URL (defaults to LENDLOOP_DATABASE_URL / DATABASE_URL).
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = Config::resolve(args.database_url, args.bind, args.activation_interval)?;
            serve::serve(config).await
        }
        Commands::Activate(args) => {
            let config = Config::resolve(args.database_url, None, None)?;
            serve::activate(config).await
        }
    }
}
