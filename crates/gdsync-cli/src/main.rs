//! gdsync CLI - explicit push/pull synchronization with a remote drive.
//!
//! The user is the scheduler: there is no daemon. `push` sends local
//! changes up, `pull` brings remote changes down, both over user-named
//! paths inside a gdsync context.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod paths;

use commands::{pull::PullCommand, push::PushCommand};

#[derive(Debug, Parser)]
#[command(name = "gdsync", version, about = "Push/pull synchronizer for a remote drive")]
pub struct Cli {
    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors; suppresses prompts
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send local changes to the remote drive
    Push(PushCommand),
    /// Bring remote changes down to the local tree
    Pull(PullCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Push(cmd) => cmd.execute(cli.quiet).await,
        Commands::Pull(cmd) => cmd.execute(cli.quiet).await,
    }
}
