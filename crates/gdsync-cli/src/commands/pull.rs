//! Pull command - bring remote changes down to the local tree.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use gdsync_core::Context;
use gdsync_engine::SyncEngine;
use gdsync_remote::DriveClient;

use crate::commands::SyncFlags;
use crate::paths::rel_to_root_sources;

#[derive(Debug, Args)]
pub struct PullCommand {
    /// Paths to pull; defaults to the working directory
    pub paths: Vec<String>,

    #[command(flatten)]
    pub flags: SyncFlags,

    /// Compare checksums only when sizes already differ. On by default
    /// for pulls; pass `--ignore-checksum false` to re-enable hashing
    #[arg(
        long = "ignore-checksum",
        default_value_t = true,
        default_missing_value = "true",
        num_args = 0..=1,
        action = clap::ArgAction::Set,
        value_name = "BOOL"
    )]
    pub ignore_checksum: bool,

    /// Only pull remote children whose names match these patterns
    #[arg(long = "matches", value_name = "PATTERN")]
    pub matches: Vec<String>,
}

impl PullCommand {
    pub async fn execute(&self, quiet: bool) -> Result<()> {
        let cwd = std::env::current_dir().context("resolving working directory")?;
        let context = Context::discover(&cwd)?;
        info!(root = %context.root().display(), "pull");

        let mut opts = self.flags.to_options(
            &context,
            quiet,
            self.ignore_checksum,
            self.matches.clone(),
        );
        opts.sources = rel_to_root_sources(&context, &cwd, &self.paths)?;

        let client = DriveClient::from_context(&context)?;
        let engine = SyncEngine::new(context, Arc::new(client), opts);

        if self.flags.piped {
            engine.pull_piped().await?;
        } else {
            engine.pull().await?;
        }
        Ok(())
    }
}
