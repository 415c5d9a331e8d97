//! Push command - send local changes to the remote drive.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use gdsync_core::Context;
use gdsync_engine::{Mount, SyncEngine};
use gdsync_remote::DriveClient;

use crate::commands::SyncFlags;
use crate::paths::rel_to_root_sources;

#[derive(Debug, Args)]
pub struct PushCommand {
    /// Paths to push; defaults to the working directory
    pub paths: Vec<String>,

    #[command(flatten)]
    pub flags: SyncFlags,

    /// Compare checksums only when sizes already differ
    #[arg(long = "ignore-checksum")]
    pub ignore_checksum: bool,

    /// External paths that join the push as siblings of the root
    #[arg(short = 'm', long = "mount", value_name = "PATH")]
    pub mount: Vec<PathBuf>,
}

impl PushCommand {
    pub async fn execute(&self, quiet: bool) -> Result<()> {
        let cwd = std::env::current_dir().context("resolving working directory")?;
        let context = Context::discover(&cwd)?;
        info!(root = %context.root().display(), "push");

        let mut opts = self
            .flags
            .to_options(&context, quiet, self.ignore_checksum, Vec::new());
        opts.sources = rel_to_root_sources(&context, &cwd, &self.paths)?;

        let client = DriveClient::from_context(&context)?;
        let mut engine = SyncEngine::new(context.clone(), Arc::new(client), opts);
        if !self.mount.is_empty() {
            let mount = Mount::attach(context.root(), &self.mount)
                .context("attaching mount points")?;
            engine = engine.with_mount(mount);
        }

        if self.flags.piped {
            engine.push_piped().await?;
        } else {
            engine.push().await?;
        }
        Ok(())
    }
}
