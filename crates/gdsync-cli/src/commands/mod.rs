//! CLI command implementations.

pub mod pull;
pub mod push;

use std::io::IsTerminal;

use clap::Args;

use gdsync_core::domain::CrudValue;
use gdsync_core::Context;
use gdsync_engine::SyncOptions;

/// Flags shared by push and pull.
#[derive(Debug, Args)]
pub struct SyncFlags {
    /// Treat the destination as absent: every change becomes a transfer
    #[arg(long)]
    pub force: bool,

    /// Never overwrite existing destination content
    #[arg(long = "no-clobber")]
    pub no_clobber: bool,

    /// Turn off the conflict-resolution safety
    #[arg(long = "ignore-conflict")]
    pub ignore_conflict: bool,

    /// Tolerate duplicate-named remote siblings
    #[arg(long = "ignore-name-clash")]
    pub ignore_name_clash: bool,

    /// Discover hidden (dot-named) paths
    #[arg(long)]
    pub hidden: bool,

    /// Skip the confirmation pause
    #[arg(long = "no-prompt")]
    pub no_prompt: bool,

    /// Stream content through stdin/stdout instead of files
    #[arg(long)]
    pub piped: bool,

    /// Change categories to exclude, as a csv of c,r,u,d
    #[arg(long = "exclude-ops", value_name = "CSV")]
    pub exclude_ops: Option<String>,

    /// Coerce the upload MIME type from this extension
    #[arg(long = "coerce-mime", value_name = "EXT")]
    pub coerce_mime: Option<String>,

    /// Bound recursion to this many directory levels
    #[arg(long, value_name = "N")]
    pub depth: Option<usize>,

    /// Do not descend into directories
    #[arg(long = "no-recurse")]
    pub no_recurse: bool,
}

impl SyncFlags {
    /// Assembles engine options from the flag surface. The ignore regex
    /// is deliberately not loaded under force.
    pub fn to_options(
        &self,
        context: &Context,
        quiet: bool,
        ignore_checksum: bool,
        matches: Vec<String>,
    ) -> SyncOptions {
        SyncOptions {
            sources: Vec::new(),
            recursive: !self.no_recurse,
            max_depth: self.depth,
            force: self.force,
            no_clobber: self.no_clobber,
            hidden: self.hidden,
            ignore_checksum,
            ignore_conflict: self.ignore_conflict,
            ignore_name_clashes: self.ignore_name_clash,
            no_prompt: self.no_prompt,
            quiet,
            piped: self.piped,
            exclude_crud: self
                .exclude_ops
                .as_deref()
                .map(CrudValue::parse)
                .unwrap_or(CrudValue::NONE),
            coerced_mime_key: self.coerce_mime.clone(),
            matches,
            type_mask: 0,
            stdout_is_tty: std::io::stdout().is_terminal(),
            ignore_regex: if self.force {
                None
            } else {
                context.ignore_regex()
            },
        }
    }
}
