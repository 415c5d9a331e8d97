//! User-selectable policies for one push or pull run.

use regex::Regex;

use gdsync_core::domain::CrudValue;

/// Everything the user can toggle about a run. Built once by the CLI
/// and shared read-only by the resolver and executor.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Root-relative source paths, each starting with "/".
    pub sources: Vec<String>,
    /// Descend into directories.
    pub recursive: bool,
    /// Bound on recursion depth; `None` means unbounded.
    pub max_depth: Option<usize>,
    /// Treat the destination as absent: every change becomes a transfer.
    pub force: bool,
    /// Drop everything that would overwrite existing content.
    pub no_clobber: bool,
    /// Discover hidden (dot-named) paths.
    pub hidden: bool,
    /// Skip checksum comparison except as a corollary of a size change.
    pub ignore_checksum: bool,
    /// Turn off the conflict-resolution safety entirely.
    pub ignore_conflict: bool,
    /// Tolerate duplicate-named remote siblings.
    pub ignore_name_clashes: bool,
    /// Never pause for confirmation.
    pub no_prompt: bool,
    /// Only log errors; implies no prompting.
    pub quiet: bool,
    /// Content flows through stdin/stdout instead of statable files.
    pub piped: bool,
    /// Change categories the user excluded (-exclude-ops).
    pub exclude_crud: CrudValue,
    /// MIME coercion from the options, overriding extension inference.
    pub coerced_mime_key: Option<String>,
    /// Name patterns for match-based resolution.
    pub matches: Vec<String>,
    /// Type filter bits forwarded to the remote client.
    pub type_mask: u32,
    /// Whether stdout is a terminal; prompts and previews depend on it.
    pub stdout_is_tty: bool,
    /// Compiled `.driveignore` regex; never set when force is active.
    pub ignore_regex: Option<Regex>,
}

impl SyncOptions {
    /// Whether the run may pause to ask the user anything.
    pub fn can_prompt(&self) -> bool {
        self.stdout_is_tty && !self.quiet && !self.no_prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompting_requires_a_tty() {
        let mut opts = SyncOptions {
            stdout_is_tty: true,
            ..SyncOptions::default()
        };
        assert!(opts.can_prompt());

        opts.stdout_is_tty = false;
        assert!(!opts.can_prompt());
    }

    #[test]
    fn quiet_and_no_prompt_suppress_prompting() {
        let opts = SyncOptions {
            stdout_is_tty: true,
            quiet: true,
            ..SyncOptions::default()
        };
        assert!(!opts.can_prompt());

        let opts = SyncOptions {
            stdout_is_tty: true,
            no_prompt: true,
            ..SyncOptions::default()
        };
        assert!(!opts.can_prompt());
    }
}
