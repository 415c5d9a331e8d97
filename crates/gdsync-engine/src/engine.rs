//! The engine facade: orchestration of one push or pull run.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use gdsync_core::domain::{
    op_change_count, reduce_to_size, Change, File, Operation, SELECT_DEST, SELECT_SRC,
};
use gdsync_core::ports::{RemoteClient, RemoteError, UpsertArgs};
use gdsync_core::util::{pretty_bytes, remote_path_split, root_like};
use gdsync_core::{Context, SyncError};
use gdsync_index::IndexStore;

use crate::conflict::{resolve_conflicts, sift};
use crate::executor::remote_mkdir_all;
use crate::mount::Mount;
use crate::options::SyncOptions;
use crate::quota::{classify_quota, QuotaStatus};

/// Drives push and pull runs over one context.
///
/// Dependencies arrive through the constructor: the remote store behind
/// its port, the on-disk index store derived from the context, and the
/// per-run options. The engine itself holds no connection state.
pub struct SyncEngine {
    pub(crate) context: Context,
    pub(crate) remote: Arc<dyn RemoteClient>,
    pub(crate) index: IndexStore,
    pub(crate) opts: SyncOptions,
    pub(crate) mount: Arc<Mount>,
}

impl SyncEngine {
    pub fn new(context: Context, remote: Arc<dyn RemoteClient>, opts: SyncOptions) -> Self {
        let index = IndexStore::new(context.indices_dir());
        Self {
            context,
            remote,
            index,
            opts,
            mount: Arc::new(Mount::default()),
        }
    }

    /// Attaches mount points that participate in pushes.
    pub fn with_mount(mut self, mount: Mount) -> Self {
        self.mount = Arc::new(mount);
        self
    }

    /// Pushes the configured sources (local -> remote).
    pub async fn push(&self) -> Result<(), SyncError> {
        let result = self.push_inner().await;
        self.mount.clear();
        result
    }

    /// Pulls the configured sources (remote -> local).
    pub async fn pull(&self) -> Result<(), SyncError> {
        let result = self.pull_inner().await;
        self.mount.clear();
        result
    }

    async fn push_inner(&self) -> Result<(), SyncError> {
        self.install_signal_handler();

        info!("resolving changes");
        let mut cl = Vec::new();
        for rel in &self.opts.sources {
            let fs_path = self.context.abs_path_of(rel);
            cl.extend(self.change_list_resolve(rel, &fs_path, true).await?);
        }

        for point in self.mount.points() {
            let rel = format!("/{}", point.name);
            match self.lone_push(&rel, &point.canonical).await {
                Ok(ccl) => cl.extend(ccl),
                Err(err) => warn!(mount = %rel, %err, "mount point resolution failed"),
            }
        }

        let (push_size, _) = reduce_to_size(&cl, SELECT_SRC | SELECT_DEST);
        let non_conflicts = self.gate_conflicts(cl, true)?;

        match self.quota_status(push_size).await {
            QuotaStatus::Exceeded => {
                error!(
                    projected = %pretty_bytes(push_size),
                    "this change will exceed the drive quota"
                );
                if !self.opts.can_prompt() || !prompt_for_changes() {
                    return Err(SyncError::QuotaExceeded);
                }
            }
            QuotaStatus::AlmostExceeded => warn!("almost exceeding the drive quota"),
            QuotaStatus::HalfwayExceeded => {
                debug!("more than half the drive quota would be used")
            }
            QuotaStatus::Barely | QuotaStatus::Unknown => {}
        }

        if !self.print_change_list(&non_conflicts) {
            return Ok(());
        }
        self.play_changes(non_conflicts, true).await
    }

    async fn pull_inner(&self) -> Result<(), SyncError> {
        self.install_signal_handler();

        info!("resolving changes");
        let mut cl = Vec::new();
        if self.opts.matches.is_empty() {
            for rel in &self.opts.sources {
                let fs_path = self.context.abs_path_of(rel);
                cl.extend(self.change_list_resolve(rel, &fs_path, false).await?);
            }
        } else {
            cl = self.match_changes().await?;
        }

        let non_conflicts = self.gate_conflicts(cl, false)?;
        if !self.print_change_list(&non_conflicts) {
            return Ok(());
        }
        self.play_changes(non_conflicts, false).await
    }

    /// Serial push fed by stdin; one input stream cannot be multiplexed,
    /// so sources are processed strictly one at a time.
    pub async fn push_piped(&self) -> Result<(), SyncError> {
        for rel in &self.opts.sources {
            let remote = match self.remote.find_by_path(rel).await {
                Ok(f) => Some(f),
                Err(RemoteError::PathNotExists) => None,
                Err(err) => return Err(err.into()),
            };

            if let Some(r) = &remote {
                if !self.opts.force {
                    return Err(SyncError::AlreadyExistsRemotely(rel.clone()));
                }
                if r.has_export_links() {
                    return Err(SyncError::DocLikeTarget(rel.clone()));
                }
            }

            let (parent_path, base) = remote_path_split(rel);
            let parent = remote_mkdir_all(&self.remote, &self.index, &parent_path).await?;

            let src = remote.clone().unwrap_or_else(|| File::faux_local(&base));
            let args = UpsertArgs {
                parent_id: parent.id,
                fs_abs_path: rel.clone(),
                src: Some(src),
                dest: remote,
                type_mask: self.opts.type_mask,
                ignore_checksum: self.opts.ignore_checksum,
                non_statable: true,
                ..UpsertArgs::default()
            };

            let uploaded = self.remote.upsert_by_comparison(&args).await?;
            if let Some(rem) = uploaded {
                if let Err(err) = self.index.save(&rem.to_index()) {
                    warn!(name = %rem.name, %err, "index write failed");
                }
            }
        }
        Ok(())
    }

    /// Serial pull writing each source's raw content to stdout.
    pub async fn pull_piped(&self) -> Result<(), SyncError> {
        use tokio::io::AsyncWriteExt;

        for rel in &self.opts.sources {
            let remote = self.remote.find_by_path(rel).await?;
            let data = self.remote.download(&remote, None).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&data).await?;
            stdout.flush().await?;
        }
        Ok(())
    }

    /// Resolves changes for remote children of the base path whose names
    /// match the configured patterns.
    async fn match_changes(&self) -> Result<Vec<Change>, SyncError> {
        let base = self
            .opts
            .sources
            .first()
            .cloned()
            .unwrap_or_else(|| "/".to_string());
        let matched = self
            .remote
            .find_matches(&base, &self.opts.matches, false)
            .await?;

        let mut cl = Vec::new();
        for rem in matched {
            let path = gdsync_core::util::join_path(&base, &rem.name);
            let fs_path = self.context.abs_path_of(&path);
            let local = self.resolve_to_local_file(&path, &fs_path)?;
            let children = self
                .resolve_change_list(false, base.clone(), path, Some(rem), local, 0)
                .await?;
            cl.extend(children);
        }
        Ok(cl)
    }

    /// Separates clashing modifications, consults the index to downgrade
    /// the spurious ones, and aborts if any genuine conflict remains.
    pub(crate) fn gate_conflicts(
        &self,
        cl: Vec<Change>,
        push: bool,
    ) -> Result<Vec<Change>, SyncError> {
        if self.opts.ignore_conflict {
            return Ok(cl);
        }

        let (mut non_conflicts, conflicts) = sift(cl);
        let (resolved, unresolved) =
            resolve_conflicts(conflicts, push, |id| self.index.lookup(id));

        if !unresolved.is_empty() {
            error!(
                count = unresolved.len(),
                "these files would be overwritten; use --ignore-conflict to override"
            );
            for ch in &unresolved {
                error!(path = %ch.path, "unresolved conflict");
            }
            return Err(SyncError::UnresolvedConflicts {
                count: unresolved.len(),
                verb: if push { "push" } else { "pull" },
            });
        }

        non_conflicts.extend(resolved);
        Ok(non_conflicts)
    }

    pub(crate) async fn quota_status(&self, query: u64) -> QuotaStatus {
        match self.remote.about().await {
            Ok(about) => classify_quota(&about, query),
            Err(err) => {
                warn!(%err, "quota query failed");
                QuotaStatus::Unknown
            }
        }
    }

    /// Previews the change list and asks for confirmation. Returns
    /// whether the run should proceed.
    pub(crate) fn print_change_list(&self, changes: &[Change]) -> bool {
        if changes.iter().all(|c| c.op() == Operation::None) {
            println!("Everything is up-to-date.");
            return false;
        }
        if !self.opts.can_prompt() {
            return true;
        }

        let op_map = op_change_count(changes);
        for c in changes {
            if c.op() != Operation::None {
                println!("{} {}", c.symbol(), c.path);
            }
        }
        for op in [
            Operation::Add,
            Operation::Delete,
            Operation::Mod,
            Operation::ModConflict,
        ] {
            if let Some(counter) = op_map.get(&op) {
                println!("{} {}", op.description(), counter);
            }
        }

        prompt_for_changes()
    }

    /// Clears mount points and terminates on interrupt. Jobs in flight
    /// are not individually cancelled; the process exits after cleanup.
    fn install_signal_handler(&self) {
        let mount = Arc::clone(&self.mount);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; cleaning up");
                mount.clear();
                std::process::exit(1);
            }
        });
    }

    pub(crate) fn display_parent(path: &str) -> &str {
        if root_like(path) {
            ""
        } else {
            path
        }
    }
}


/// Y/n prompt with a default of yes.
pub(crate) fn prompt_for_changes() -> bool {
    print!("Proceed with the changes? [Y/n]: ");
    let _ = io::stdout().flush();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    let answer = input.trim();
    answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
