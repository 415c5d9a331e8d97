//! Recursive change-set resolution over both trees.

use std::path::Path;

use futures::future::{join_all, BoxFuture};
use tracing::{error, warn};

use gdsync_core::domain::{file_differences, Change, File, Operation};
use gdsync_core::ports::RemoteError;
use gdsync_core::util::join_path;
use gdsync_core::SyncError;

use crate::localfs::list_local_children;
use crate::merger::merge;
use crate::SyncEngine;

/// Directory fan-out granularity during recursion.
const RESOLVE_CHUNK_SIZE: usize = 100;

impl SyncEngine {
    /// Resolves one named path into a flat change list, looking it up on
    /// both sides first. A missing remote is tolerated on push (new
    /// content) and fatal on pull.
    pub async fn change_list_resolve(
        &self,
        rel_to_root: &str,
        fs_path: &Path,
        is_push: bool,
    ) -> Result<Vec<Change>, SyncError> {
        let remote = match self.remote.find_by_path(rel_to_root).await {
            Ok(f) => Some(f),
            Err(RemoteError::PathNotExists) if is_push => None,
            Err(err) => return Err(err.into()),
        };

        let local = self.resolve_to_local_file(rel_to_root, fs_path)?;
        if local.is_none() && remote.is_none() {
            return Err(SyncError::PathNotExists(rel_to_root.to_string()));
        }

        self.resolve_change_list(
            is_push,
            rel_to_root.to_string(),
            rel_to_root.to_string(),
            remote,
            local,
            0,
        )
        .await
    }

    /// Stats a local path into a file entity. An explicitly named target
    /// matching the ignore regex is an error; force disables the regex
    /// at option-construction time.
    pub(crate) fn resolve_to_local_file(
        &self,
        rel_to_root: &str,
        fs_path: &Path,
    ) -> Result<Option<File>, SyncError> {
        if let Some(re) = &self.opts.ignore_regex {
            if re.is_match(rel_to_root) {
                return Err(SyncError::IgnoredPath(rel_to_root.to_string()));
            }
        }

        match std::fs::metadata(fs_path) {
            Ok(meta) => Ok(Some(File::from_local(fs_path, &meta))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves a push rooted at the repo but whose local side lies
    /// outside it (a mount point).
    pub(crate) async fn lone_push(
        &self,
        rel_path: &str,
        local_path: &Path,
    ) -> Result<Vec<Change>, SyncError> {
        let remote = match self.remote.find_by_path(rel_path).await {
            Ok(f) => Some(f),
            Err(RemoteError::PathNotExists) => None,
            Err(err) => return Err(err.into()),
        };

        let local = match std::fs::metadata(local_path) {
            Ok(meta) => Some(File::from_local(local_path, &meta)),
            Err(_) => None,
        };

        self.resolve_change_list(
            true,
            "/".to_string(),
            rel_path.to_string(),
            remote,
            local,
            0,
        )
        .await
    }

    /// The recursive heart of the resolver: pairs one path's remote and
    /// local entries, classifies the pair, then fans out over merged
    /// children in chunks. Child failures are logged and skipped, except
    /// that a missing remote path deeper down is silently ignored.
    pub(crate) fn resolve_change_list(
        &self,
        is_push: bool,
        parent: String,
        path: String,
        remote: Option<File>,
        local: Option<File>,
        depth: usize,
    ) -> BoxFuture<'_, Result<Vec<Change>, SyncError>> {
        Box::pin(async move {
            // Doc-like remote files have no raw blob form. A push may
            // never clobber them; a pull without force compares mod time
            // and dir type only.
            if let Some(r) = &remote {
                if r.has_export_links() {
                    if is_push {
                        return Ok(Vec::new());
                    }
                    if !self.opts.force {
                        let mask =
                            file_differences(remote.as_ref(), local.as_ref(), self.opts.ignore_checksum);
                        if !mask.dir_type_differs() && !mask.mod_time_differs() {
                            return Ok(Vec::new());
                        }
                    }
                }
            }

            let mut change = Change {
                path: path.clone(),
                parent: parent.clone(),
                ignore_checksum: self.opts.ignore_checksum,
                ..Change::default()
            };
            if is_push {
                change.src = local.clone();
                change.dest = remote.clone();
            } else {
                change.src = remote.clone();
                change.dest = local.clone();
            }

            if self.opts.exclude_crud.intersects(change.crud_value()) {
                return Ok(Vec::new());
            }

            change.force = self.opts.force;
            change.no_clobber = self.opts.no_clobber;

            let mut cl = Vec::new();
            if change.op() != Operation::None {
                cl.push(change);
            }

            if !self.opts.recursive {
                return Ok(cl);
            }
            if let Some(max) = self.opts.max_depth {
                if depth >= max {
                    return Ok(cl);
                }
            }
            // Descend only along the direction's own side of the pair.
            if !is_push {
                if let Some(r) = &remote {
                    if !r.is_dir {
                        return Ok(cl);
                    }
                }
            }
            if is_push {
                if let Some(l) = &local {
                    if !l.is_dir {
                        return Ok(cl);
                    }
                }
            }

            let local_children = match &local {
                Some(l) if l.is_dir => {
                    list_local_children(
                        Path::new(&l.blob_at),
                        &path,
                        self.opts.hidden,
                        self.opts.ignore_regex.as_ref(),
                    )
                    .await?
                }
                _ => Vec::new(),
            };

            let remote_children = match &remote {
                Some(r) if r.is_dir => {
                    self.remote
                        .find_by_parent_id(&r.id, self.opts.hidden)
                        .await?
                }
                _ => Vec::new(),
            };

            let (dirlist, clashes) =
                merge(remote_children, local_children, self.opts.ignore_name_clashes);
            if !self.opts.ignore_name_clashes && !clashes.is_empty() {
                let parent_display = Self::display_parent(&path);
                for dup in &clashes {
                    error!("X {}/{} \"{}\"", parent_display, dup.name, dup.id);
                }
                return Err(SyncError::NameClashes(clashes.len()));
            }

            let mut chunks: Vec<Vec<crate::merger::DirList>> = Vec::new();
            let mut current = Vec::with_capacity(RESOLVE_CHUNK_SIZE.min(dirlist.len()));
            for pair in dirlist {
                current.push(pair);
                if current.len() == RESOLVE_CHUNK_SIZE {
                    chunks.push(std::mem::take(&mut current));
                }
            }
            if !current.is_empty() {
                chunks.push(current);
            }

            // Each chunk walks its pairs serially; chunks run
            // concurrently. Every task returns its own slice and the
            // join point concatenates them.
            let tasks = chunks.into_iter().map(|chunk| {
                let parent = path.clone();
                async move {
                    let mut collected = Vec::new();
                    for pair in chunk {
                        let joined = join_path(&parent, pair.name());
                        match self
                            .resolve_change_list(
                                is_push,
                                parent.clone(),
                                joined,
                                pair.remote,
                                pair.local,
                                depth + 1,
                            )
                            .await
                        {
                            Ok(children) => collected.extend(children),
                            Err(err) if err.is_path_not_exists() => {}
                            Err(err) => {
                                warn!(parent = %parent, %err, "skipping subtree after resolve failure")
                            }
                        }
                    }
                    collected
                }
            });

            for child_changes in join_all(tasks).await {
                cl.extend(child_changes);
            }
            Ok(cl)
        })
    }
}
