//! Bounded-concurrency application of an approved change list.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, warn};

use gdsync_core::domain::{op_change_count, Change, File, Operation};
use gdsync_core::ports::{RemoteClient, RemoteError, UpsertArgs};
use gdsync_core::util::{remote_path_split, root_like, round_to_second};
use gdsync_core::{Context, SyncError};
use gdsync_index::IndexStore;

use crate::localfs::set_mod_time;
use crate::progress::TransferProgress;
use crate::SyncEngine;

/// Cap on outstanding transfer jobs.
const MAX_IN_FLIGHT_JOBS: usize = 100;

impl SyncEngine {
    /// Applies a change list: buckets by operation, schedules everything
    /// under one shared semaphore, forwards byte counts to the progress
    /// accounting, and records index snapshots per success. Job failures
    /// are logged against their file; the run completes with errors.
    pub(crate) async fn play_changes(
        &self,
        changes: Vec<Change>,
        is_push: bool,
    ) -> Result<(), SyncError> {
        let op_map = op_change_count(&changes);
        let total: u64 = op_map.values().map(|c| c.src).sum();
        let progress = TransferProgress::start(total);

        let (tx, mut rx) = mpsc::channel::<u64>(256);
        let reader = {
            let progress = progress.clone();
            tokio::spawn(async move {
                while let Some(n) = rx.recv().await {
                    progress.add(n);
                }
            })
        };

        let mut changes = changes;
        if !self.opts.no_clobber {
            // Deletes first, clashing modifications last; matters when a
            // rename is modeled as a delete plus an add under one parent.
            changes.sort_by_key(|c| c.op().precedence());
        }

        let mut adds: BTreeMap<String, Change> = BTreeMap::new();
        let mut mods: BTreeMap<String, Change> = BTreeMap::new();
        let mut dels: BTreeMap<String, Change> = BTreeMap::new();
        for c in changes {
            match c.op() {
                Operation::Add => {
                    adds.insert(c.path.clone(), c);
                }
                Operation::Mod | Operation::ModConflict => {
                    mods.insert(c.path.clone(), c);
                }
                Operation::Delete => {
                    dels.insert(c.path.clone(), c);
                }
                Operation::None => {}
            }
        }

        let transferer = Transferer {
            remote: Arc::clone(&self.remote),
            index: self.index.clone(),
            context: self.context.clone(),
            ignore_checksum: self.opts.ignore_checksum,
            type_mask: self.opts.type_mask,
            coerced_mime_key: self.opts.coerced_mime_key.clone(),
            progress: tx,
        };

        let semaphore = Arc::new(Semaphore::new(MAX_IN_FLIGHT_JOBS));
        let failures = Arc::new(AtomicUsize::new(0));
        let mut jobs: JoinSet<()> = JoinSet::new();

        for (_, change) in adds.into_iter().chain(mods).chain(dels) {
            let transferer = transferer.clone();
            let semaphore = Arc::clone(&semaphore);
            let failures = Arc::clone(&failures);
            jobs.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                let path = change.path.clone();
                let result = if is_push {
                    transferer.apply_push(change).await
                } else {
                    transferer.apply_pull(change).await
                };
                if let Err(err) = result {
                    failures.fetch_add(1, Ordering::SeqCst);
                    error!(path = %path, %err, "transfer failed");
                }
            });
        }

        while jobs.join_next().await.is_some() {}
        drop(transferer);
        let _ = reader.await;
        progress.finish();

        let failed = failures.load(Ordering::SeqCst);
        if failed > 0 {
            warn!(failed, "run completed with errors");
        }
        Ok(())
    }
}

/// Everything one transfer job needs, cheap to clone per job.
#[derive(Clone)]
pub(crate) struct Transferer {
    remote: Arc<dyn RemoteClient>,
    index: IndexStore,
    context: Context,
    ignore_checksum: bool,
    type_mask: u32,
    coerced_mime_key: Option<String>,
    progress: mpsc::Sender<u64>,
}

impl Transferer {
    async fn apply_push(&self, change: Change) -> Result<(), SyncError> {
        match change.op() {
            Operation::Add | Operation::Mod | Operation::ModConflict => {
                self.remote_upsert(change).await
            }
            Operation::Delete => self.remote_delete(change).await,
            Operation::None => Ok(()),
        }
    }

    async fn apply_pull(&self, change: Change) -> Result<(), SyncError> {
        match change.op() {
            Operation::Add | Operation::Mod | Operation::ModConflict => {
                self.local_upsert(change).await
            }
            Operation::Delete => self.local_delete(change).await,
            Operation::None => Ok(()),
        }
    }

    /// Pushes one file or directory: makes sure its remote parent chain
    /// exists, then hands the pair to the remote upsert.
    async fn remote_upsert(&self, mut change: Change) -> Result<(), SyncError> {
        if change.src.is_none() && change.dest.is_none() {
            return Ok(());
        }

        // Updates must land on the existing remote entry.
        if let (Some(src), Some(dest)) = (change.src.as_mut(), change.dest.as_ref()) {
            src.id = dest.id.clone();
        }

        let abs_path = self.context.abs_path_of(&change.path);
        let (parent_path, _) = remote_path_split(&change.path);
        let parent = remote_mkdir_all(&self.remote, &self.index, &parent_path).await?;

        let mime_key = match &self.coerced_mime_key {
            Some(key) => Some(key.clone()),
            None => change
                .src
                .as_ref()
                .filter(|s| !s.is_dir)
                .and_then(|s| extension_of(&s.name)),
        };

        let args = UpsertArgs {
            parent_id: parent.id,
            fs_abs_path: abs_path.to_string_lossy().into_owned(),
            src: change.src.clone(),
            dest: change.dest.clone(),
            type_mask: self.type_mask,
            ignore_checksum: self.ignore_checksum,
            mime_key,
            non_statable: false,
            progress: Some(self.progress.clone()),
        };

        if let Some(rem) = self.remote.upsert_by_comparison(&args).await? {
            self.persist_index(&rem);
        }
        Ok(())
    }

    /// Pushes one deletion, then drops the file's index record.
    async fn remote_delete(&self, change: Change) -> Result<(), SyncError> {
        let Some(dest) = change.dest else {
            return Ok(());
        };

        let result = self.remote.delete(&dest.id).await;
        let _ = self.progress.send(dest.size).await;
        result?;

        if let Err(err) = self.index.remove(&dest.id) {
            warn!(path = %change.path, id = %dest.id, %err, "index record removal failed");
        }
        Ok(())
    }

    /// Pulls one file or directory down to disk.
    async fn local_upsert(&self, change: Change) -> Result<(), SyncError> {
        let Some(src) = change.src else {
            return Ok(());
        };

        let abs = self.context.abs_path_of(&change.path);
        if src.is_dir {
            tokio::fs::create_dir_all(&abs).await?;
        } else {
            if let Some(parent) = abs.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let data = self
                .remote
                .download(&src, Some(self.progress.clone()))
                .await?;

            // Write through a temp file so a crash never leaves a torn
            // blob at the destination.
            let tmp = {
                let mut p = abs.as_os_str().to_owned();
                p.push(".part");
                PathBuf::from(p)
            };
            tokio::fs::write(&tmp, &data).await?;
            tokio::fs::rename(&tmp, &abs).await?;

            // Align the local mtime with the remote so the next
            // resolution sees agreement.
            set_mod_time(&abs, src.mod_time)?;
        }

        self.persist_index(&src);
        Ok(())
    }

    /// Pulls one deletion: the remote entry is gone, remove the local
    /// counterpart.
    async fn local_delete(&self, change: Change) -> Result<(), SyncError> {
        let Some(dest) = change.dest else {
            return Ok(());
        };

        let abs = self.context.abs_path_of(&change.path);
        let result = if dest.is_dir {
            tokio::fs::remove_dir_all(&abs).await
        } else {
            tokio::fs::remove_file(&abs).await
        };
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let _ = self.progress.send(dest.size).await;
        Ok(())
    }

    fn persist_index(&self, file: &File) {
        if file.id.is_empty() {
            return;
        }
        if let Err(err) = self.index.save(&file.to_index()) {
            warn!(name = %file.name, %err, "index write failed");
        }
    }
}

/// Ensures a remote directory path exists, creating missing ancestors
/// recursively. Safe under races: the path is re-queried before every
/// create, and a concurrent job winning the race is fine — its result is
/// picked up by the final lookup.
pub(crate) fn remote_mkdir_all<'a>(
    remote: &'a Arc<dyn RemoteClient>,
    index: &'a IndexStore,
    d: &'a str,
) -> BoxFuture<'a, Result<File, SyncError>> {
    Box::pin(async move {
        if root_like(d) {
            return remote.find_by_path("").await.map_err(Into::into);
        }

        match remote.find_by_path(d).await {
            Ok(found) => return Ok(found),
            Err(RemoteError::PathNotExists) => {}
            Err(err) => return Err(err.into()),
        }

        let (rest, last) = remote_path_split(d);
        let parent = remote_mkdir_all(remote, index, &rest).await?;

        let dir_file = File {
            is_dir: true,
            name: last,
            mod_time: round_to_second(Utc::now()),
            ..File::default()
        };
        let args = UpsertArgs {
            parent_id: parent.id,
            src: Some(dir_file),
            ..UpsertArgs::default()
        };

        match remote.upsert_by_comparison(&args).await? {
            Some(created) => {
                if let Err(err) = index.save(&created.to_index()) {
                    warn!(name = %created.name, %err, "index write failed");
                }
                Ok(created)
            }
            // A racing job created it first; pick up their result.
            None => remote.find_by_path(d).await.map_err(Into::into),
        }
    })
}

/// Extension of a file name, without the dot.
fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .filter(|ext| !ext.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use gdsync_core::Context;

    use crate::options::SyncOptions;
    use crate::testutil::{remote_dir, remote_file, MockRemote};

    fn engine_in(
        dir: &std::path::Path,
        remote: Arc<MockRemote>,
        opts: SyncOptions,
    ) -> SyncEngine {
        fs::create_dir_all(dir.join(".gdsync")).unwrap();
        SyncEngine::new(Context::new(dir.to_path_buf()), remote, opts)
    }

    fn add_change(path: &str, src: File) -> Change {
        Change {
            path: path.to_string(),
            parent: "/".to_string(),
            src: Some(src),
            ..Change::default()
        }
    }

    #[test]
    fn extension_inference() {
        assert_eq!(extension_of("a.txt"), Some("txt".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[tokio::test]
    async fn push_add_upserts_and_writes_index_record() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let mock = Arc::new(MockRemote::new());
        let engine = engine_in(dir.path(), Arc::clone(&mock), SyncOptions::default());

        let meta = fs::metadata(dir.path().join("a.txt")).unwrap();
        let local = File::from_local(&dir.path().join("a.txt"), &meta);
        let mod_secs = local.mod_time.timestamp();

        engine
            .play_changes(vec![add_change("/a.txt", local)], true)
            .await
            .unwrap();

        assert_eq!(mock.upserted_paths(), vec!["/a.txt"]);

        let uploaded = mock.entry_at("/a.txt").unwrap();
        let record = engine.index.lookup(&uploaded.id).expect("index record");
        assert_eq!(record.mod_time, mod_secs);
    }

    #[tokio::test]
    async fn push_creates_missing_remote_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/inner")).unwrap();
        fs::write(dir.path().join("docs/inner/deep.txt"), b"deep").unwrap();

        let mock = Arc::new(MockRemote::new());
        let engine = engine_in(dir.path(), Arc::clone(&mock), SyncOptions::default());

        let abs = dir.path().join("docs/inner/deep.txt");
        let meta = fs::metadata(&abs).unwrap();
        let local = File::from_local(&abs, &meta);

        engine
            .play_changes(vec![add_change("/docs/inner/deep.txt", local)], true)
            .await
            .unwrap();

        assert_eq!(
            mock.upserted_paths(),
            vec!["/docs", "/docs/inner", "/docs/inner/deep.txt"]
        );
    }

    #[tokio::test]
    async fn push_delete_removes_remote_entry_and_index_record() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRemote::new());
        let gone = remote_file("gone.txt", 9, 1_000);
        let gone_id = gone.id.clone();
        mock.insert("/gone.txt", gone.clone());

        let engine = engine_in(dir.path(), Arc::clone(&mock), SyncOptions::default());
        engine.index.save(&gone.to_index()).unwrap();

        let change = Change {
            path: "/gone.txt".to_string(),
            parent: "/".to_string(),
            dest: Some(gone),
            ..Change::default()
        };
        engine.play_changes(vec![change], true).await.unwrap();

        assert_eq!(mock.deleted_ids(), vec![gone_id.clone()]);
        assert!(engine.index.lookup(&gone_id).is_none());
    }

    #[tokio::test]
    async fn pull_add_writes_blob_and_aligns_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockRemote::new());
        let mut rem = remote_file("b.bin", 4, 1_600_000_000);
        rem.md5_checksum = "ffff".to_string();
        mock.contents
            .lock()
            .unwrap()
            .push((rem.id.clone(), b"data".to_vec()));
        mock.insert("/b.bin", rem.clone());

        let engine = engine_in(dir.path(), Arc::clone(&mock), SyncOptions::default());
        let change = Change {
            path: "/b.bin".to_string(),
            parent: "/".to_string(),
            src: Some(rem.clone()),
            ..Change::default()
        };
        engine.play_changes(vec![change], false).await.unwrap();

        let abs = dir.path().join("b.bin");
        assert_eq!(fs::read(&abs).unwrap(), b"data");

        let meta = fs::metadata(&abs).unwrap();
        let got = chrono::DateTime::<chrono::Utc>::from(meta.modified().unwrap());
        assert_eq!(got.timestamp(), 1_600_000_000);

        // The remote snapshot was indexed.
        assert!(engine.index.lookup(&rem.id).is_some());
    }

    #[tokio::test]
    async fn pull_delete_removes_local_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stale.txt"), b"stale").unwrap();

        let mock = Arc::new(MockRemote::new());
        let engine = engine_in(dir.path(), mock, SyncOptions::default());
        let meta = fs::metadata(dir.path().join("stale.txt")).unwrap();
        let local = File::from_local(&dir.path().join("stale.txt"), &meta);

        let change = Change {
            path: "/stale.txt".to_string(),
            parent: "/".to_string(),
            dest: Some(local),
            ..Change::default()
        };
        engine.play_changes(vec![change], false).await.unwrap();

        assert!(!dir.path().join("stale.txt").exists());
    }

    #[tokio::test]
    async fn mkdir_all_returns_existing_directory_without_creating() {
        let mock = Arc::new(MockRemote::new());
        mock.insert("/docs", remote_dir("docs", "dir-docs"));
        let remote: Arc<dyn RemoteClient> = Arc::clone(&mock) as Arc<dyn RemoteClient>;

        let dir = tempfile::tempdir().unwrap();
        let index = IndexStore::new(dir.path().join("indices"));

        let found = remote_mkdir_all(&remote, &index, "/docs").await.unwrap();
        assert_eq!(found.id, "dir-docs");
        assert!(mock.upserted_paths().is_empty());
    }

    #[tokio::test]
    async fn mkdir_all_of_root_resolves_to_root() {
        let remote: Arc<dyn RemoteClient> = Arc::new(MockRemote::new());
        let dir = tempfile::tempdir().unwrap();
        let index = IndexStore::new(dir.path().join("indices"));

        let root = remote_mkdir_all(&remote, &index, "/").await.unwrap();
        assert_eq!(root.id, "root");
        assert!(root.is_dir);
    }

    #[tokio::test]
    async fn job_failure_does_not_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ok.txt"), b"fine").unwrap();
        fs::write(dir.path().join("bad.txt"), b"doomed").unwrap();

        let mock = Arc::new(MockRemote::new());
        mock.fail_upserts_named
            .lock()
            .unwrap()
            .push("bad.txt".to_string());
        let engine = engine_in(dir.path(), Arc::clone(&mock), SyncOptions::default());

        let good_meta = fs::metadata(dir.path().join("ok.txt")).unwrap();
        let good = File::from_local(&dir.path().join("ok.txt"), &good_meta);
        let bad_meta = fs::metadata(dir.path().join("bad.txt")).unwrap();
        let bad = File::from_local(&dir.path().join("bad.txt"), &bad_meta);

        // Both scheduled; the good one must land regardless of the bad.
        engine
            .play_changes(
                vec![add_change("/ok.txt", good), add_change("/bad.txt", bad)],
                true,
            )
            .await
            .unwrap();

        assert!(mock.upserted_paths().contains(&"/ok.txt".to_string()));
        assert!(mock.entry_at("/bad.txt").is_none());
    }
}
