//! In-memory remote store for engine tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::DateTime;

use gdsync_core::domain::File;
use gdsync_core::ports::{About, RemoteClient, RemoteError, UpsertArgs};
use gdsync_core::util::{join_path, remote_path_split, root_like};

/// Remote file fixture with a deterministic id.
pub fn remote_file(name: &str, size: u64, mod_secs: i64) -> File {
    File {
        id: format!("id-{name}-{mod_secs}"),
        name: name.to_string(),
        size,
        mod_time: DateTime::from_timestamp(mod_secs, 0).unwrap(),
        mime_type: "application/octet-stream".to_string(),
        version: 1,
        ..File::default()
    }
}

/// Remote directory fixture.
pub fn remote_dir(name: &str, id: &str) -> File {
    File {
        id: id.to_string(),
        name: name.to_string(),
        is_dir: true,
        mod_time: DateTime::from_timestamp(0, 0).unwrap(),
        ..File::default()
    }
}

/// A remote store backed by a path-keyed list. Duplicate paths are
/// allowed so name clashes can be staged.
#[derive(Default)]
pub struct MockRemote {
    entries: Mutex<Vec<(String, File)>>,
    upserts: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    next_id: AtomicI64,
    pub about: Mutex<About>,
    pub contents: Mutex<Vec<(String, Vec<u8>)>>,
    /// Source names whose upsert is made to fail, for error-path tests.
    pub fail_upserts_named: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            about: Mutex::new(About {
                quota_bytes_total: 1 << 40,
                ..About::default()
            }),
            ..Self::default()
        }
    }

    /// Registers a remote entry at a root-relative path, replacing any
    /// existing entry there.
    pub fn insert(&self, path: &str, file: File) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|(p, _)| p != path);
        entries.push((path.to_string(), file));
    }

    /// Registers a second entry under an already-used path, staging a
    /// name clash.
    pub fn insert_duplicate(&self, path: &str, file: File) {
        self.entries.lock().unwrap().push((path.to_string(), file));
    }

    /// Paths upserted so far, in call order.
    pub fn upserted_paths(&self) -> Vec<String> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    /// The entry currently registered at a path, if any.
    pub fn entry_at(&self, path: &str) -> Option<File> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, f)| f.clone())
    }

    fn root() -> File {
        remote_dir("", "root")
    }

    fn path_of_id(&self, id: &str) -> Option<String> {
        if id == "root" {
            return Some("/".to_string());
        }
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(_, f)| f.id == id)
            .map(|(p, _)| p.clone())
    }
}

#[async_trait::async_trait]
impl RemoteClient for MockRemote {
    async fn find_by_path(&self, path: &str) -> Result<File, RemoteError> {
        if root_like(path) {
            return Ok(Self::root());
        }
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, f)| f.clone())
            .ok_or(RemoteError::PathNotExists)
    }

    async fn find_by_parent_id(
        &self,
        parent_id: &str,
        include_hidden: bool,
    ) -> Result<Vec<File>, RemoteError> {
        let parent_path = self
            .path_of_id(parent_id)
            .ok_or_else(|| RemoteError::Api(format!("unknown parent id {parent_id}")))?;

        let children = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, f)| {
                let (dir, _) = remote_path_split(p);
                let direct_child = if parent_path == "/" {
                    dir.is_empty()
                } else {
                    dir == parent_path
                };
                direct_child && (include_hidden || !f.name.starts_with('.'))
            })
            .map(|(_, f)| f.clone())
            .collect();
        Ok(children)
    }

    async fn find_matches(
        &self,
        base_path: &str,
        patterns: &[String],
        _in_trash: bool,
    ) -> Result<Vec<File>, RemoteError> {
        let base = self.find_by_path(base_path).await?;
        let children = self.find_by_parent_id(&base.id, true).await?;
        Ok(children
            .into_iter()
            .filter(|f| patterns.iter().any(|p| f.name.starts_with(p.as_str())))
            .collect())
    }

    async fn upsert_by_comparison(&self, args: &UpsertArgs) -> Result<Option<File>, RemoteError> {
        let src = args
            .src
            .as_ref()
            .ok_or_else(|| RemoteError::Api("upsert without a source".to_string()))?;

        if self
            .fail_upserts_named
            .lock()
            .unwrap()
            .iter()
            .any(|n| n == &src.name)
        {
            return Err(RemoteError::Api(format!("injected failure for {}", src.name)));
        }

        let parent_path = self
            .path_of_id(&args.parent_id)
            .ok_or_else(|| RemoteError::Api(format!("unknown parent id {}", args.parent_id)))?;
        let path = join_path(&parent_path, &src.name);

        let existing = self.entry_at(&path);
        let id = existing
            .as_ref()
            .map(|f| f.id.clone())
            .unwrap_or_else(|| format!("gen-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));

        let uploaded = File {
            id,
            name: src.name.clone(),
            is_dir: src.is_dir,
            size: src.size,
            mod_time: src.mod_time,
            md5_checksum: src.md5(),
            mime_type: args.mime_key.clone().unwrap_or_default(),
            etag: format!("etag-{}", src.version + 1),
            version: existing.map(|f| f.version + 1).unwrap_or(1),
            ..File::default()
        };

        self.insert(&path, uploaded.clone());
        self.upserts.lock().unwrap().push(path);

        if let Some(tx) = &args.progress {
            let _ = tx.send(src.size).await;
        }
        Ok(Some(uploaded))
    }

    async fn download(
        &self,
        file: &File,
        progress: Option<tokio::sync::mpsc::Sender<u64>>,
    ) -> Result<Vec<u8>, RemoteError> {
        let data = self
            .contents
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == &file.id)
            .map(|(_, d)| d.clone())
            .unwrap_or_else(|| vec![0u8; file.size as usize]);
        if let Some(tx) = &progress {
            let _ = tx.send(data.len() as u64).await;
        }
        Ok(data)
    }

    async fn trash(&self, id: &str) -> Result<(), RemoteError> {
        self.delete(id).await
    }

    async fn untrash(&self, _id: &str) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.entries.lock().unwrap().retain(|(_, f)| f.id != id);
        self.deletes.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn about(&self) -> Result<About, RemoteError> {
        Ok(self.about.lock().unwrap().clone())
    }
}
