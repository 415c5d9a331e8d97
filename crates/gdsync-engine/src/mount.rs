//! Mount-point scoping for pushes.
//!
//! An attached external path participates in a push as a sibling of the
//! repo root: a symlink appears inside the root for the duration of the
//! run and every change it contributes is resolved as a "lone push"
//! whose local side lies outside the root. Whatever happens, the links
//! (and any directory created to host them) are released: on normal
//! completion, on error, and on signal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error};

/// Directory created under the root when a mount name collides with an
/// existing entry.
const MOUNT_HOST_DIR: &str = "external";

/// One attached external path.
#[derive(Debug, Clone)]
pub struct MountPoint {
    /// Root-relative name the point contributes changes under (no
    /// leading slash).
    pub name: String,
    /// Canonical external path holding the actual content.
    pub canonical: PathBuf,
    /// The symlink placed inside the root.
    link: PathBuf,
}

impl MountPoint {
    fn unmount(&self) {
        match fs::remove_file(&self.link) {
            Ok(()) => debug!(link = %self.link.display(), "unmounted"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => error!(link = %self.link.display(), %err, "unmount failed"),
        }
    }
}

/// The set of mount points for one run.
#[derive(Debug, Default)]
pub struct Mount {
    points: Vec<MountPoint>,
    created_dir: Option<PathBuf>,
    cleared: AtomicBool,
}

impl Mount {
    /// Attaches external paths under `root`. Each path is canonicalized
    /// and symlinked at `root/<basename>`; on a name collision the link
    /// moves into a freshly created hosting directory, which is removed
    /// again on [`Mount::clear`].
    #[cfg(unix)]
    pub fn attach(root: &Path, externals: &[PathBuf]) -> io::Result<Mount> {
        let mut points = Vec::new();
        let mut created_dir: Option<PathBuf> = None;

        for ext in externals {
            let canonical = ext.canonicalize()?;
            let base = canonical
                .file_name()
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "mount path has no basename")
                })?
                .to_string_lossy()
                .into_owned();

            let (name, link) = if root.join(&base).symlink_metadata().is_ok() {
                let host = root.join(MOUNT_HOST_DIR);
                if host.symlink_metadata().is_err() {
                    fs::create_dir_all(&host)?;
                    created_dir = Some(host.clone());
                }
                (format!("{MOUNT_HOST_DIR}/{base}"), host.join(&base))
            } else {
                (base.clone(), root.join(&base))
            };

            std::os::unix::fs::symlink(&canonical, &link)?;
            debug!(name, external = %canonical.display(), "mounted");
            points.push(MountPoint {
                name,
                canonical,
                link,
            });
        }

        Ok(Mount {
            points,
            created_dir,
            cleared: AtomicBool::new(false),
        })
    }

    pub fn points(&self) -> &[MountPoint] {
        &self.points
    }

    /// Releases every mount point and removes any hosting directory.
    /// Idempotent: the first caller wins, later calls are no-ops.
    pub fn clear(&self) {
        if self.cleared.swap(true, Ordering::SeqCst) {
            return;
        }
        for point in &self.points {
            point.unmount();
        }
        if let Some(dir) = &self.created_dir {
            if let Err(err) = fs::remove_dir_all(dir) {
                if err.kind() != io::ErrorKind::NotFound {
                    error!(dir = %dir.display(), %err, "removing mount host dir failed");
                }
            }
        }
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.clear();
    }
}
