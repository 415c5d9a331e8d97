//! Local filesystem walker primitives.

use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use gdsync_core::context::METADATA_DIR;
use gdsync_core::domain::File;
use gdsync_core::util::{is_hidden, join_path};

/// Lists the immediate children of a local directory as unified file
/// entities.
///
/// The metadata directory is always suppressed; hidden entries honor the
/// policy flag; the ignore regex is matched against each child's
/// root-relative path. Symlinked children are resolved to their target
/// and the target's stat is used.
pub async fn list_local_children(
    abs_dir: &Path,
    rel_dir: &str,
    include_hidden: bool,
    ignore: Option<&Regex>,
) -> io::Result<Vec<File>> {
    let mut children = Vec::new();
    let mut entries = tokio::fs::read_dir(abs_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == METADATA_DIR {
            continue;
        }
        if is_hidden(&name, include_hidden) {
            continue;
        }
        if let Some(re) = ignore {
            if re.is_match(&join_path(rel_dir, &name)) {
                debug!(name, "skipping ignored child");
                continue;
            }
        }

        let path = entry.path();
        let file_type = entry.file_type().await?;
        if file_type.is_symlink() {
            // Resolve the link; a dangling target is skipped.
            let Ok(target) = tokio::fs::canonicalize(&path).await else {
                continue;
            };
            let Ok(meta) = std::fs::metadata(&target) else {
                continue;
            };
            let mut resolved = File::from_local(&target, &meta);
            // Keep the link's own name so pairing stays by basename.
            resolved.name = name;
            children.push(resolved);
        } else {
            let meta = entry.metadata().await?;
            children.push(File::from_local(&path, &meta));
        }
    }

    Ok(children)
}

/// Sets a file's modification time, so a pulled file compares equal to
/// its remote counterpart on the next run.
#[cfg(unix)]
pub fn set_mod_time(path: &Path, t: DateTime<Utc>) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let tv = libc::timeval {
        tv_sec: t.timestamp() as libc::time_t,
        tv_usec: 0,
    };
    let times = [tv, tv];
    let rc = unsafe { libc::utimes(c_path.as_ptr(), times.as_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn set_mod_time(_path: &Path, _t: DateTime<Utc>) -> io::Result<()> {
    Ok(())
}
