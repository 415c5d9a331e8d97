//! Translation of user-named paths into root-relative source paths.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Result};

use gdsync_core::Context;

/// Resolves the user's path arguments against the context root.
///
/// Each argument (relative to the working directory, or absolute) maps
/// to a "/"-separated root-relative path starting with "/". With no
/// arguments the working directory itself is the source.
pub fn rel_to_root_sources(
    context: &Context,
    cwd: &Path,
    args: &[String],
) -> Result<Vec<String>> {
    if args.is_empty() {
        return Ok(vec![rel_to_root(context, cwd)?]);
    }

    args.iter()
        .map(|arg| {
            let raw = PathBuf::from(arg);
            let abs = if raw.is_absolute() {
                raw
            } else {
                cwd.join(raw)
            };
            rel_to_root(context, &normalize(&abs))
        })
        .collect()
}

fn rel_to_root(context: &Context, abs: &Path) -> Result<String> {
    let Ok(rel) = abs.strip_prefix(context.root()) else {
        bail!(
            "'{}' lies outside the context root '{}'",
            abs.display(),
            context.root().display()
        );
    };
    if rel.as_os_str().is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}", rel.to_string_lossy()))
}

/// Folds `.` and `..` components without touching the filesystem, so
/// paths that do not exist yet still resolve.
fn normalize(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in p.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn context() -> (tempfile::TempDir, Context) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".gdsync")).unwrap();
        let ctx = Context::new(dir.path().to_path_buf());
        (dir, ctx)
    }

    #[test]
    fn no_args_names_the_working_directory() {
        let (dir, ctx) = context();
        let sources = rel_to_root_sources(&ctx, dir.path(), &[]).unwrap();
        assert_eq!(sources, vec!["/"]);

        let nested = dir.path().join("docs");
        let sources = rel_to_root_sources(&ctx, &nested, &[]).unwrap();
        assert_eq!(sources, vec!["/docs"]);
    }

    #[test]
    fn relative_args_resolve_against_cwd() {
        let (dir, ctx) = context();
        let cwd = dir.path().join("docs");
        let sources =
            rel_to_root_sources(&ctx, &cwd, &["a.txt".to_string(), "../top.txt".to_string()])
                .unwrap();
        assert_eq!(sources, vec!["/docs/a.txt", "/top.txt"]);
    }

    #[test]
    fn absolute_args_must_stay_inside_the_root() {
        let (dir, ctx) = context();
        let inside = dir.path().join("x").to_string_lossy().into_owned();
        let sources = rel_to_root_sources(&ctx, dir.path(), &[inside]).unwrap();
        assert_eq!(sources, vec!["/x"]);

        let err = rel_to_root_sources(&ctx, dir.path(), &["/etc/passwd".to_string()]);
        assert!(err.is_err());
    }

    #[test]
    fn normalize_folds_dots() {
        assert_eq!(
            normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
    }
}
