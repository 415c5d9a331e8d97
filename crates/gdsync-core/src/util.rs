//! Small path and formatting helpers shared across the workspace.

use chrono::{DateTime, Utc};

/// Name of the remote store's root folder.
pub const REMOTE_ROOT_NAME: &str = "My Drive";

/// Returns true for the spellings that denote the synchronization root.
pub fn root_like(p: &str) -> bool {
    p == "/" || p.is_empty() || p == "root"
}

/// Returns true when `p` names the remote root folder.
pub fn remote_root_like(p: &str) -> bool {
    p == REMOTE_ROOT_NAME
}

/// Whether a basename counts as hidden under the current policy.
pub fn is_hidden(name: &str, include_hidden: bool) -> bool {
    name.starts_with('.') && !include_hidden
}

/// Splits a "/"-separated remote path into (dir, base).
///
/// Unlike `Path::parent`, a trailing empty base is preserved so that
/// `"/a/"` splits into `("/a", "")`, matching the way root-relative
/// paths are joined elsewhere.
pub fn remote_path_split(p: &str) -> (String, String) {
    match p.rfind('/') {
        Some(idx) => (p[..idx].to_string(), p[idx + 1..].to_string()),
        None => (String::new(), p.to_string()),
    }
}

/// Joins a root-relative parent path and a child name without ever
/// producing a double slash for children of "/".
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Truncates a timestamp to whole seconds.
///
/// All modification-time comparisons in the engine happen at second
/// granularity, on both sides.
pub fn round_to_second(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

const BYTE_SUFFIXES: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Human-readable byte count, e.g. `5.00MB`.
pub fn pretty_bytes(b: u64) -> String {
    let mut value = b as f64;
    let mut idx = 0;
    while value >= 1024.0 && idx < BYTE_SUFFIXES.len() - 1 {
        value /= 1024.0;
        idx += 1;
    }
    format!("{:.2}{}", value, BYTE_SUFFIXES[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_like_spellings() {
        assert!(root_like("/"));
        assert!(root_like(""));
        assert!(root_like("root"));
        assert!(!root_like("/photos"));
        assert!(remote_root_like("My Drive"));
        assert!(!remote_root_like("my drive"));
    }

    #[test]
    fn hidden_policy() {
        assert!(is_hidden(".cache", false));
        assert!(!is_hidden(".cache", true));
        assert!(!is_hidden("cache", false));
    }

    #[test]
    fn remote_path_split_cases() {
        assert_eq!(
            remote_path_split("/docs/report.pdf"),
            ("/docs".to_string(), "report.pdf".to_string())
        );
        assert_eq!(
            remote_path_split("/a.txt"),
            (String::new(), "a.txt".to_string())
        );
        assert_eq!(remote_path_split("/"), (String::new(), String::new()));
    }

    #[test]
    fn join_path_avoids_double_slash() {
        assert_eq!(join_path("/", "a.txt"), "/a.txt");
        assert_eq!(join_path("/docs", "a.txt"), "/docs/a.txt");
    }

    #[test]
    fn round_to_second_drops_subsecond() {
        let t = DateTime::from_timestamp(1_700_000_000, 999_999_999).unwrap();
        let rounded = round_to_second(t);
        assert_eq!(rounded.timestamp(), 1_700_000_000);
        assert_eq!(rounded.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn pretty_bytes_scales() {
        assert_eq!(pretty_bytes(512), "512.00B");
        assert_eq!(pretty_bytes(2048), "2.00KB");
        assert_eq!(pretty_bytes(5 * 1024 * 1024), "5.00MB");
    }
}
