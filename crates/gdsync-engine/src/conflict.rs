//! Separating true conflicts from one-sided edits.
//!
//! A `ModConflict` change means both sides hold different content. The
//! persisted index — the last state on which the two sides agreed — is
//! the third voice that decides whether both sides actually moved, or
//! only one did.

use gdsync_core::domain::{Change, File, IndexRecord, Operation};
use gdsync_core::util::round_to_second;

/// Splits a change list into (non-conflicts, conflicts).
pub fn sift(changes: Vec<Change>) -> (Vec<Change>, Vec<Change>) {
    let mut non_conflicts = Vec::new();
    let mut conflicts = Vec::new();
    for c in changes {
        if c.op() == Operation::ModConflict {
            conflicts.push(c);
        } else {
            non_conflicts.push(c);
        }
    }
    (non_conflicts, conflicts)
}

/// Decides whether a clashing modification is a genuine conflict.
///
/// `local` and `remote` are the direction-resolved sides. The conflict
/// is spurious when any of these holds:
/// - no index record exists (a first-time file has no basis to be called
///   conflicting);
/// - on push, the remote's modification time equals the recorded one —
///   the remote did not change since the last agreement (there is no
///   symmetric clause for pull: its destination is the local file,
///   freshly statted, which the rule below already covers);
/// - the local side's rounded modification time and checksum both equal
///   the recorded ones.
pub fn is_conflict(
    local: Option<&File>,
    remote: Option<&File>,
    index: Option<&IndexRecord>,
    push: bool,
) -> bool {
    let Some(index) = index else {
        return false;
    };

    if push {
        if let Some(r) = remote {
            if r.mod_time.timestamp() == index.mod_time {
                return false;
            }
        }
    }

    let Some(l) = local else {
        // A clashing modification always has both sides; without a local
        // side there is nothing to contradict the index.
        return false;
    };

    let rounded = round_to_second(l.mod_time);
    !(rounded.timestamp() == index.mod_time && l.md5() == index.md5_checksum)
}

/// Consults the index for every clashing modification.
///
/// Spurious conflicts are marked `ignore_conflict` and returned in the
/// resolved list; genuine ones come back unresolved.
pub fn resolve_conflicts<F>(
    conflicts: Vec<Change>,
    push: bool,
    index_lookup: F,
) -> (Vec<Change>, Vec<Change>)
where
    F: Fn(&str) -> Option<IndexRecord>,
{
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();

    for mut ch in conflicts {
        let (local, remote) = if push {
            (ch.src.as_ref(), ch.dest.as_ref())
        } else {
            (ch.dest.as_ref(), ch.src.as_ref())
        };

        let mut file_id = local.map(|f| f.id.as_str()).unwrap_or("");
        if file_id.is_empty() {
            file_id = remote.map(|f| f.id.as_str()).unwrap_or("");
        }

        let record = index_lookup(file_id);
        if is_conflict(local, remote, record.as_ref(), push) {
            unresolved.push(ch);
        } else {
            if ch.op() == Operation::ModConflict {
                ch.ignore_conflict = true;
            }
            resolved.push(ch);
        }
    }

    (resolved, unresolved)
}
