//! Pairing of remote and local directory listings by name.

use std::collections::{BTreeMap, HashMap};

use gdsync_core::domain::File;

/// A remote and a local entry sharing one name; either side may be
/// absent.
#[derive(Debug, Clone, Default)]
pub struct DirList {
    pub remote: Option<File>,
    pub local: Option<File>,
}

impl DirList {
    /// The shared name, taken from whichever side is present.
    pub fn name(&self) -> &str {
        if let Some(r) = &self.remote {
            return &r.name;
        }
        self.local.as_ref().map(|l| l.name.as_str()).unwrap_or("")
    }
}

/// Pairs two child listings by name.
///
/// Remote entries are consumed in emission order; the first remote child
/// with a given name pairs with the local child of that name, if any.
/// A later remote child with the same name displaces its predecessor
/// into the clash list and is itself skipped — unless `ignore_clashes`,
/// in which case duplicates are silently dropped and only the first is
/// paired. Local filesystems cannot hold duplicate names, so clashes
/// are detected on the remote side only. Leftover locals become
/// local-only pairs in name order.
pub fn merge(
    remotes: Vec<File>,
    locals: Vec<File>,
    ignore_clashes: bool,
) -> (Vec<DirList>, Vec<File>) {
    let mut local_map: BTreeMap<String, File> =
        locals.into_iter().map(|l| (l.name.clone(), l)).collect();
    let mut remote_seen: HashMap<String, File> = HashMap::new();

    let mut merged = Vec::new();
    let mut clashes = Vec::new();

    for r in remotes {
        if let Some(prior) = remote_seen.insert(r.name.clone(), r.clone()) {
            if !ignore_clashes {
                clashes.push(prior);
            }
            continue;
        }
        let local = local_map.remove(&r.name);
        merged.push(DirList {
            remote: Some(r),
            local,
        });
    }

    for (_, l) in local_map {
        merged.push(DirList {
            remote: None,
            local: Some(l),
        });
    }

    (merged, clashes)
}
