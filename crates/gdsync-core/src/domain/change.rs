//! Change records and the operations derived from them.

use std::collections::HashMap;
use std::fmt;

use crate::domain::diff::file_differences;
use crate::domain::file::File;
use crate::util::pretty_bytes;

/// What applying a change would do to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    None,
    Add,
    Delete,
    Mod,
    ModConflict,
}

impl Operation {
    /// Scheduling rank: deletes run earliest, clashing modifications
    /// latest.
    pub fn precedence(self) -> u8 {
        match self {
            Operation::None => 0,
            Operation::Delete => 1,
            Operation::Add => 2,
            Operation::Mod => 3,
            Operation::ModConflict => 4,
        }
    }

    /// One-character colored marker used in previews.
    pub fn symbol(self) -> &'static str {
        match self {
            Operation::Add => "\x1b[32m+\x1b[0m",
            Operation::Delete => "\x1b[31m-\x1b[0m",
            Operation::Mod => "\x1b[33mM\x1b[0m",
            Operation::ModConflict => "\x1b[35mX\x1b[0m",
            Operation::None => "",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Operation::Add => "Addition",
            Operation::Delete => "Deletion",
            Operation::Mod => "Modification",
            Operation::ModConflict => "Clashing modification",
            Operation::None => "",
        }
    }
}

/// Bit-set over the CRUD categories a user may exclude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrudValue(u8);

impl CrudValue {
    pub const NONE: CrudValue = CrudValue(0);
    pub const CREATE: CrudValue = CrudValue(1);
    pub const READ: CrudValue = CrudValue(1 << 1);
    pub const UPDATE: CrudValue = CrudValue(1 << 2);
    pub const DELETE: CrudValue = CrudValue(1 << 3);
    pub const ALL: CrudValue =
        CrudValue(Self::CREATE.0 | Self::READ.0 | Self::UPDATE.0 | Self::DELETE.0);

    pub fn intersects(self, other: CrudValue) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Parses a comma-separated exclusion list; each element counts by
    /// its first letter (c/r/u/d, case-insensitive). Unknown elements
    /// are ignored.
    pub fn parse(csv: &str) -> CrudValue {
        let mut value = CrudValue::NONE;
        for op in csv.split(',') {
            match op.trim().chars().next() {
                Some('c') | Some('C') => value = value | CrudValue::CREATE,
                Some('r') | Some('R') => value = value | CrudValue::READ,
                Some('u') | Some('U') => value = value | CrudValue::UPDATE,
                Some('d') | Some('D') => value = value | CrudValue::DELETE,
                _ => {}
            }
        }
        value
    }
}

impl std::ops::BitOr for CrudValue {
    type Output = CrudValue;

    fn bitor(self, rhs: CrudValue) -> CrudValue {
        CrudValue(self.0 | rhs.0)
    }
}

/// One pending difference between the two trees.
///
/// `src` and `dest` are direction-dependent: on push `src` is the local
/// side and `dest` the remote side; on pull the roles swap. At least one
/// of the two is present for a meaningful change.
#[derive(Debug, Clone, Default)]
pub struct Change {
    /// Root-relative, "/"-separated path, starting with "/".
    pub path: String,
    /// Path of the enclosing directory.
    pub parent: String,
    pub src: Option<File>,
    pub dest: Option<File>,
    pub force: bool,
    pub no_clobber: bool,
    pub ignore_conflict: bool,
    pub ignore_checksum: bool,
}

impl Change {
    /// The raw operation, before the force / no-clobber overlay.
    fn raw_op(&self) -> Operation {
        let (src, dest) = match (self.src.as_ref(), self.dest.as_ref()) {
            (None, None) => return Operation::None,
            (Some(_), None) => return Operation::Add,
            (None, Some(_)) => return Operation::Delete,
            (Some(s), Some(d)) => (s, d),
        };

        if src.is_dir != dest.is_dir {
            return Operation::Mod;
        }
        if src.is_dir {
            // Both directories: recursion, not modification.
            return Operation::None;
        }

        let mask = file_differences(Some(src), Some(dest), self.ignore_checksum);
        if mask.size_differs() || mask.checksum_differs() {
            if self.ignore_conflict {
                return Operation::Mod;
            }
            return Operation::ModConflict;
        }
        if mask.mod_time_differs() {
            return Operation::Mod;
        }
        Operation::None
    }

    /// The operation after applying the user's safety policies. Force
    /// treats the destination as absent for transfer purposes; no-clobber
    /// drops everything that is not a plain addition.
    pub fn op(&self) -> Operation {
        let op = self.raw_op();
        if self.force {
            if op == Operation::ModConflict {
                return Operation::Mod;
            }
            return Operation::Add;
        }
        if op != Operation::Add && self.no_clobber {
            return Operation::None;
        }
        op
    }

    /// The CRUD category this change falls into, for exclusion masks.
    pub fn crud_value(&self) -> CrudValue {
        match self.op() {
            Operation::Add => CrudValue::CREATE,
            Operation::Mod | Operation::ModConflict => CrudValue::UPDATE,
            Operation::Delete => CrudValue::DELETE,
            Operation::None => CrudValue::NONE,
        }
    }

    pub fn symbol(&self) -> &'static str {
        self.op().symbol()
    }
}

/// Per-operation tally used in previews and progress totals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeCounter {
    pub count: u64,
    pub src: u64,
    pub dest: u64,
}

impl fmt::Display for SizeCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "count {}", self.count)?;
        if self.src > 0 {
            write!(f, " src: {}", pretty_bytes(self.src))?;
        }
        if self.dest > 0 {
            write!(f, " dest: {}", pretty_bytes(self.dest))?;
        }
        Ok(())
    }
}

/// Tallies the non-None changes by operation, summing file sizes on each
/// side (directories count toward the count only).
pub fn op_change_count(changes: &[Change]) -> HashMap<Operation, SizeCounter> {
    let mut map: HashMap<Operation, SizeCounter> = HashMap::new();
    for c in changes {
        let op = c.op();
        if op == Operation::None {
            continue;
        }
        let counter = map.entry(op).or_default();
        counter.count += 1;
        if let Some(src) = &c.src {
            if !src.is_dir {
                counter.src += src.size;
            }
        }
        if let Some(dest) = &c.dest {
            if !dest.is_dir {
                counter.dest += dest.size;
            }
        }
    }
    map
}

pub const SELECT_SRC: u8 = 1;
pub const SELECT_DEST: u8 = 1 << 1;

/// Sums the source and destination byte totals over a change list,
/// honoring the side-selection mask.
pub fn reduce_to_size(changes: &[Change], mask: u8) -> (u64, u64) {
    let from_src = mask & SELECT_SRC != 0;
    let from_dest = mask & SELECT_DEST != 0;

    let mut src_size = 0;
    let mut dest_size = 0;
    for c in changes {
        if from_src {
            if let Some(src) = &c.src {
                src_size += src.size;
            }
        }
        if from_dest {
            if let Some(dest) = &c.dest {
                dest_size += dest.size;
            }
        }
    }
    (src_size, dest_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn file(size: u64, secs: i64, checksum: &str) -> File {
        File {
            name: "f".to_string(),
            size,
            mod_time: DateTime::from_timestamp(secs, 0).unwrap(),
            md5_checksum: checksum.to_string(),
            ..File::default()
        }
    }

    fn dir() -> File {
        File {
            name: "d".to_string(),
            is_dir: true,
            mod_time: DateTime::from_timestamp(0, 0).unwrap(),
            ..File::default()
        }
    }

    #[test]
    fn both_absent_is_none() {
        let c = Change::default();
        assert_eq!(c.op(), Operation::None);
    }

    #[test]
    fn only_src_is_add() {
        let c = Change {
            src: Some(file(5, 1, "x")),
            ..Change::default()
        };
        assert_eq!(c.op(), Operation::Add);
        assert_eq!(c.crud_value(), CrudValue::CREATE);
    }

    #[test]
    fn only_dest_is_delete() {
        let c = Change {
            dest: Some(file(5, 1, "x")),
            ..Change::default()
        };
        assert_eq!(c.op(), Operation::Delete);
        assert_eq!(c.crud_value(), CrudValue::DELETE);
    }

    #[test]
    fn dir_type_change_is_mod() {
        let c = Change {
            src: Some(dir()),
            dest: Some(file(5, 1, "x")),
            ..Change::default()
        };
        assert_eq!(c.op(), Operation::Mod);
    }

    #[test]
    fn two_dirs_recurse_instead() {
        let c = Change {
            src: Some(dir()),
            dest: Some(dir()),
            ..Change::default()
        };
        assert_eq!(c.op(), Operation::None);
    }

    #[test]
    fn checksum_divergence_is_conflict() {
        let c = Change {
            src: Some(file(10, 100, "aaa")),
            dest: Some(file(10, 100, "bbb")),
            ..Change::default()
        };
        assert_eq!(c.op(), Operation::ModConflict);
    }

    #[test]
    fn conflict_downgrades_with_ignore_conflict() {
        let c = Change {
            src: Some(file(10, 100, "aaa")),
            dest: Some(file(10, 100, "bbb")),
            ignore_conflict: true,
            ..Change::default()
        };
        assert_eq!(c.op(), Operation::Mod);
    }

    #[test]
    fn mod_time_only_is_mod() {
        let c = Change {
            src: Some(file(10, 100, "aaa")),
            dest: Some(file(10, 200, "aaa")),
            ..Change::default()
        };
        assert_eq!(c.op(), Operation::Mod);
    }

    #[test]
    fn identical_files_are_none() {
        let c = Change {
            src: Some(file(10, 100, "aaa")),
            dest: Some(file(10, 100, "aaa")),
            ..Change::default()
        };
        assert_eq!(c.op(), Operation::None);
    }

    #[test]
    fn force_turns_everything_into_add() {
        let none = Change {
            src: Some(file(10, 100, "aaa")),
            dest: Some(file(10, 100, "aaa")),
            force: true,
            ..Change::default()
        };
        assert_eq!(none.op(), Operation::Add);

        let conflict = Change {
            src: Some(file(10, 100, "aaa")),
            dest: Some(file(10, 100, "bbb")),
            force: true,
            ..Change::default()
        };
        assert_eq!(conflict.op(), Operation::Mod);
    }

    #[test]
    fn no_clobber_drops_non_additions() {
        let del = Change {
            dest: Some(file(5, 1, "x")),
            no_clobber: true,
            ..Change::default()
        };
        assert_eq!(del.op(), Operation::None);

        let add = Change {
            src: Some(file(5, 1, "x")),
            no_clobber: true,
            ..Change::default()
        };
        assert_eq!(add.op(), Operation::Add);
    }

    #[test]
    fn precedence_ordering() {
        assert!(Operation::Delete.precedence() < Operation::Add.precedence());
        assert!(Operation::Add.precedence() < Operation::Mod.precedence());
        assert!(Operation::Mod.precedence() < Operation::ModConflict.precedence());
    }

    #[test]
    fn crud_parse() {
        assert_eq!(CrudValue::parse("c,d"), CrudValue::CREATE | CrudValue::DELETE);
        assert_eq!(CrudValue::parse("U"), CrudValue::UPDATE);
        assert_eq!(CrudValue::parse(""), CrudValue::NONE);
        assert_eq!(CrudValue::parse("c,r,u,d"), CrudValue::ALL);
        assert!(CrudValue::parse("x,y").is_none());
    }

    #[test]
    fn op_change_count_sums_file_sizes() {
        let changes = vec![
            Change {
                src: Some(file(5, 1, "x")),
                ..Change::default()
            },
            Change {
                src: Some(file(7, 1, "y")),
                ..Change::default()
            },
            Change {
                dest: Some(file(3, 1, "z")),
                ..Change::default()
            },
            Change::default(),
        ];
        let map = op_change_count(&changes);
        let adds = map[&Operation::Add];
        assert_eq!(adds.count, 2);
        assert_eq!(adds.src, 12);
        let dels = map[&Operation::Delete];
        assert_eq!(dels.count, 1);
        assert_eq!(dels.dest, 3);
        assert!(!map.contains_key(&Operation::None));
    }

    #[test]
    fn reduce_to_size_honors_mask() {
        let changes = vec![Change {
            src: Some(file(5, 1, "x")),
            dest: Some(file(3, 1, "y")),
            ..Change::default()
        }];
        assert_eq!(reduce_to_size(&changes, SELECT_SRC), (5, 0));
        assert_eq!(reduce_to_size(&changes, SELECT_DEST), (0, 3));
        assert_eq!(reduce_to_size(&changes, SELECT_SRC | SELECT_DEST), (5, 3));
    }
}
