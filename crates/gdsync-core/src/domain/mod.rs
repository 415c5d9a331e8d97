//! Domain entities of the change-set engine.

pub mod change;
pub mod diff;
pub mod file;
pub mod index_record;

pub use change::{
    op_change_count, reduce_to_size, Change, CrudValue, Operation, SizeCounter, SELECT_DEST,
    SELECT_SRC,
};
pub use diff::{file_differences, same_file_till_checksum, FileDiff};
pub use file::File;
pub use index_record::IndexRecord;
