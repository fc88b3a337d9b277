//! `axiomkit_io_tree` v1:
//! Rust-side directory tree traversal and accounting engine.
//!
//! Modules:
//! - `counter`  : fixed-width / arbitrary-precision / no-op counters
//! - `report`   : directories/files/bytes counts model
//! - `fs`       : filesystem collaborator contract
//! - `local`    : host filesystem provider
//! - `memory`   : in-memory filesystem provider
//! - `filter`   : path predicates gating counts and side effects
//! - `walk`     : depth-first walk and visitor hooks
//! - `visitor`  : counting, deleting, cleaning, copying, accumulating
//! - `equality` : file and tree content comparison
//! - `ops`      : whole-tree operations
//! - `spec`     : enums/options/errors
//! - `util`     : shared helper functions

pub mod counter;
pub mod equality;
pub mod filter;
pub mod fs;
pub mod local;
pub mod memory;
pub mod ops;
pub mod report;
pub mod spec;
mod util;
pub mod visitor;
pub mod walk;

pub use counter::Counter;
pub use filter::{AcceptAll, KindFilter, NotHidden, PathFilter, PatternFilter};
pub use fs::{EnumEntryKind, FileKey, FileSystem, SpecEntryAttributes};
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use report::PathCounters;
pub use spec::{
    EnumCopyFileConflictStrategy, EnumCopySymlinkStrategy, EnumPatternMode, EnumVisitResult,
    SpecCopyOptions, SpecDeleteOptions, SpecWalkOptions, TreeError,
};
pub use visitor::{
    AccumulatingVisitor, CleaningVisitor, CopyingVisitor, CountingVisitor, DeletingVisitor,
};
pub use walk::{PathVisitor, walk_file_tree};
