//! Visitors driven by [`crate::walk::walk_file_tree`].
//!
//! Every specialised visitor wraps a [`CountingVisitor`], so counting always
//! happens alongside the delete, clean, copy or accumulate action.

mod accumulating;
mod cleaning;
mod copying;
mod counting;
mod deleting;

pub use accumulating::AccumulatingVisitor;
pub use cleaning::CleaningVisitor;
pub use copying::CopyingVisitor;
pub use counting::CountingVisitor;
pub use deleting::DeletingVisitor;
