//! [BidiTable] is a bijective hash map: it stores pairings of mutually unique
//! primary and secondary keys and resolves either key to the other equally
//! fast, keeping both key spaces duplicate-free under insertion, overwrite
//! and removal.
//!
//! Both directions are backed by one slot arena shared between two hash
//! tables whose collision chains are AVL trees, so no non-resizing operation
//! is worse than `O(log n)` even with badly colliding hashes. A doubly
//! linked chain through the slots remembers insertion order; iterators and
//! [cursors](Cursor) yield pairings in that order, and resizing and
//! [compaction](BidiTable::compact) rehost the tables in a single chain
//! walk reusing the cached key hashes.
//!
//! Memory usage tracks the live pairing count: `compact` shrinks the bucket
//! arrays after heavy churn, and removed slots are recycled through a free
//! list.

mod chain;
mod cursor;
mod error;
mod node;
mod table;
mod tree;
mod views;

#[cfg(test)]
mod test_table;

pub use cursor::Cursor;
pub use error::CursorError;
pub use table::{BidiTable, DefaultBuildHasher, Overwritten};
pub use views::{Inverse, InverseIter, InverseMut, IntoIter, Iter, Keys, SecondaryKeys};
