//! Detached fail-fast traversal in insertion order.
use std::hash::Hash;

use crate::error::CursorError;
use crate::node::NIL;
use crate::table::BidiTable;

/// A fail-fast cursor over a [`BidiTable`] in insertion order.
///
/// The cursor does not borrow the table; it borrows it per call instead.
/// That allows the table to be mutated between steps, which the cursor
/// detects through the table's operation counter: a [`Cursor::next`] after
/// an interfering mutation fails with [`CursorError::StaleCursor`] rather
/// than yielding pairings from a structure that changed underneath it.
///
/// [`Cursor::remove`] removes the most recently yielded pairing through the
/// table's regular removal path and re-synchronizes the cursor, so removal
/// through the cursor itself does not end the traversal.
///
/// A cursor is only meaningful with the table that created it; used with any
/// other table it fails the counter check at best.
#[derive(Clone, Debug)]
pub struct Cursor {
    expected_op_count: u64,
    cached_size: usize,
    current: u32,
    last: u32,
    yielded: usize,
    can_remove: bool,
}

impl Cursor {
    pub(crate) fn new(expected_op_count: u64, cached_size: usize, head: u32) -> Self {
        Cursor {
            expected_op_count,
            cached_size,
            current: head,
            last: NIL,
            yielded: 0,
            can_remove: false,
        }
    }

    /// Returns `true` if pairings remain to visit. Does not check for
    /// staleness; only [`Cursor::next`] does.
    pub fn has_next(&self) -> bool {
        self.yielded < self.cached_size
    }

    /// Yields the next pairing in insertion order.
    ///
    /// Fails with [`CursorError::StaleCursor`] if the table was modified
    /// since the cursor's last checkpoint, and with
    /// [`CursorError::Exhausted`] if nothing remains.
    pub fn next<'a, K1, K2, S>(
        &mut self,
        table: &'a BidiTable<K1, K2, S>,
    ) -> Result<(&'a K1, &'a K2), CursorError> {
        if table.op_count != self.expected_op_count {
            return Err(CursorError::StaleCursor);
        }
        if !self.has_next() {
            return Err(CursorError::Exhausted);
        }
        let node = self.current;
        let slot = table.slots.get(node);
        self.last = node;
        self.current = slot.down;
        self.can_remove = true;
        self.yielded += 1;
        Ok((&slot.primary, &slot.secondary))
    }

    /// Removes the most recently yielded pairing from the table and returns
    /// it, re-synchronizing the cursor so traversal may continue.
    ///
    /// Fails with [`CursorError::NothingYielded`] before any successful
    /// [`Cursor::next`], with [`CursorError::AlreadyRemoved`] when called
    /// twice for one pairing, and with [`CursorError::StaleCursor`] under
    /// the same conditions as [`Cursor::next`]. No removal happens on any
    /// error path.
    pub fn remove<K1: Ord + Hash, K2: Ord + Hash, S: std::hash::BuildHasher>(
        &mut self,
        table: &mut BidiTable<K1, K2, S>,
    ) -> Result<(K1, K2), CursorError> {
        if !self.can_remove {
            return Err(if self.yielded == 0 {
                CursorError::NothingYielded
            } else {
                CursorError::AlreadyRemoved
            });
        }
        if table.op_count != self.expected_op_count {
            return Err(CursorError::StaleCursor);
        }
        let pair = table.remove_slot(self.last);
        self.last = NIL;
        self.can_remove = false;
        self.expected_op_count = table.op_count;
        Ok(pair)
    }
}
