//! Insertion-order iteration chain threaded through the slots.
//!
//! The chain is the sole source of iteration order and the single pass used
//! when rehosting into resized tables. Slot ids are stable, so the chain
//! survives key overwrites and tree surgery untouched.
use crate::node::NIL;
use crate::table::BidiTable;

impl<K1, K2, S> BidiTable<K1, K2, S> {
    pub(crate) fn chain_push(&mut self, node: u32) {
        if self.tail == NIL {
            self.head = node;
            self.tail = node;
        } else {
            self.slots.get_mut(self.tail).down = node;
            self.slots.get_mut(node).up = self.tail;
            self.tail = node;
        }
    }

    pub(crate) fn chain_unlink(&mut self, node: u32) {
        let slot = self.slots.get(node);
        let (up, down) = (slot.up, slot.down);
        if up != NIL {
            self.slots.get_mut(up).down = down;
        } else {
            self.head = down;
        }
        if down != NIL {
            self.slots.get_mut(down).up = up;
        } else {
            self.tail = up;
        }
    }
}
