//! AVL collision tree engine shared by both sides of the table.
//!
//! Every bucket of either hash table is an AVL tree ordered by that side's
//! key. Both sides run the same link/unlink/rotation code, selected by
//! [`Side`]; only key comparisons differ. All nodes of one tree hash to the
//! same bucket, so any member's cached hash identifies the tree's root slot.
use std::cmp::Ordering;

use crate::node::{Links, NIL};
use crate::table::BidiTable;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Side {
    Primary,
    Secondary,
}

impl Side {
    #[inline]
    pub fn ix(self) -> usize {
        self as usize
    }
}

impl<K1: Ord, K2: Ord, S> BidiTable<K1, K2, S> {
    #[inline]
    pub(crate) fn links(&self, side: Side, node: u32) -> Links {
        self.slots.get(node).tree[side.ix()]
    }

    #[inline]
    pub(crate) fn links_mut(&mut self, side: Side, node: u32) -> &mut Links {
        &mut self.slots.get_mut(node).tree[side.ix()]
    }

    /// Height of a possibly absent subtree; `-1` for an absent child.
    #[inline]
    pub(crate) fn height(&self, side: Side, node: u32) -> i32 {
        if node == NIL {
            -1
        } else {
            self.links(side, node).height
        }
    }

    #[inline]
    pub(crate) fn bucket_of(&self, side: Side, node: u32) -> usize {
        (self.slots.get(node).hashes[side.ix()] & self.mask) as usize
    }

    pub(crate) fn node_key_cmp(&self, side: Side, a: u32, b: u32) -> Ordering {
        let (sa, sb) = (self.slots.get(a), self.slots.get(b));
        match side {
            Side::Primary => sa.primary.cmp(&sb.primary),
            Side::Secondary => sa.secondary.cmp(&sb.secondary),
        }
    }

    fn update_height(&mut self, side: Side, node: u32) {
        let Links { left, right, .. } = self.links(side, node);
        let height = self.height(side, left).max(self.height(side, right)) + 1;
        self.links_mut(side, node).height = height;
    }

    /// Points `parent`'s child link (or the bucket root when `parent` is
    /// absent) from `old` to `new`. `old` must still carry its hash.
    fn replace_child(&mut self, side: Side, parent: u32, old: u32, new: u32) {
        if parent == NIL {
            let bucket = self.bucket_of(side, old);
            self.roots[side.ix()][bucket] = new;
        } else if self.links(side, parent).left == old {
            self.links_mut(side, parent).left = new;
        } else {
            self.links_mut(side, parent).right = new;
        }
    }

    fn rotate_left(&mut self, side: Side, node: u32) -> u32 {
        let pivot = self.links(side, node).right;
        let inner = self.links(side, pivot).left;
        self.links_mut(side, pivot).parent = self.links(side, node).parent;
        self.links_mut(side, node).parent = pivot;
        self.links_mut(side, node).right = inner;
        self.links_mut(side, pivot).left = node;
        if inner != NIL {
            self.links_mut(side, inner).parent = node;
        }
        self.update_height(side, node);
        self.update_height(side, pivot);
        pivot
    }

    fn rotate_right(&mut self, side: Side, node: u32) -> u32 {
        let pivot = self.links(side, node).left;
        let inner = self.links(side, pivot).right;
        self.links_mut(side, pivot).parent = self.links(side, node).parent;
        self.links_mut(side, node).parent = pivot;
        self.links_mut(side, node).left = inner;
        self.links_mut(side, pivot).right = node;
        if inner != NIL {
            self.links_mut(side, inner).parent = node;
        }
        self.update_height(side, node);
        self.update_height(side, pivot);
        pivot
    }

    fn rotate_left_right(&mut self, side: Side, node: u32) -> u32 {
        let left = self.links(side, node).left;
        let sub = self.rotate_left(side, left);
        self.links_mut(side, node).left = sub;
        self.rotate_right(side, node)
    }

    fn rotate_right_left(&mut self, side: Side, node: u32) -> u32 {
        let right = self.links(side, node).right;
        let sub = self.rotate_right(side, right);
        self.links_mut(side, node).right = sub;
        self.rotate_left(side, node)
    }

    /// Walks from `start` to the bucket root, recomputing heights and
    /// rotating where the AVL invariant broke. Insertions are done after the
    /// first restoring rotation; deletions may rotate at every ancestor.
    fn rebalance(&mut self, side: Side, start: u32, insertion: bool) {
        let mut node = start;
        while node != NIL {
            let Links { parent, left, right, .. } = self.links(side, node);
            let left_height = self.height(side, left);
            let right_height = self.height(side, right);
            if left_height == right_height + 2 {
                let Links {
                    left: inner_left,
                    right: inner_right,
                    ..
                } = self.links(side, left);
                let sub = if self.height(side, inner_left) >= self.height(side, inner_right) {
                    self.rotate_right(side, node)
                } else {
                    self.rotate_left_right(side, node)
                };
                self.replace_child(side, parent, node, sub);
                if insertion {
                    return;
                }
            } else if right_height == left_height + 2 {
                let Links {
                    left: inner_left,
                    right: inner_right,
                    ..
                } = self.links(side, right);
                let sub = if self.height(side, inner_right) >= self.height(side, inner_left) {
                    self.rotate_left(side, node)
                } else {
                    self.rotate_right_left(side, node)
                };
                self.replace_child(side, parent, node, sub);
                if insertion {
                    return;
                }
            } else {
                self.links_mut(side, node).height = left_height.max(right_height) + 1;
            }
            node = parent;
        }
    }

    fn min_node(&self, side: Side, mut node: u32) -> u32 {
        loop {
            let left = self.links(side, node).left;
            if left == NIL {
                return node;
            }
            node = left;
        }
    }

    /// Links `node` into its bucket tree on `side`, descending by key
    /// comparison and rebalancing from the attachment parent upward. Stale
    /// links from a previous generation are discarded first.
    ///
    /// Callers must have established that the key is not present; meeting an
    /// equal key mid-descent is a defect in the table itself.
    pub(crate) fn link_node(&mut self, side: Side, node: u32) {
        let bucket = self.bucket_of(side, node);
        *self.links_mut(side, node) = Links::detached();
        let mut current = self.roots[side.ix()][bucket];
        if current == NIL {
            self.roots[side.ix()][bucket] = node;
            return;
        }
        let parent = loop {
            let next = match self.node_key_cmp(side, node, current) {
                Ordering::Less => self.links(side, current).left,
                Ordering::Greater => self.links(side, current).right,
                Ordering::Equal => unreachable!("duplicate key in collision tree"),
            };
            if next == NIL {
                break current;
            }
            current = next;
        };
        self.links_mut(side, node).parent = parent;
        match self.node_key_cmp(side, node, parent) {
            Ordering::Less => self.links_mut(side, parent).left = node,
            _ => self.links_mut(side, parent).right = node,
        }
        self.rebalance(side, parent, true);
    }

    /// Unlinks `node` from its bucket tree on `side`. The slot itself is left
    /// alone; chain links and the other side are untouched.
    pub(crate) fn unlink_node(&mut self, side: Side, node: u32) {
        let Links {
            parent, left, right, ..
        } = self.links(side, node);
        if left == NIL && right == NIL {
            self.replace_child(side, parent, node, NIL);
            if parent != NIL {
                self.rebalance(side, parent, false);
            }
        } else if left != NIL && right != NIL {
            // Transplant the in-order successor into node's position. The
            // successor node moves; pair payloads never change slots.
            let succ = self.min_node(side, right);
            let succ_parent = self.links(side, succ).parent;
            let succ_right = self.links(side, succ).right;
            let start;
            if succ_parent == node {
                start = succ;
            } else {
                self.links_mut(side, succ_parent).left = succ_right;
                if succ_right != NIL {
                    self.links_mut(side, succ_right).parent = succ_parent;
                }
                self.links_mut(side, succ).right = right;
                self.links_mut(side, right).parent = succ;
                start = succ_parent;
            }
            self.links_mut(side, succ).left = left;
            self.links_mut(side, left).parent = succ;
            self.links_mut(side, succ).parent = parent;
            self.links_mut(side, succ).height = self.links(side, node).height;
            self.replace_child(side, parent, node, succ);
            self.rebalance(side, start, false);
        } else {
            let child = if left != NIL { left } else { right };
            self.links_mut(side, child).parent = parent;
            self.replace_child(side, parent, node, child);
            if parent != NIL {
                self.rebalance(side, parent, false);
            }
        }
    }
}
