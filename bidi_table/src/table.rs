//! [BidiTable] itself: two synchronized hash tables over one slot arena.
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};
use std::mem;

use zwohash::ZwoHasher;

use crate::node::{Slot, SlotArena, NIL};
use crate::tree::Side;
use crate::views::{Inverse, InverseMut, Iter, Keys, SecondaryKeys};
use crate::Cursor;

/// The build hasher used when none is specified.
pub type DefaultBuildHasher = BuildHasherDefault<ZwoHasher>;

const MINIMUM_CAPACITY: usize = 8;
const SMALLEST_MAX_LOAD_FACTOR: f32 = 0.2;
const DEFAULT_MAX_LOAD_FACTOR: f32 = 1.0;

/// Reports what [`BidiTable::insert_full`] replaced or displaced.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Overwritten<K1, K2> {
    /// Neither key was present; a fresh pairing was added.
    Neither,
    /// The primary key was present; its previous secondary key is returned.
    Primary(K2),
    /// The secondary key belonged to a different primary key; that pairing
    /// was removed and is returned.
    Secondary((K1, K2)),
    /// Both of the above at once.
    Both(K2, (K1, K2)),
}

/// A bijective hash map over mutually unique primary and secondary keys,
/// with both lookup directions equally fast.
///
/// Internally two hash tables (one per key direction) share a single slot
/// arena: each live pairing occupies one slot that serves as its collision
/// tree node in both tables. Collision chains are AVL trees instead of
/// linked chains, bounding every non-resizing operation by `O(log n)`, and a
/// doubly linked chain through the slots preserves insertion order for
/// iteration and for rehosting into resized tables.
///
/// Both key types must be totally ordered (for the collision trees) and
/// hashable. Key hashes are cached per pairing and reused, never recomputed,
/// when the tables grow or [compact](BidiTable::compact).
///
/// The table is bijective by construction: inserting a secondary key that
/// already belongs to a different primary key displaces that other pairing
/// (see [`insert_full`](BidiTable::insert_full)).
#[derive(Clone)]
pub struct BidiTable<K1, K2, S = DefaultBuildHasher> {
    pub(crate) slots: SlotArena<K1, K2>,
    /// Bucket root arrays, indexed by `Side`. Always of equal power-of-two
    /// length.
    pub(crate) roots: [Box<[u32]>; 2],
    /// `capacity - 1`, shared by both bucket arrays.
    pub(crate) mask: u64,
    pub(crate) len: usize,
    pub(crate) max_load_factor: f32,
    pub(crate) head: u32,
    pub(crate) tail: u32,
    /// Bumped on every visible structural change; cursors snapshot it to
    /// detect mutation made behind their back.
    pub(crate) op_count: u64,
    pub(crate) build_hasher: S,
}

impl<K1, K2, S: Default> BidiTable<K1, K2, S> {
    /// Returns an empty table with the default capacity and maximum load
    /// factor.
    pub fn new() -> Self {
        Self::with_capacity_and_load_factor(MINIMUM_CAPACITY, DEFAULT_MAX_LOAD_FACTOR)
    }

    /// Returns an empty table with at least the given capacity.
    ///
    /// The capacity is rounded up to a power of two and floored at 8.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_load_factor(capacity, DEFAULT_MAX_LOAD_FACTOR)
    }

    /// Returns an empty table with the given maximum load factor, floored at
    /// 0.2.
    pub fn with_load_factor(max_load_factor: f32) -> Self {
        Self::with_capacity_and_load_factor(MINIMUM_CAPACITY, max_load_factor)
    }

    /// Returns an empty table with the given capacity and maximum load
    /// factor, with the same floors as the single-argument constructors.
    pub fn with_capacity_and_load_factor(capacity: usize, max_load_factor: f32) -> Self {
        Self::with_capacity_and_load_factor_and_hasher(capacity, max_load_factor, S::default())
    }
}

impl<K1, K2, S: Default> Default for BidiTable<K1, K2, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K1, K2, S> BidiTable<K1, K2, S> {
    /// Returns an empty table with the provided build hasher.
    pub fn with_hasher(build_hasher: S) -> Self {
        Self::with_capacity_and_load_factor_and_hasher(
            MINIMUM_CAPACITY,
            DEFAULT_MAX_LOAD_FACTOR,
            build_hasher,
        )
    }

    /// Returns an empty table with the given capacity, maximum load factor
    /// and build hasher.
    pub fn with_capacity_and_load_factor_and_hasher(
        capacity: usize,
        max_load_factor: f32,
        build_hasher: S,
    ) -> Self {
        let capacity = capacity.max(MINIMUM_CAPACITY).next_power_of_two();
        let max_load_factor = max_load_factor.max(SMALLEST_MAX_LOAD_FACTOR);
        BidiTable {
            slots: SlotArena::new(),
            roots: [
                vec![NIL; capacity].into_boxed_slice(),
                vec![NIL; capacity].into_boxed_slice(),
            ],
            mask: (capacity - 1) as u64,
            len: 0,
            max_load_factor,
            head: NIL,
            tail: NIL,
            op_count: 0,
            build_hasher,
        }
    }

    /// Returns the number of pairings in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table contains no pairings.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the current capacity of each of the two bucket arrays.
    pub fn capacity(&self) -> usize {
        self.roots[0].len()
    }

    /// Returns `len / capacity`. Informational only.
    pub fn current_load_factor(&self) -> f32 {
        self.len as f32 / self.capacity() as f32
    }

    /// Returns an iterator over all pairings in insertion order.
    pub fn iter(&self) -> Iter<'_, K1, K2, S> {
        Iter::new(self)
    }

    /// Returns an iterator over all primary keys in insertion order.
    pub fn keys(&self) -> Keys<'_, K1, K2, S> {
        Keys::new(self)
    }

    /// Returns an iterator over all secondary keys in insertion order.
    pub fn secondary_keys(&self) -> SecondaryKeys<'_, K1, K2, S> {
        SecondaryKeys::new(self)
    }

    /// Returns a read-only view of this table with the key roles swapped.
    pub fn inverse(&self) -> Inverse<'_, K1, K2, S> {
        Inverse { table: self }
    }

    /// Returns a mutating view of this table with the key roles swapped.
    ///
    /// Mutations through the view go through this table's own machinery:
    /// there is one size and one operation counter, and changes are
    /// immediately visible through the table and all other views.
    pub fn inverse_mut(&mut self) -> InverseMut<'_, K1, K2, S> {
        InverseMut { table: self }
    }

    /// Returns a detached fail-fast cursor positioned before the first
    /// pairing in insertion order.
    ///
    /// The cursor borrows the table only per call, so the table may be
    /// mutated between steps; [`Cursor::next`] detects that and fails
    /// instead of iterating over a structure it no longer understands. Only
    /// use a cursor with the table that created it.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.op_count, self.len, self.head)
    }
}

impl<K1: Ord + Hash, K2: Ord + Hash, S: BuildHasher> BidiTable<K1, K2, S> {
    fn hash_one<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.build_hasher.hash_one(key)
    }

    pub(crate) fn find_primary_hashed<Q>(&self, key: &Q, hash: u64) -> Option<u32>
    where
        Q: Ord + ?Sized,
        K1: Borrow<Q>,
    {
        let mut node = self.roots[Side::Primary.ix()][(hash & self.mask) as usize];
        while node != NIL {
            let slot = self.slots.get(node);
            node = match key.cmp(slot.primary.borrow()) {
                Ordering::Less => slot.tree[Side::Primary.ix()].left,
                Ordering::Greater => slot.tree[Side::Primary.ix()].right,
                Ordering::Equal => return Some(node),
            };
        }
        None
    }

    pub(crate) fn find_secondary_hashed<Q>(&self, key: &Q, hash: u64) -> Option<u32>
    where
        Q: Ord + ?Sized,
        K2: Borrow<Q>,
    {
        let mut node = self.roots[Side::Secondary.ix()][(hash & self.mask) as usize];
        while node != NIL {
            let slot = self.slots.get(node);
            node = match key.cmp(slot.secondary.borrow()) {
                Ordering::Less => slot.tree[Side::Secondary.ix()].left,
                Ordering::Greater => slot.tree[Side::Secondary.ix()].right,
                Ordering::Equal => return Some(node),
            };
        }
        None
    }

    pub(crate) fn find_primary<Q>(&self, key: &Q) -> Option<u32>
    where
        Q: Ord + Hash + ?Sized,
        K1: Borrow<Q>,
    {
        self.find_primary_hashed(key, self.hash_one(key))
    }

    pub(crate) fn find_secondary<Q>(&self, key: &Q) -> Option<u32>
    where
        Q: Ord + Hash + ?Sized,
        K2: Borrow<Q>,
    {
        self.find_secondary_hashed(key, self.hash_one(key))
    }

    /// Returns `true` if the given primary key is present.
    pub fn contains_primary<Q>(&self, primary: &Q) -> bool
    where
        Q: Ord + Hash + ?Sized,
        K1: Borrow<Q>,
    {
        self.find_primary(primary).is_some()
    }

    /// Returns `true` if the given secondary key is present.
    pub fn contains_secondary<Q>(&self, secondary: &Q) -> bool
    where
        Q: Ord + Hash + ?Sized,
        K2: Borrow<Q>,
    {
        self.find_secondary(secondary).is_some()
    }

    /// Returns the secondary key paired with the given primary key, if any.
    pub fn get<Q>(&self, primary: &Q) -> Option<&K2>
    where
        Q: Ord + Hash + ?Sized,
        K1: Borrow<Q>,
    {
        self.find_primary(primary)
            .map(|node| &self.slots.get(node).secondary)
    }

    /// Returns the primary key paired with the given secondary key, if any.
    pub fn get_by_secondary<Q>(&self, secondary: &Q) -> Option<&K1>
    where
        Q: Ord + Hash + ?Sized,
        K2: Borrow<Q>,
    {
        self.find_secondary(secondary)
            .map(|node| &self.slots.get(node).primary)
    }

    /// Returns `true` if every key yielded by `primaries` is present.
    pub fn contains_all_primary<'q, Q, I>(&self, primaries: I) -> bool
    where
        Q: Ord + Hash + ?Sized + 'q,
        K1: Borrow<Q>,
        I: IntoIterator<Item = &'q Q>,
    {
        primaries.into_iter().all(|key| self.contains_primary(key))
    }

    /// Returns `true` if every key yielded by `secondaries` is present.
    pub fn contains_all_secondary<'q, Q, I>(&self, secondaries: I) -> bool
    where
        Q: Ord + Hash + ?Sized + 'q,
        K2: Borrow<Q>,
        I: IntoIterator<Item = &'q Q>,
    {
        secondaries
            .into_iter()
            .all(|key| self.contains_secondary(key))
    }

    /// Pairs `primary` with `secondary`, returning the secondary key
    /// previously paired with `primary`, if any.
    ///
    /// Equivalent to [`insert_full`](Self::insert_full) with the displacement
    /// report reduced to the previous secondary key.
    pub fn insert(&mut self, primary: K1, secondary: K2) -> Option<K2> {
        match self.insert_full(primary, secondary) {
            Overwritten::Primary(old) | Overwritten::Both(old, _) => Some(old),
            Overwritten::Neither | Overwritten::Secondary(_) => None,
        }
    }

    /// Pairs `primary` with `secondary` and reports everything the operation
    /// replaced or displaced.
    ///
    /// If `primary` is already present, its secondary key is overwritten in
    /// place: the pairing keeps its identity and its position in the
    /// insertion order, and the secondary table is re-indexed for the new
    /// key. If `secondary` is already paired with a *different* primary key,
    /// that pairing is removed so that both key spaces stay duplicate-free.
    ///
    /// Overwriting a pairing with an equal secondary key replaces the stored
    /// key object but is not a structural change: live cursors stay valid.
    pub fn insert_full(&mut self, primary: K1, secondary: K2) -> Overwritten<K1, K2> {
        let primary_hash = self.hash_one(&primary);
        let secondary_hash = self.hash_one(&secondary);
        if let Some(node) = self.find_primary_hashed(&primary, primary_hash) {
            if self.slots.get(node).secondary == secondary {
                let slot = self.slots.get_mut(node);
                slot.hashes[Side::Secondary.ix()] = secondary_hash;
                return Overwritten::Primary(mem::replace(&mut slot.secondary, secondary));
            }
            let displaced = match self.find_secondary_hashed(&secondary, secondary_hash) {
                Some(other) if other != node => Some(self.remove_slot(other)),
                _ => None,
            };
            self.unlink_node(Side::Secondary, node);
            let slot = self.slots.get_mut(node);
            slot.hashes[Side::Secondary.ix()] = secondary_hash;
            let old = mem::replace(&mut slot.secondary, secondary);
            self.link_node(Side::Secondary, node);
            self.op_count += 1;
            match displaced {
                Some(pair) => Overwritten::Both(old, pair),
                None => Overwritten::Primary(old),
            }
        } else {
            let displaced = self
                .find_secondary_hashed(&secondary, secondary_hash)
                .map(|other| self.remove_slot(other));
            self.grow_if_needed();
            let node = self
                .slots
                .alloc(Slot::new(primary, secondary, primary_hash, secondary_hash));
            self.link_node(Side::Primary, node);
            self.link_node(Side::Secondary, node);
            self.chain_push(node);
            self.len += 1;
            self.op_count += 1;
            match displaced {
                Some(pair) => Overwritten::Secondary(pair),
                None => Overwritten::Neither,
            }
        }
    }

    /// Pairs `primary` with `secondary` and returns whether the table
    /// changed, i.e. whether the pairing was not already present with an
    /// equal secondary key.
    pub fn insert_pair(&mut self, primary: K1, secondary: K2) -> bool {
        let unchanged = self.get(&primary) == Some(&secondary);
        self.insert_full(primary, secondary);
        !unchanged
    }

    /// The mirror image of [`insert_full`](Self::insert_full), driven from
    /// the secondary side: an existing secondary key has its primary key
    /// overwritten in place (keeping the pairing's insertion-order
    /// position), and a conflicting pairing of the new primary key is
    /// displaced. Returns the primary key previously paired with
    /// `secondary`, if any.
    pub(crate) fn insert_by_secondary(&mut self, secondary: K2, primary: K1) -> Option<K1> {
        let primary_hash = self.hash_one(&primary);
        let secondary_hash = self.hash_one(&secondary);
        if let Some(node) = self.find_secondary_hashed(&secondary, secondary_hash) {
            if self.slots.get(node).primary == primary {
                let slot = self.slots.get_mut(node);
                slot.hashes[Side::Primary.ix()] = primary_hash;
                return Some(mem::replace(&mut slot.primary, primary));
            }
            match self.find_primary_hashed(&primary, primary_hash) {
                Some(other) if other != node => {
                    self.remove_slot(other);
                }
                _ => {}
            }
            self.unlink_node(Side::Primary, node);
            let slot = self.slots.get_mut(node);
            slot.hashes[Side::Primary.ix()] = primary_hash;
            let old = mem::replace(&mut slot.primary, primary);
            self.link_node(Side::Primary, node);
            self.op_count += 1;
            Some(old)
        } else {
            if let Some(other) = self.find_primary_hashed(&primary, primary_hash) {
                self.remove_slot(other);
            }
            self.grow_if_needed();
            let node = self
                .slots
                .alloc(Slot::new(primary, secondary, primary_hash, secondary_hash));
            self.link_node(Side::Primary, node);
            self.link_node(Side::Secondary, node);
            self.chain_push(node);
            self.len += 1;
            self.op_count += 1;
            None
        }
    }

    /// Removes the pairing with the given primary key and returns its
    /// secondary key. Removing an absent key is a no-op.
    pub fn remove<Q>(&mut self, primary: &Q) -> Option<K2>
    where
        Q: Ord + Hash + ?Sized,
        K1: Borrow<Q>,
    {
        self.remove_full(primary).map(|(_, secondary)| secondary)
    }

    /// Removes the pairing with the given primary key and returns both keys.
    pub fn remove_full<Q>(&mut self, primary: &Q) -> Option<(K1, K2)>
    where
        Q: Ord + Hash + ?Sized,
        K1: Borrow<Q>,
    {
        let node = self.find_primary(primary)?;
        Some(self.remove_slot(node))
    }

    /// Removes the pairing with the given secondary key and returns its
    /// primary key. Removing an absent key is a no-op.
    pub fn remove_by_secondary<Q>(&mut self, secondary: &Q) -> Option<K1>
    where
        Q: Ord + Hash + ?Sized,
        K2: Borrow<Q>,
    {
        let node = self.find_secondary(secondary)?;
        Some(self.remove_slot(node).0)
    }

    /// Removes every pairing whose primary key is yielded by `primaries`.
    /// Returns whether anything was removed. Not atomic as a whole; each
    /// individual removal is.
    pub fn remove_all<'q, Q, I>(&mut self, primaries: I) -> bool
    where
        Q: Ord + Hash + ?Sized + 'q,
        K1: Borrow<Q>,
        I: IntoIterator<Item = &'q Q>,
    {
        let mut removed = false;
        for key in primaries {
            removed |= self.remove(key).is_some();
        }
        removed
    }

    /// Removes every pairing for which `f` returns `false`, visiting
    /// pairings in insertion order.
    pub fn retain(&mut self, mut f: impl FnMut(&K1, &K2) -> bool) {
        let mut node = self.head;
        while node != NIL {
            let (next, keep) = {
                let slot = self.slots.get(node);
                (slot.down, f(&slot.primary, &slot.secondary))
            };
            if !keep {
                self.remove_slot(node);
            }
            node = next;
        }
    }

    /// Shared removal path: unlink from both trees and the chain, free the
    /// slot, return both keys.
    pub(crate) fn remove_slot(&mut self, node: u32) -> (K1, K2) {
        self.unlink_node(Side::Primary, node);
        self.unlink_node(Side::Secondary, node);
        self.chain_unlink(node);
        self.len -= 1;
        self.op_count += 1;
        let slot = self.slots.free(node);
        (slot.primary, slot.secondary)
    }

    /// Removes all pairings. Keeps the current capacity; use
    /// [`compact`](Self::compact) to release table storage.
    pub fn clear(&mut self) {
        if self.len == 0 {
            return;
        }
        self.op_count += self.len as u64;
        self.len = 0;
        self.head = NIL;
        self.tail = NIL;
        self.slots.clear();
        for roots in self.roots.iter_mut() {
            roots.fill(NIL);
        }
    }

    /// Shrinks the bucket arrays to the smallest power-of-two capacity that
    /// keeps the table within its maximum load factor. A no-op if no smaller
    /// capacity qualifies.
    pub fn compact(&mut self) {
        let mut new_capacity = MINIMUM_CAPACITY;
        while self.len as f32 > self.max_load_factor * new_capacity as f32 {
            new_capacity <<= 1;
        }
        if new_capacity == self.capacity() {
            return;
        }
        let old_capacity = self.capacity();
        log::debug!("compacting tables {old_capacity} -> {new_capacity}");
        self.rehost(new_capacity);
        self.op_count += 1;
    }

    fn grow_if_needed(&mut self) {
        if (self.len + 1) as f32 <= self.max_load_factor * self.capacity() as f32 {
            return;
        }
        let old_capacity = self.capacity();
        let new_capacity = old_capacity << 1;
        log::debug!("growing tables {old_capacity} -> {new_capacity}");
        self.rehost(new_capacity);
    }

    /// Replaces both bucket arrays and relinks every pairing by walking the
    /// chain once. Bucket indices come from the cached hashes and the new
    /// mask; hashes themselves are never recomputed.
    fn rehost(&mut self, new_capacity: usize) {
        self.roots = [
            vec![NIL; new_capacity].into_boxed_slice(),
            vec![NIL; new_capacity].into_boxed_slice(),
        ];
        self.mask = (new_capacity - 1) as u64;
        let mut node = self.head;
        while node != NIL {
            self.link_node(Side::Primary, node);
            self.link_node(Side::Secondary, node);
            node = self.slots.get(node).down;
        }
        log::trace!("relinked {len} pairings", len = self.len);
    }
}

impl<K1: Ord + Hash, K2: Ord + Hash, S: BuildHasher> Extend<(K1, K2)> for BidiTable<K1, K2, S> {
    fn extend<I: IntoIterator<Item = (K1, K2)>>(&mut self, iter: I) {
        for (primary, secondary) in iter {
            self.insert(primary, secondary);
        }
    }
}

impl<K1: Ord + Hash, K2: Ord + Hash, S: BuildHasher + Default> FromIterator<(K1, K2)>
    for BidiTable<K1, K2, S>
{
    fn from_iter<I: IntoIterator<Item = (K1, K2)>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

impl<K1: std::fmt::Debug, K2: std::fmt::Debug, S> std::fmt::Debug for BidiTable<K1, K2, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
