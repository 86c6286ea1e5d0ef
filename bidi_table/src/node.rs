use std::mem;

/// Sentinel slot id standing in for an absent node.
pub(crate) const NIL: u32 = u32::MAX;

/// Tree links of one slot on one side of the table.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Links {
    pub parent: u32,
    pub left: u32,
    pub right: u32,
    pub height: i32,
}

impl Links {
    pub fn detached() -> Self {
        Links {
            parent: NIL,
            left: NIL,
            right: NIL,
            height: 0,
        }
    }
}

/// Storage for one live pairing: both keys, both cached hashes, the tree links
/// for both sides and the iteration chain links.
///
/// A slot is simultaneously the primary-side and the secondary-side collision
/// tree node of its pairing, so finding the counterpart of a node never
/// requires a search.
#[derive(Clone, Debug)]
pub(crate) struct Slot<K1, K2> {
    pub primary: K1,
    pub secondary: K2,
    /// Cached key hashes, indexed by `Side`. Only re-derived when the
    /// corresponding key is overwritten, never during rehosting.
    pub hashes: [u64; 2],
    /// Tree links, indexed by `Side`.
    pub tree: [Links; 2],
    pub up: u32,
    pub down: u32,
}

impl<K1, K2> Slot<K1, K2> {
    pub fn new(primary: K1, secondary: K2, primary_hash: u64, secondary_hash: u64) -> Self {
        Slot {
            primary,
            secondary,
            hashes: [primary_hash, secondary_hash],
            tree: [Links::detached(); 2],
            up: NIL,
            down: NIL,
        }
    }
}

#[derive(Clone, Debug)]
enum SlotEntry<K1, K2> {
    Occupied(Slot<K1, K2>),
    Vacant { next_free: u32 },
}

/// Id-addressed slot storage with an intrusive free list, so slot ids stay
/// stable across unrelated insertions and removals.
#[derive(Clone, Debug)]
pub(crate) struct SlotArena<K1, K2> {
    entries: Vec<SlotEntry<K1, K2>>,
    free_head: u32,
}

impl<K1, K2> SlotArena<K1, K2> {
    pub fn new() -> Self {
        SlotArena {
            entries: Vec::new(),
            free_head: NIL,
        }
    }

    pub fn get(&self, id: u32) -> &Slot<K1, K2> {
        match &self.entries[id as usize] {
            SlotEntry::Occupied(slot) => slot,
            SlotEntry::Vacant { .. } => unreachable!("slot {id} is vacant"),
        }
    }

    pub fn get_mut(&mut self, id: u32) -> &mut Slot<K1, K2> {
        match &mut self.entries[id as usize] {
            SlotEntry::Occupied(slot) => slot,
            SlotEntry::Vacant { .. } => unreachable!("slot {id} is vacant"),
        }
    }

    pub fn alloc(&mut self, slot: Slot<K1, K2>) -> u32 {
        if self.free_head != NIL {
            let id = self.free_head;
            let SlotEntry::Vacant { next_free } = self.entries[id as usize] else {
                unreachable!("free list points at occupied slot {id}");
            };
            self.free_head = next_free;
            self.entries[id as usize] = SlotEntry::Occupied(slot);
            id
        } else {
            assert!(self.entries.len() < NIL as usize, "slot arena is full");
            let id = self.entries.len() as u32;
            self.entries.push(SlotEntry::Occupied(slot));
            id
        }
    }

    pub fn free(&mut self, id: u32) -> Slot<K1, K2> {
        let entry = mem::replace(
            &mut self.entries[id as usize],
            SlotEntry::Vacant {
                next_free: self.free_head,
            },
        );
        self.free_head = id;
        match entry {
            SlotEntry::Occupied(slot) => slot,
            SlotEntry::Vacant { .. } => unreachable!("freeing vacant slot {id}"),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.free_head = NIL;
    }
}
