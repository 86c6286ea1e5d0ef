#![allow(missing_docs)]
use crate::node::NIL;
use crate::table::{BidiTable, Overwritten};
use crate::tree::Side;
use crate::CursorError;
use indexmap::IndexMap;
use rand::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};

impl<K1: Ord + Hash, K2: Ord + Hash, S: BuildHasher> BidiTable<K1, K2, S> {
    /// Validates every structural invariant: chain shape and length, bucket
    /// placement by cached hash, BST order, parent links, heights and AVL
    /// balance on both sides, and hash cache consistency.
    fn check(&self) {
        assert!(self.capacity().is_power_of_two());
        assert!(self.capacity() >= 8);
        assert_eq!(self.mask, (self.capacity() - 1) as u64);
        assert_eq!(self.roots[0].len(), self.roots[1].len());

        let mut count = 0;
        let mut prev = NIL;
        let mut node = self.head;
        while node != NIL {
            let slot = self.slots.get(node);
            assert_eq!(slot.up, prev, "chain up link broken");
            assert_eq!(slot.hashes[0], self.build_hasher.hash_one(&slot.primary));
            assert_eq!(slot.hashes[1], self.build_hasher.hash_one(&slot.secondary));
            prev = node;
            node = slot.down;
            count += 1;
            assert!(count <= self.len(), "chain longer than len");
        }
        assert_eq!(count, self.len(), "chain shorter than len");
        assert_eq!(self.tail, prev, "chain tail mismatch");

        for side in [Side::Primary, Side::Secondary] {
            let mut tree_count = 0;
            for bucket in 0..self.capacity() {
                let root = self.roots[side.ix()][bucket];
                if root == NIL {
                    continue;
                }
                assert_eq!(self.links(side, root).parent, NIL, "root has a parent");
                tree_count += self.check_subtree(side, bucket, root);
            }
            assert_eq!(tree_count, self.len(), "tree node count != len");
        }
    }

    fn check_subtree(&self, side: Side, bucket: usize, node: u32) -> usize {
        assert_eq!(self.bucket_of(side, node), bucket, "node in wrong bucket");
        let links = self.links(side, node);
        let mut count = 1;
        let mut child_heights = [-1i32; 2];
        for (ix, child) in [links.left, links.right].into_iter().enumerate() {
            if child == NIL {
                continue;
            }
            assert_eq!(self.links(side, child).parent, node, "parent link broken");
            let expected = if ix == 0 {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            assert_eq!(
                self.node_key_cmp(side, child, node),
                expected,
                "bucket tree key order broken"
            );
            count += self.check_subtree(side, bucket, child);
            child_heights[ix] = self.links(side, child).height;
        }
        assert_eq!(
            links.height,
            child_heights[0].max(child_heights[1]) + 1,
            "stale height"
        );
        assert!(
            (child_heights[0] - child_heights[1]).abs() <= 1,
            "AVL balance broken"
        );
        count
    }
}

/// Hasher sending every key to bucket zero, to drive all collisions through
/// one pair of bucket trees.
#[derive(Default)]
struct OneBucketHasher;

impl Hasher for OneBucketHasher {
    fn write(&mut self, _bytes: &[u8]) {}

    fn finish(&self) -> u64 {
        0
    }
}

/// Reference model: an insertion-ordered forward map plus a backward map,
/// with the displacement semantics of `BidiTable` applied by hand.
struct RefModel<K1, K2> {
    forward: IndexMap<K1, K2>,
    backward: HashMap<K2, K1>,
}

impl<K1, K2> RefModel<K1, K2>
where
    K1: Ord + Hash + Clone + Debug,
    K2: Ord + Hash + Clone + Debug,
{
    fn new() -> Self {
        RefModel {
            forward: IndexMap::new(),
            backward: HashMap::new(),
        }
    }

    fn insert(&mut self, primary: K1, secondary: K2) -> Overwritten<K1, K2> {
        match self.forward.get(&primary).cloned() {
            Some(old) if old == secondary => {
                self.forward.insert(primary.clone(), secondary.clone());
                self.backward.insert(secondary, primary);
                Overwritten::Primary(old)
            }
            Some(old) => {
                let displaced = match self.backward.get(&secondary).cloned() {
                    Some(other) if other != primary => {
                        self.forward.shift_remove(&other);
                        Some((other, secondary.clone()))
                    }
                    _ => None,
                };
                self.backward.remove(&old);
                self.forward.insert(primary.clone(), secondary.clone());
                self.backward.insert(secondary, primary);
                match displaced {
                    Some(pair) => Overwritten::Both(old, pair),
                    None => Overwritten::Primary(old),
                }
            }
            None => {
                let displaced = self.backward.get(&secondary).cloned().map(|other| {
                    self.forward.shift_remove(&other);
                    (other, secondary.clone())
                });
                self.forward.insert(primary.clone(), secondary.clone());
                self.backward.insert(secondary, primary);
                match displaced {
                    Some(pair) => Overwritten::Secondary(pair),
                    None => Overwritten::Neither,
                }
            }
        }
    }

    fn insert_by_secondary(&mut self, secondary: K2, primary: K1) -> Option<K1> {
        match self.backward.get(&secondary).cloned() {
            Some(old) if old == primary => {
                self.forward.insert(primary.clone(), secondary.clone());
                self.backward.insert(secondary, primary);
                Some(old)
            }
            Some(old) => {
                if let Some(other_secondary) = self.forward.shift_remove(&primary) {
                    self.backward.remove(&other_secondary);
                }
                let index = self.forward.get_index_of(&old).unwrap();
                self.forward.shift_remove(&old);
                self.forward
                    .shift_insert(index, primary.clone(), secondary.clone());
                self.backward.insert(secondary, primary);
                Some(old)
            }
            None => {
                if let Some(other_secondary) = self.forward.shift_remove(&primary) {
                    self.backward.remove(&other_secondary);
                }
                self.forward.insert(primary.clone(), secondary.clone());
                self.backward.insert(secondary, primary);
                None
            }
        }
    }

    fn remove(&mut self, primary: &K1) -> Option<K2> {
        let secondary = self.forward.shift_remove(primary)?;
        self.backward.remove(&secondary);
        Some(secondary)
    }

    fn remove_by_secondary(&mut self, secondary: &K2) -> Option<K1> {
        let primary = self.backward.remove(secondary)?;
        self.forward.shift_remove(&primary);
        Some(primary)
    }
}

struct CheckedTable<K1, K2, S> {
    dut: BidiTable<K1, K2, S>,
    reference: RefModel<K1, K2>,
}

impl<K1, K2, S> CheckedTable<K1, K2, S>
where
    K1: Ord + Hash + Clone + Debug,
    K2: Ord + Hash + Clone + Debug,
    S: BuildHasher + Default,
{
    fn new(max_load_factor: f32) -> Self {
        CheckedTable {
            dut: BidiTable::with_capacity_and_load_factor_and_hasher(
                8,
                max_load_factor,
                S::default(),
            ),
            reference: RefModel::new(),
        }
    }

    fn len(&self) -> usize {
        self.reference.forward.len()
    }

    fn insert(&mut self, primary: K1, secondary: K2) -> Overwritten<K1, K2> {
        let ref_result = self.reference.insert(primary.clone(), secondary.clone());
        let dut_result = self.dut.insert_full(primary, secondary);
        assert_eq!(ref_result, dut_result);
        ref_result
    }

    fn insert_by_secondary(&mut self, secondary: K2, primary: K1) -> Option<K1> {
        let ref_result = self
            .reference
            .insert_by_secondary(secondary.clone(), primary.clone());
        let dut_result = self.dut.inverse_mut().insert(secondary, primary);
        assert_eq!(ref_result, dut_result);
        ref_result
    }

    fn get(&self, primary: &K1) -> Option<&K2> {
        let ref_result = self.reference.forward.get(primary);
        let dut_result = self.dut.get(primary);
        assert_eq!(ref_result, dut_result);
        assert_eq!(ref_result.is_some(), self.dut.contains_primary(primary));
        ref_result
    }

    fn get_by_secondary(&self, secondary: &K2) -> Option<&K1> {
        let ref_result = self.reference.backward.get(secondary);
        let dut_result = self.dut.get_by_secondary(secondary);
        assert_eq!(ref_result, dut_result);
        assert_eq!(ref_result.is_some(), self.dut.contains_secondary(secondary));
        ref_result
    }

    fn remove(&mut self, primary: &K1) -> Option<K2> {
        let ref_result = self.reference.remove(primary);
        let dut_result = self.dut.remove(primary);
        assert_eq!(ref_result, dut_result);
        ref_result
    }

    fn remove_by_secondary(&mut self, secondary: &K2) -> Option<K1> {
        let ref_result = self.reference.remove_by_secondary(secondary);
        let dut_result = self.dut.remove_by_secondary(secondary);
        assert_eq!(ref_result, dut_result);
        ref_result
    }

    fn retain(&mut self, f: impl Fn(&K1, &K2) -> bool) {
        let mut ref_iter = self.reference.forward.iter();
        self.dut.retain(|primary, secondary| {
            // retain must visit in insertion order
            assert_eq!(ref_iter.next(), Some((primary, secondary)));
            f(primary, secondary)
        });
        assert_eq!(ref_iter.next(), None);
        self.reference.forward.retain(|k, v| f(k, v));
        self.reference
            .backward
            .retain(|secondary, primary| f(primary, secondary));
        self.check();
    }

    /// Walks a cursor over the table, removing every third pairing through
    /// the cursor itself.
    fn cursor_sweep(&mut self) {
        let mut cursor = self.dut.cursor();
        let mut visited = 0usize;
        while cursor.has_next() {
            let key = {
                let (primary, _) = cursor.next(&self.dut).unwrap();
                primary.clone()
            };
            if visited % 3 == 0 {
                let (removed_primary, removed_secondary) = cursor.remove(&mut self.dut).unwrap();
                assert_eq!(removed_primary, key);
                let ref_secondary = self.reference.forward.shift_remove(&key).unwrap();
                assert_eq!(ref_secondary, removed_secondary);
                self.reference.backward.remove(&removed_secondary);
            }
            visited += 1;
        }
        assert_eq!(cursor.next(&self.dut), Err(CursorError::Exhausted));
    }

    fn compact(&mut self) {
        self.dut.compact();
        let mut expected = 8;
        while self.dut.len() as f32 > self.dut.max_load_factor * expected as f32 {
            expected <<= 1;
        }
        assert_eq!(self.dut.capacity(), expected);
        self.check();
    }

    fn clear(&mut self) {
        self.dut.clear();
        self.reference.forward.clear();
        self.reference.backward.clear();
        self.check();
    }

    fn check(&self) {
        self.dut.check();
        assert_eq!(self.dut.len(), self.reference.forward.len());
        assert_eq!(self.dut.len(), self.reference.backward.len());
        assert!(Iterator::eq(self.dut.iter(), self.reference.forward.iter()));
        assert!(Iterator::eq(self.dut.keys(), self.reference.forward.keys()));
        assert!(Iterator::eq(
            self.dut.secondary_keys(),
            self.reference.forward.values()
        ));
    }

    /// NB: `random_likelihood` is **not** a probability. `random_likelihood
    /// == 2.0` would be 2:1 odds random:present, i.e. 2/3 probability.
    fn present_or_random_primary<R: Rng>(
        &self,
        random_likelihood: f64,
        rng: &mut R,
        mut rand_k: impl FnMut(&mut R) -> K1,
    ) -> K1 {
        if self.len() == 0 || rng.gen_range(0.0..1.0 + random_likelihood) >= 1.0 {
            rand_k(rng)
        } else {
            self.reference
                .forward
                .get_index(rng.gen_range(0..self.len()))
                .unwrap()
                .0
                .clone()
        }
    }

    fn present_or_random_secondary<R: Rng>(
        &self,
        random_likelihood: f64,
        rng: &mut R,
        mut rand_v: impl FnMut(&mut R) -> K2,
    ) -> K2 {
        if self.len() == 0 || rng.gen_range(0.0..1.0 + random_likelihood) >= 1.0 {
            rand_v(rng)
        } else {
            self.reference
                .forward
                .get_index(rng.gen_range(0..self.len()))
                .unwrap()
                .1
                .clone()
        }
    }
}

macro_rules! weighted_choose {
    ($rng:expr, $($name:ident: $weight:expr => $body:expr),+) => {
        {
            enum Branches { $( $name,  )* }
            let weights = [$((Branches::$name, $weight)),+];
            match weights.choose_weighted($rng, |x| x.1).unwrap().0 {
                $(Branches::$name => $body),*
            }
        }
    }
}

fn test_suite<K1, K2, S, R>(
    max_load_factor: f32,
    mut rand_k: impl FnMut(&mut R) -> K1,
    mut rand_v: impl FnMut(&mut R) -> K2,
    retain_fn: impl Fn(&K1, &K2) -> bool,
) where
    K1: Ord + Hash + Clone + Debug,
    K2: Ord + Hash + Clone + Debug,
    S: BuildHasher + Default,
    R: Rng + SeedableRng,
{
    let mut table: CheckedTable<K1, K2, S> = CheckedTable::new(max_load_factor);
    let mut rng = R::seed_from_u64(39);
    let mut max_size = 0;
    for _ in 0..5000 {
        weighted_choose! {&mut rng,
            Insert: 2.0 => {
                let k = table.present_or_random_primary(6.0, &mut rng, &mut rand_k);
                let v = rand_v(&mut rng);
                table.insert(k, v);
            },
            InsertBySecondary: 1.0 => {
                let v = table.present_or_random_secondary(6.0, &mut rng, &mut rand_v);
                let k = rand_k(&mut rng);
                table.insert_by_secondary(v, k);
            },
            Get: 0.5 => {
                let k = table.present_or_random_primary(1.0, &mut rng, &mut rand_k);
                table.get(&k);
            },
            GetBySecondary: 0.5 => {
                let v = table.present_or_random_secondary(1.0, &mut rng, &mut rand_v);
                table.get_by_secondary(&v);
            },
            Remove: 0.7 => {
                let k = table.present_or_random_primary(1.0, &mut rng, &mut rand_k);
                table.remove(&k);
            },
            RemoveBySecondary: 0.5 => {
                let v = table.present_or_random_secondary(1.0, &mut rng, &mut rand_v);
                table.remove_by_secondary(&v);
            },
            Retain: 0.05 => {
                table.retain(&retain_fn);
            },
            CursorSweep: 0.05 => {
                table.cursor_sweep();
                table.check();
            },
            Compact: 0.05 => {
                table.compact();
            },
            Clear: 0.01 => {
                table.clear();
            },
            Check: 0.15 => {
                table.check();
            }
        };
        max_size = std::cmp::max(max_size, table.len());
    }
    table.check();
    println!("max size {max_size}");
}

#[test]
fn test_suite_u32_u32() {
    test_suite::<u32, u32, crate::DefaultBuildHasher, rand_pcg::Pcg64>(
        1.0,
        |rng| rng.gen_range(0..60),
        |rng| rng.gen_range(0..60),
        |k, v| (k + v) % 7 < 6,
    );
}

#[test]
fn test_suite_one_bucket() {
    // every key collides, so both tables degenerate to a single AVL tree
    test_suite::<u32, u32, BuildHasherDefault<OneBucketHasher>, rand_pcg::Pcg64>(
        1.0,
        |rng| rng.gen_range(0..200),
        |rng| rng.gen_range(0..200),
        |k, v| (k ^ v) % 5 != 0,
    );
}

#[test]
fn test_suite_overloaded_buckets() {
    // a high maximum load factor keeps the tables at minimum capacity and
    // forces deep collision trees
    test_suite::<u32, u32, crate::DefaultBuildHasher, rand_pcg::Pcg64>(
        64.0,
        |rng| rng.gen_range(0..300),
        |rng| rng.gen_range(0..300),
        |k, v| (k + v) % 9 < 8,
    );
}

#[test]
fn test_suite_string_u32() {
    test_suite::<String, u32, crate::DefaultBuildHasher, rand_pcg::Pcg64>(
        0.5,
        |rng| {
            let len = rng.gen_range(1..8);
            String::from_iter((0..len).map(|_| rng.gen_range('a'..'e')))
        },
        |rng| rng.gen_range(0..100),
        |k: &String, _| !k.contains('d'),
    );
}
