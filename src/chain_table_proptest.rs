#![cfg(test)]

// Property tests for ChainTable kept inside the crate so they can walk the
// raw chains and free list after every operation.

use crate::chain_table::ChainTable;
use crate::config::TableConfig;
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations shrink well: indices shrink toward earlier keys
// and the op list shrinks in length.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Remove(usize),
    Get(usize),
    Mutate(usize, i32),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=24).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            3 => idx.clone().prop_map(Op::Remove),
            3 => idx.clone().prop_map(Op::Get),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn arb_config() -> impl Strategy<Value = TableConfig> {
    (1usize..20, prop_oneof![Just(0.5), Just(0.75), Just(1.0), 0.05f64..3.0]).prop_map(
        |(capacity, load_factor)| {
            TableConfig::new()
                .with_capacity(capacity)
                .with_load_factor(load_factor)
        },
    )
}

fn run<S: BuildHasher>(
    mut sut: ChainTable<String, i32, S>,
    pool: Vec<String>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();
    for op in ops {
        let capacity_before = sut.capacity();
        let free_before = sut.raw.free_count();
        match op {
            Op::Insert(i, v) => {
                let k = pool[i].clone();
                let fresh = !model.contains_key(&k);
                prop_assert_eq!(sut.insert(k.clone(), v), model.insert(k, v));
                // A new key takes a free slot when there is one; growth only
                // happens with an empty free list.
                if fresh && free_before > 0 {
                    prop_assert_eq!(sut.raw.free_count(), free_before - 1);
                    prop_assert_eq!(sut.capacity(), capacity_before);
                }
                if !fresh {
                    prop_assert_eq!(sut.capacity(), capacity_before);
                }
            }
            Op::Remove(i) => {
                let k = &pool[i];
                let expected = model.remove(k);
                prop_assert_eq!(sut.remove(k.as_str()), expected);
                let freed = usize::from(expected.is_some());
                prop_assert_eq!(sut.raw.free_count(), free_before + freed);
                prop_assert_eq!(sut.capacity(), capacity_before);
            }
            Op::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(k.as_str()), model.get(k));
                prop_assert_eq!(sut.contains_key(k.as_str()), model.contains_key(k));
            }
            Op::Mutate(i, d) => {
                let k = &pool[i];
                match (sut.get_mut(k.as_str()), model.get_mut(k)) {
                    (Some(a), Some(b)) => {
                        *a = a.wrapping_add(d);
                        *b = b.wrapping_add(d);
                    }
                    (None, None) => {}
                    (a, b) => prop_assert!(false, "presence mismatch: {:?} vs {:?}", a, b),
                }
            }
            Op::Clear => {
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.capacity(), capacity_before);
            }
        }

        sut.raw.check_invariants();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }

    let seen: BTreeMap<String, i32> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
    let expected: BTreeMap<String, i32> = model.into_iter().collect();
    prop_assert_eq!(seen, expected);
    Ok(())
}

// Property: state-machine equivalence with std::collections::HashMap under
// arbitrary starting capacities and load factors, with chain and free-list
// structure re-validated after every step.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(config in arb_config(), (pool, ops) in arb_scenario()) {
        let sut = ChainTable::with_config_and_hasher(config, RandomState::new());
        run(sut, pool, ops)?;
    }
}

#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same invariants with every key in one chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions(config in arb_config(), (pool, ops) in arb_scenario()) {
        let sut = ChainTable::with_config_and_hasher(config, ConstBuildHasher);
        run(sut, pool, ops)?;
    }
}

// Property: growth fires exactly when a new key finds no free slot and the
// slot array is full, and each growth doubles the bucket count.
proptest! {
    #[test]
    fn prop_growth_timing(capacity in 1usize..40, n in 1usize..300) {
        let mut t: ChainTable<usize, usize> = ChainTable::with_capacity_and_load_factor(capacity, 0.5);
        for k in 0..n {
            let before = (t.capacity(), t.slot_capacity(), t.raw.growths());
            let full = t.raw.high_water() == t.slot_capacity();
            t.insert(k, k);
            if full {
                prop_assert_eq!(t.raw.growths(), before.2 + 1);
                prop_assert!(t.capacity() >= before.0 * 2);
                prop_assert_eq!(t.capacity() % before.0, 0);
                prop_assert!(t.slot_capacity() > before.1);
            } else {
                prop_assert_eq!((t.capacity(), t.slot_capacity(), t.raw.growths()), before);
            }
        }
        for k in 0..n {
            prop_assert_eq!(t.get(&k), Some(&k));
        }
    }
}
