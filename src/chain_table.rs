//! ChainTable: the public map. Hashes keys once per call and delegates the
//! structural work to `RawTable`.

use crate::config::TableConfig;
use crate::error::ConfigError;
use crate::iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
use crate::raw_table::{mask_hash, RawTable};
use crate::reentrancy::DebugReentrancy;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::mem;
use std::collections::hash_map::RandomState;

/// A hash map with separately chained buckets stored in flat arrays.
///
/// Entries live in a slot array and are linked into per-bucket chains by
/// index. Removed slots go onto a free list and are reused by later inserts
/// before the table ever grows. Growth doubles the bucket count once the slot
/// array is full; nothing ever shrinks.
///
/// ```
/// use chain_table::ChainTable;
///
/// let mut t = ChainTable::new();
/// assert_eq!(t.insert("apple", 3), None);
/// assert_eq!(t.insert("apple", 5), Some(3));
/// assert_eq!(t.get("apple"), Some(&5));
/// assert_eq!(t.remove("apple"), Some(5));
/// assert!(t.is_empty());
/// ```
pub struct ChainTable<K, V, S = RandomState> {
    hasher: S,
    pub(crate) raw: RawTable<K, V>,
    reentrancy: DebugReentrancy,
}

impl<K, V> ChainTable<K, V, RandomState> {
    /// 13 buckets, load factor 0.5.
    pub fn new() -> Self {
        Self::with_config_and_hasher(TableConfig::new(), RandomState::new())
    }

    /// # Panics
    ///
    /// If `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config_and_hasher(
            TableConfig::new().with_capacity(capacity),
            RandomState::new(),
        )
    }

    /// # Panics
    ///
    /// If `load_factor` is not a finite number greater than zero, or is so
    /// small that 13 buckets would need more than
    /// [`MAX_FIRST_SLOT_DOUBLINGS`](crate::MAX_FIRST_SLOT_DOUBLINGS) doublings
    /// to hold one entry.
    pub fn with_load_factor(load_factor: f64) -> Self {
        Self::with_config_and_hasher(
            TableConfig::new().with_load_factor(load_factor),
            RandomState::new(),
        )
    }

    /// # Panics
    ///
    /// On the same parameters as [`TableConfig::validate`] rejects.
    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: f64) -> Self {
        Self::with_config_and_hasher(
            TableConfig::new()
                .with_capacity(capacity)
                .with_load_factor(load_factor),
            RandomState::new(),
        )
    }
}

impl<K, V> Default for ChainTable<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> ChainTable<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_config_and_hasher(TableConfig::new(), hasher)
    }

    /// # Panics
    ///
    /// If `config` fails [`TableConfig::validate`].
    pub fn with_config_and_hasher(config: TableConfig, hasher: S) -> Self {
        match Self::try_with_config_and_hasher(config, hasher) {
            Ok(table) => table,
            Err(e) => panic!("invalid ChainTable configuration: {e}"),
        }
    }

    pub fn try_with_config_and_hasher(config: TableConfig, hasher: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            hasher,
            raw: RawTable::new(config),
            reentrancy: DebugReentrancy::new(),
        })
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.len() == 0
    }

    /// Current number of buckets.
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Number of entries the slot array holds before the next insert of a
    /// new key (with no free slot to reuse) grows the table.
    pub fn slot_capacity(&self) -> usize {
        self.raw.threshold()
    }

    pub fn load_factor(&self) -> f64 {
        self.raw.load_factor()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Drops every entry. Bucket and slot capacity are kept.
    pub fn clear(&mut self) {
        let drained = {
            let _g = self.reentrancy.enter("clear");
            self.raw.clear()
        };
        drop(drained);
    }

    /// Visits live entries in slot order, which is not a stable order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.raw.slots(), self.raw.len())
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let len = self.raw.len();
        IterMut::new(self.raw.slots_mut(), len)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> crate::stats::TableStats {
        self.raw.stats()
    }
}

impl<K, V, S> ChainTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        mask_hash(self.hasher.hash_one(q))
    }

    /// Inserts or updates. Returns the previous value for an existing key,
    /// whose stored key is kept.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let _g = self.reentrancy.enter("insert");
        let hash = self.make_hash(&key);
        if let Some(slot) = self.raw.find_mut(hash, |k| *k == key) {
            return Some(mem::replace(slot, value));
        }
        self.raw.insert_new(hash, key, value);
        None
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("get");
        let hash = self.make_hash(q);
        self.raw.find(hash, |k| k.borrow() == q)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("get_mut");
        let hash = self.make_hash(q);
        self.raw.find_mut(hash, |k| k.borrow() == q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("contains_key");
        let hash = self.make_hash(q);
        self.raw.find(hash, |k| k.borrow() == q).is_some()
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    /// The slot goes onto the free list before the entry is handed back, so
    /// dropping the returned key or value may safely touch the table.
    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.reentrancy.enter("remove");
        let hash = self.make_hash(q);
        self.raw.remove(hash, |k| k.borrow() == q)
    }
}

impl<K, V, S> Clone for ChainTable<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            hasher: self.hasher.clone(),
            raw: self.raw.clone(),
            reentrancy: DebugReentrancy::new(),
        }
    }
}

impl<K, V, S> fmt::Debug for ChainTable<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for ChainTable<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for ChainTable<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> Extend<(K, V)> for ChainTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for ChainTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = Self::with_hasher(S::default());
        table.extend(iter);
        table
    }
}

impl<K, V, S> IntoIterator for ChainTable<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        let len = self.raw.len();
        IntoIter::new(self.raw.into_slots(), len)
    }
}

impl<'a, K, V, S> IntoIterator for &'a ChainTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut ChainTable<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeSet;
    use std::hash::Hasher;
    use std::rc::Rc;

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

    /// Invariant: 13 buckets at load factor 0.5 hold six keys; the seventh
    /// doubles to 26 buckets with room for 13, and every key survives.
    #[test]
    fn seventh_key_triggers_first_growth() {
        let mut t: ChainTable<String, usize> = ChainTable::with_capacity_and_load_factor(13, 0.5);
        for i in 0..6 {
            assert_eq!(t.insert(format!("key{i}"), i), None);
        }
        assert_eq!((t.capacity(), t.slot_capacity()), (13, 6));
        assert_eq!(t.raw.growths(), 0);
        for i in 0..6 {
            assert_eq!(t.get(format!("key{i}").as_str()), Some(&i));
        }

        assert_eq!(t.insert("key6".to_string(), 6), None);
        assert_eq!((t.capacity(), t.slot_capacity()), (26, 13));
        assert_eq!(t.raw.growths(), 1);
        assert_eq!(t.len(), 7);
        for i in 0..7 {
            assert_eq!(t.get(format!("key{i}").as_str()), Some(&i));
        }
        t.raw.check_invariants();
    }

    /// Invariant: a removed slot is reused, so the high-water mark does not
    /// move and the table does not grow.
    #[test]
    fn removed_slot_is_reused_before_growth() {
        let mut t: ChainTable<u32, u32> = ChainTable::new();
        for k in 0..6 {
            t.insert(k, k);
        }
        assert_eq!(t.raw.high_water(), 6);
        assert_eq!(t.remove(&2), Some(2));
        assert_eq!(t.raw.free_count(), 1);

        assert_eq!(t.insert(99, 99), None);
        assert_eq!(t.raw.high_water(), 6);
        assert_eq!(t.raw.free_count(), 0);
        assert_eq!(t.capacity(), 13);
        assert_eq!(t.len(), 6);
        t.raw.check_invariants();
    }

    /// Invariant: update keeps size and structure; the first key object
    /// stays stored.
    #[test]
    fn update_replaces_value_in_place() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        assert_eq!(t.insert("k".into(), 1), None);
        let before = t.raw.high_water();
        assert_eq!(t.insert("k".into(), 2), Some(1));
        assert_eq!(t.len(), 1);
        assert_eq!(t.raw.high_water(), before);
        assert_eq!(t.get("k"), Some(&2));
        t.raw.check_invariants();
    }

    /// Invariant: every entry collides under a constant hasher and lookups
    /// are still resolved by equality, across growth and removals.
    #[test]
    fn full_collision_chain_stays_correct() {
        let mut t: ChainTable<u32, u32, ConstBuildHasher> = ChainTable::with_hasher(ConstBuildHasher);
        for k in 0..40 {
            assert_eq!(t.insert(k, k * 10), None);
        }
        for k in (0..40).step_by(3) {
            assert_eq!(t.remove(&k), Some(k * 10));
        }
        for k in 0..40 {
            let expect = if k % 3 == 0 { None } else { Some(k * 10) };
            assert_eq!(t.get(&k).copied(), expect);
        }
        t.raw.check_invariants();
    }

    /// Invariant: keys and values are dropped exactly once, whether removed,
    /// overwritten, cleared, or dropped with the table.
    #[test]
    fn entries_drop_exactly_once() {
        struct Tracked(Rc<Cell<usize>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let v = || Tracked(drops.clone());
        let mut t: ChainTable<u32, Tracked> = ChainTable::new();
        for k in 0..10 {
            t.insert(k, v());
        }
        drop(t.insert(0, v()));
        assert_eq!(drops.get(), 1);
        drop(t.remove(&1));
        assert_eq!(drops.get(), 2);
        t.clear();
        assert_eq!(drops.get(), 11);
        for k in 0..3 {
            t.insert(k, v());
        }
        drop(t);
        assert_eq!(drops.get(), 14);
    }

    /// Invariant: borrowed lookups work (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut t: ChainTable<String, i32> = ChainTable::new();
        t.insert("hello".to_string(), 1);
        assert!(t.contains_key("hello"));
        assert!(!t.contains_key("world"));
        assert_eq!(t.get_key_value("hello"), Some((&"hello".to_string(), &1)));
        *t.get_mut("hello").unwrap() += 1;
        assert_eq!(t.remove_entry("hello"), Some(("hello".to_string(), 2)));
        assert!(t.is_empty());
    }

    /// Invariant: iteration yields each live entry once, skipping free slots.
    #[test]
    fn iteration_skips_free_slots() {
        let mut t: ChainTable<u32, u32> = (0..20).map(|k| (k, k)).collect();
        for k in [3, 7, 11] {
            t.remove(&k);
        }
        assert_eq!(t.iter().len(), 17);
        let keys: BTreeSet<u32> = t.keys().copied().collect();
        let expected: BTreeSet<u32> = (0..20).filter(|k| ![3, 7, 11].contains(k)).collect();
        assert_eq!(keys, expected);

        for v in t.values_mut() {
            *v += 100;
        }
        assert!(t.values().all(|v| *v >= 100));
        let owned: BTreeSet<(u32, u32)> = t.into_iter().collect();
        assert_eq!(owned.len(), 17);
        assert!(owned.contains(&(19, 119)));
    }

    /// Invariant: clones are independent and compare equal until mutated.
    #[test]
    fn clone_is_deep_and_eq_is_by_content() {
        let mut a: ChainTable<String, i32> = ChainTable::new();
        a.insert("x".into(), 1);
        a.insert("y".into(), 2);
        let mut b = a.clone();
        assert_eq!(a, b);
        b.insert("y".into(), 3);
        assert_ne!(a, b);
        assert_eq!(a.get("y"), Some(&2));

        // Same content reached through a different insertion history.
        let mut c: ChainTable<String, i32> = ChainTable::with_capacity(1);
        c.insert("tmp".into(), 0);
        c.insert("y".into(), 2);
        c.insert("x".into(), 1);
        c.remove("tmp");
        assert_eq!(a, c);
    }

    #[test]
    fn try_constructor_reports_config_errors() {
        let bad = TableConfig::new().with_capacity(0);
        assert!(matches!(
            ChainTable::<u8, u8>::try_with_config_and_hasher(bad, RandomState::new()),
            Err(ConfigError::ZeroCapacity)
        ));
        let ok = TableConfig::new().with_capacity(4).with_load_factor(2.0);
        let t = ChainTable::<u8, u8>::try_with_config_and_hasher(ok, RandomState::new()).unwrap();
        assert_eq!((t.capacity(), t.slot_capacity(), t.load_factor()), (4, 8, 2.0));
    }

    #[test]
    #[should_panic(expected = "invalid ChainTable configuration")]
    fn panicking_constructor_rejects_bad_load_factor() {
        let _ = ChainTable::<u8, u8>::with_load_factor(0.0);
    }

    /// Invariant: a load factor that leaves the slot array empty for too many
    /// doublings is refused up front instead of failing on the first insert.
    #[test]
    fn vanishing_load_factor_is_rejected_at_construction() {
        let tiny = TableConfig::new().with_load_factor(1e-300);
        assert!(matches!(
            ChainTable::<u8, u8>::try_with_config_and_hasher(tiny, RandomState::new()),
            Err(ConfigError::LoadFactorTooSmall { capacity: 13, .. })
        ));
        let res = std::panic::catch_unwind(|| ChainTable::<u8, u8>::with_load_factor(1e-9));
        assert!(res.is_err());

        // The smallest accepted factor still fits its first entry.
        let floor = 1.0 / (1u64 << crate::MAX_FIRST_SLOT_DOUBLINGS) as f64;
        let mut t = ChainTable::with_capacity_and_load_factor(1, floor);
        assert_eq!(t.slot_capacity(), 0);
        t.insert(7u8, 'x');
        assert_eq!(t.get(&7), Some(&'x'));
        assert_eq!(t.capacity(), 1 << crate::MAX_FIRST_SLOT_DOUBLINGS);
        assert_eq!(t.slot_capacity(), 1);
    }

    /// Invariant: the table can be moved to another thread (and so wrapped
    /// in a lock by callers).
    #[test]
    fn table_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ChainTable<String, Vec<u8>>>();
    }

    /// Invariant (debug-only): re-entering the table from a key's `Eq` while
    /// a lookup is scanning a chain panics.
    #[cfg(debug_assertions)]
    #[test]
    fn reentrancy_panics_from_eq_during_get() {
        struct ReentryKey {
            id: &'static str,
            table: *const ChainTable<ReentryKey, i32, ConstBuildHasher>,
        }
        impl PartialEq for ReentryKey {
            fn eq(&self, other: &Self) -> bool {
                let table = other.table;
                if !table.is_null() && self.id != other.id {
                    // Nested lookup during the chain scan.
                    unsafe {
                        let _ = (*table).len();
                        let _ = (*table).contains_key(other);
                    }
                }
                self.id == other.id
            }
        }
        impl Eq for ReentryKey {}
        impl Hash for ReentryKey {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }

        let mut t = ChainTable::with_hasher(ConstBuildHasher);
        t.insert(
            ReentryKey {
                id: "a",
                table: core::ptr::null(),
            },
            1,
        );

        let query = ReentryKey {
            id: "b",
            table: &t as *const _,
        };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = t.get(&query);
        }));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
        // The guard unwound with the panic; the table is usable again.
        assert_eq!(t.reentrancy.active(), None);
        assert_eq!(t.len(), 1);
    }

    /// Invariant (debug-only): keys dropped by `remove` and `clear` are
    /// released after the table is consistent again and outside the guard,
    /// so their `Drop` may read the table.
    #[cfg(debug_assertions)]
    #[test]
    fn dropped_keys_may_read_the_table() {
        type Table = ChainTable<DropKey, u32>;
        struct DropKey {
            id: u32,
            table: Rc<Cell<*const Table>>,
            seen: Rc<RefCell<Vec<(u32, usize, bool)>>>,
        }
        impl PartialEq for DropKey {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }
        impl Eq for DropKey {}
        impl Hash for DropKey {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }
        impl Borrow<u32> for DropKey {
            fn borrow(&self) -> &u32 {
                &self.id
            }
        }
        impl Drop for DropKey {
            fn drop(&mut self) {
                let table = self.table.get();
                if table.is_null() {
                    return;
                }
                let (len, has_two) = unsafe { ((*table).len(), (*table).contains_key(&2u32)) };
                self.seen.borrow_mut().push((self.id, len, has_two));
            }
        }

        let ptr = Rc::new(Cell::new(core::ptr::null::<Table>()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let key = |id| DropKey {
            id,
            table: Rc::clone(&ptr),
            seen: Rc::clone(&seen),
        };

        let mut t: Table = ChainTable::new();
        for id in 1..=4 {
            t.insert(key(id), id * 10);
        }
        ptr.set(&t as *const Table);

        // `remove` drops the key itself; it sees the entry already gone.
        assert_eq!(t.remove(&1u32), Some(10));
        assert_eq!(seen.take(), vec![(1, 3, true)]);
        assert_eq!(t.remove(&2u32), Some(20));
        assert_eq!(seen.take(), vec![(2, 2, false)]);

        t.clear();
        let mut cleared = seen.take();
        cleared.sort_unstable();
        assert_eq!(cleared, vec![(3, 0, false), (4, 0, false)]);
        assert_eq!(t.reentrancy.active(), None);

        // Detach before the table drops its remaining keys.
        ptr.set(core::ptr::null());
        t.insert(key(5), 50);
        assert_eq!(t.get(&5u32), Some(&50));
    }
}
