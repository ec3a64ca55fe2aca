//! RawTable: bucket array, slot array and free list over precomputed hashes.
//!
//! Chains are singly linked through `Slot::next` as plain indices into
//! `slots`; the free list reuses the same field. No user `Hash` code runs at
//! this layer, only the equality closures handed in by the caller.

use crate::config::{threshold_for, TableConfig};

/// End of a chain or of the free list.
pub(crate) const NIL: usize = usize::MAX;

/// Hash marker of a slot sitting on the free list. Live hashes never have the
/// top bit set, so this cannot collide with one.
pub(crate) const FREE_HASH: u32 = u32::MAX;

pub(crate) const HASH_MASK: u32 = 0x7FFF_FFFF;

/// Folds a 64-bit hasher output into the 31-bit code stored per slot.
#[inline]
pub(crate) fn mask_hash(h: u64) -> u32 {
    ((h ^ (h >> 32)) as u32) & HASH_MASK
}

#[derive(Debug, Clone)]
pub(crate) struct Slot<K, V> {
    hash: u32,
    next: usize,
    pub(crate) entry: Option<(K, V)>,
}

impl<K, V> Slot<K, V> {
    #[inline]
    fn is_live(&self) -> bool {
        self.hash != FREE_HASH
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RawTable<K, V> {
    capacity: usize,
    load_factor: f64,
    threshold: usize,
    buckets: Vec<usize>,
    // len() is the high-water mark; capacity is reserved up to `threshold`.
    slots: Vec<Slot<K, V>>,
    free_list: usize,
    free_count: usize,
    #[cfg(any(test, feature = "stats"))]
    growths: usize,
}

impl<K, V> RawTable<K, V> {
    /// Caller validates `config` first.
    pub(crate) fn new(config: TableConfig) -> Self {
        debug_assert!(config.validate().is_ok());
        let threshold = config.threshold();
        Self {
            capacity: config.capacity,
            load_factor: config.load_factor,
            threshold,
            buckets: vec![NIL; config.capacity],
            slots: Vec::with_capacity(threshold),
            free_list: NIL,
            free_count: 0,
            #[cfg(any(test, feature = "stats"))]
            growths: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_count
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn threshold(&self) -> usize {
        self.threshold
    }

    pub(crate) fn load_factor(&self) -> f64 {
        self.load_factor
    }

    #[inline]
    fn bucket_of(&self, hash: u32) -> usize {
        debug_assert_eq!(self.buckets.len(), self.capacity);
        hash as usize % self.capacity
    }

    fn find_index<F>(&self, hash: u32, mut eq: F) -> Option<usize>
    where
        F: FnMut(&K) -> bool,
    {
        let mut i = self.buckets[self.bucket_of(hash)];
        while i != NIL {
            let slot = &self.slots[i];
            if slot.hash == hash {
                if let Some((k, _)) = &slot.entry {
                    if eq(k) {
                        return Some(i);
                    }
                }
            }
            i = slot.next;
        }
        None
    }

    pub(crate) fn find<F>(&self, hash: u32, eq: F) -> Option<(&K, &V)>
    where
        F: FnMut(&K) -> bool,
    {
        let i = self.find_index(hash, eq)?;
        self.slots[i].entry.as_ref().map(|(k, v)| (k, v))
    }

    pub(crate) fn find_mut<F>(&mut self, hash: u32, eq: F) -> Option<&mut V>
    where
        F: FnMut(&K) -> bool,
    {
        let i = self.find_index(hash, eq)?;
        self.slots[i].entry.as_mut().map(|(_, v)| v)
    }

    /// Links a new entry. The caller has already checked the key is absent.
    /// Returns the slot index used.
    pub(crate) fn insert_new(&mut self, hash: u32, key: K, value: V) -> usize {
        debug_assert!(hash <= HASH_MASK);
        let index = if self.free_count > 0 {
            let index = self.free_list;
            self.free_list = self.slots[index].next;
            self.free_count -= 1;
            index
        } else {
            if self.slots.len() == self.threshold {
                self.grow();
            }
            self.slots.len()
        };

        // Bucket is taken after a possible grow so it uses the new capacity.
        let bucket = self.bucket_of(hash);
        let slot = Slot {
            hash,
            next: self.buckets[bucket],
            entry: Some((key, value)),
        };
        if index == self.slots.len() {
            self.slots.push(slot);
        } else {
            debug_assert!(!self.slots[index].is_live());
            self.slots[index] = slot;
        }
        self.buckets[bucket] = index;
        index
    }

    /// Unlinks the matching entry and pushes its slot onto the free list.
    pub(crate) fn remove<F>(&mut self, hash: u32, mut eq: F) -> Option<(K, V)>
    where
        F: FnMut(&K) -> bool,
    {
        let bucket = self.bucket_of(hash);
        let mut prev = NIL;
        let mut i = self.buckets[bucket];
        while i != NIL {
            let slot = &self.slots[i];
            let next = slot.next;
            let hit = slot.hash == hash && slot.entry.as_ref().is_some_and(|(k, _)| eq(k));
            if hit {
                if prev == NIL {
                    self.buckets[bucket] = next;
                } else {
                    self.slots[prev].next = next;
                }
                let slot = &mut self.slots[i];
                slot.hash = FREE_HASH;
                slot.next = self.free_list;
                let entry = slot.entry.take();
                self.free_list = i;
                self.free_count += 1;
                return entry;
            }
            prev = i;
            i = next;
        }
        None
    }

    /// Doubles the bucket count and relinks every live slot. Slots keep their
    /// indices; free slots stay where they are.
    fn grow(&mut self) {
        let count = self.slots.len();
        let mut capacity = self.capacity;
        let mut threshold;
        // One doubling except for load factors small enough that the doubled
        // threshold still has no room.
        loop {
            capacity = capacity.checked_mul(2).expect("capacity overflow");
            threshold = threshold_for(capacity, self.load_factor);
            if threshold > count {
                break;
            }
        }

        self.capacity = capacity;
        self.threshold = threshold;
        self.buckets = vec![NIL; capacity];
        self.slots.reserve_exact(threshold - count);
        for i in 0..count {
            let slot = &mut self.slots[i];
            if slot.is_live() {
                let bucket = slot.hash as usize % capacity;
                slot.next = self.buckets[bucket];
                self.buckets[bucket] = i;
            }
        }
        #[cfg(any(test, feature = "stats"))]
        {
            self.growths += 1;
        }
    }

    /// Resets to an empty table with the current capacity and hands back the
    /// old slots so their contents drop outside the caller's critical section.
    pub(crate) fn clear(&mut self) -> Vec<Slot<K, V>> {
        self.buckets.fill(NIL);
        self.free_list = NIL;
        self.free_count = 0;
        core::mem::replace(&mut self.slots, Vec::with_capacity(self.threshold))
    }

    pub(crate) fn slots(&self) -> &[Slot<K, V>] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Slot<K, V>] {
        &mut self.slots
    }

    pub(crate) fn into_slots(self) -> Vec<Slot<K, V>> {
        self.slots
    }

    #[cfg(feature = "stats")]
    pub(crate) fn stats(&self) -> crate::stats::TableStats {
        let mut empty_buckets = 0;
        let mut longest_chain = 0;
        for &head in &self.buckets {
            if head == NIL {
                empty_buckets += 1;
                continue;
            }
            let mut len = 0;
            let mut i = head;
            while i != NIL {
                len += 1;
                i = self.slots[i].next;
            }
            longest_chain = longest_chain.max(len);
        }
        crate::stats::TableStats {
            capacity: self.capacity,
            slot_capacity: self.threshold,
            high_water: self.slots.len(),
            free_slots: self.free_count,
            live: self.len(),
            empty_buckets,
            longest_chain,
            growths: self.growths,
        }
    }
}

#[cfg(test)]
impl<K, V> RawTable<K, V> {
    pub(crate) fn high_water(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free_count
    }

    pub(crate) fn growths(&self) -> usize {
        self.growths
    }

    /// Walks every chain and the free list, panicking on any broken link.
    pub(crate) fn check_invariants(&self) {
        assert_eq!(self.buckets.len(), self.capacity, "bucket array length");
        assert_eq!(
            self.threshold,
            threshold_for(self.capacity, self.load_factor),
            "threshold out of sync with capacity"
        );
        assert!(self.slots.len() <= self.threshold, "slots past threshold");

        let count = self.slots.len();
        let mut seen = vec![false; count];
        let mut live = 0;
        for (b, &head) in self.buckets.iter().enumerate() {
            let mut i = head;
            while i != NIL {
                assert!(i < count, "chain link {i} past high-water mark {count}");
                assert!(!seen[i], "slot {i} reachable twice");
                seen[i] = true;
                let slot = &self.slots[i];
                assert!(slot.is_live(), "free slot {i} linked into bucket {b}");
                assert!(slot.entry.is_some(), "live slot {i} without entry");
                assert!(slot.hash <= HASH_MASK);
                assert_eq!(slot.hash as usize % self.capacity, b, "slot {i} in wrong bucket");
                live += 1;
                i = slot.next;
            }
        }

        let mut free = 0;
        let mut i = self.free_list;
        while i != NIL {
            assert!(i < count, "free link {i} past high-water mark {count}");
            assert!(!seen[i], "slot {i} both free and reachable");
            seen[i] = true;
            let slot = &self.slots[i];
            assert_eq!(slot.hash, FREE_HASH, "free slot {i} keeps a hash");
            assert!(slot.entry.is_none(), "free slot {i} keeps an entry");
            free += 1;
            i = slot.next;
        }

        assert!(seen.iter().all(|&s| s), "orphaned slot below high-water mark");
        assert_eq!(free, self.free_count);
        assert_eq!(live, self.len());
    }
}
