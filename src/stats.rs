//! Bucket and slot utilization snapshots, behind the `stats` feature.

/// Snapshot of bucket and slot utilization, from [`ChainTable::stats`].
///
/// [`ChainTable::stats`]: crate::ChainTable::stats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Number of buckets.
    pub capacity: usize,
    /// Slot-array length before the next growth.
    pub slot_capacity: usize,
    /// Slots ever handed out (live plus free).
    pub high_water: usize,
    /// Slots waiting on the free list.
    pub free_slots: usize,
    pub live: usize,
    pub empty_buckets: usize,
    pub longest_chain: usize,
    /// Growth steps since construction.
    pub growths: usize,
}

impl TableStats {
    /// Live entries per bucket.
    pub fn load(&self) -> f64 {
        self.live as f64 / self.capacity as f64
    }

    /// Fraction of buckets heading a non-empty chain.
    pub fn bucket_utilization(&self) -> f64 {
        (self.capacity - self.empty_buckets) as f64 / self.capacity as f64
    }

    /// Mean length of non-empty chains.
    pub fn average_chain(&self) -> f64 {
        let used = self.capacity - self.empty_buckets;
        if used == 0 {
            0.0
        } else {
            self.live as f64 / used as f64
        }
    }

    pub fn print(&self) {
        println!("=== ChainTable Stats ===");
        println!("Buckets:          {}", self.capacity);
        println!("Slot capacity:    {}", self.slot_capacity);
        println!("High-water mark:  {}", self.high_water);
        println!("Free slots:       {}", self.free_slots);
        println!("Live entries:     {}", self.live);
        println!("Load:             {:.3}", self.load());
        println!("Bucket use:       {:.1}%", self.bucket_utilization() * 100.0);
        println!("Average chain:    {:.2}", self.average_chain());
        println!("Longest chain:    {}", self.longest_chain);
        println!("Growths:          {}", self.growths);
    }
}
