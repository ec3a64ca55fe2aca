//! chain-table: a single-threaded hash map built on separate chaining over
//! flat arrays, with free-list slot reuse.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a key/value map whose collision handling allocates nothing per
//!   entry. Chains are integer links between slots of one `Vec`, not boxed
//!   nodes.
//! - Layers:
//!   - RawTable<K, V>: bucket array, slot array, free list and growth.
//!     Takes precomputed 31-bit hash codes and equality closures; never
//!     calls `K: Hash`.
//!   - ChainTable<K, V, S>: public map. Hashes each key once per call with
//!     `S: BuildHasher`, guards entry points with a debug-only reentrancy
//!     check, and exposes iteration and the std-style map surface.
//!
//! Storage
//! - `buckets[b]` holds the index of the first slot in bucket `b`'s chain,
//!   or NIL. Each slot stores its hash code, a `next` link and the entry.
//! - A removed slot keeps its index: its hash becomes the free marker, its
//!   entry is dropped, and it is pushed onto the free list through the same
//!   `next` field. Inserts pop the free list before touching fresh slots.
//! - `len == high_water - free_count` at all times.
//!
//! Growth
//! - Only an insert of a new key can grow the table, and only when the free
//!   list is empty and every slot up to `floor(capacity * load_factor)` has
//!   been handed out.
//! - Growth doubles the bucket count, keeps every slot at its index, and
//!   relinks live slots by prepending onto their new bucket. Free slots are
//!   never compacted and the table never shrinks; a delete-heavy workload
//!   keeps its peak footprint.
//! - Insert, lookup and remove all bucket by `hash % capacity`, and
//!   `buckets.len() == capacity` is kept as an invariant.
//!
//! Constraints
//! - Single-threaded: `ChainTable` is `Send` but not `Sync`. Share it behind
//!   one lock around every call.
//! - Iteration order is slot order. It is not sorted, not insertion order
//!   once slots are reused, and not part of the API contract.
//! - Keys must keep `Hash` and `Eq` consistent; a key that changes its hash
//!   while stored becomes unreachable (but is still dropped with the table).
//!
//! Reentrancy
//! - User `Hash`/`Eq` code runs mid-scan. In debug builds a nested call into
//!   the same table panics with both operation names. Removed keys and
//!   values are handed back only after the slot is back on the free list, so
//!   their `Drop` may touch the table.

pub mod chain_table;
mod chain_table_proptest;
pub mod config;
mod error;
pub mod iter;
mod raw_table;
mod reentrancy;
#[cfg(feature = "stats")]
mod stats;

// Public surface
pub use chain_table::ChainTable;
pub use config::{TableConfig, DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR, MAX_FIRST_SLOT_DOUBLINGS};
pub use error::ConfigError;
#[cfg(feature = "stats")]
pub use stats::TableStats;
