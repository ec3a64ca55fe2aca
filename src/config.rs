//! Construction parameters for `ChainTable`.

use crate::error::ConfigError;

/// Bucket count used when none is given.
pub const DEFAULT_CAPACITY: usize = 13;

/// Ratio of slot storage to bucket count used when none is given.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.5;

/// Doublings allowed before the slot array must hold at least one entry.
///
/// A configuration whose threshold stays zero past this many doublings of its
/// capacity is rejected by [`TableConfig::validate`].
pub const MAX_FIRST_SLOT_DOUBLINGS: u32 = 16;

/// Initial bucket count and load factor.
///
/// The slot array holds `floor(capacity * load_factor)` entries before the
/// table has to grow.
///
/// ```
/// use chain_table::TableConfig;
///
/// let config = TableConfig::new().with_capacity(20);
/// assert_eq!(config.threshold(), 10);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableConfig {
    pub capacity: usize,
    pub load_factor: f64,
}

impl TableConfig {
    pub const fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(self.load_factor.is_finite() && self.load_factor > 0.0) {
            return Err(ConfigError::InvalidLoadFactor(self.load_factor));
        }
        let reach = self.capacity.saturating_mul(1 << MAX_FIRST_SLOT_DOUBLINGS);
        if threshold_for(reach, self.load_factor) == 0 {
            return Err(ConfigError::LoadFactorTooSmall {
                load_factor: self.load_factor,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Slot-array length for this configuration.
    pub fn threshold(&self) -> usize {
        threshold_for(self.capacity, self.load_factor)
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self::new()
    }
}

// Float-to-int `as` saturates, so absurd products clamp instead of wrapping.
pub(crate) fn threshold_for(capacity: usize, load_factor: f64) -> usize {
    (capacity as f64 * load_factor) as usize
}
