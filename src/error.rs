//! Errors from validating table construction parameters.

use thiserror::Error;

/// Rejected construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("capacity must be at least 1 bucket")]
    ZeroCapacity,
    #[error("load factor must be finite and greater than zero, got {0}")]
    InvalidLoadFactor(f64),
    /// The slot array would still be empty after
    /// [`MAX_FIRST_SLOT_DOUBLINGS`](crate::MAX_FIRST_SLOT_DOUBLINGS) doublings.
    #[error("load factor {load_factor:e} is too small for {capacity} buckets to hold an entry")]
    LoadFactorTooSmall { load_factor: f64, capacity: usize },
}
