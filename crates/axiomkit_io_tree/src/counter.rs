//! Single-quantity accumulators.

use std::fmt;
use std::hash::{Hash, Hasher};

use num_bigint::BigUint;

/// Mutable accumulator for one quantity (files, directories or bytes).
///
/// `Long` is fixed-width and saturates at [`u64::MAX`]; `BigInteger` never
/// overflows; `Noop` discards every update and always reads zero.
/// Equality and hashing go by numeric value, so `Long(7)` equals a
/// `BigInteger` holding 7.
#[derive(Debug, Clone)]
pub enum Counter {
    /// Fixed-width counter.
    Long(u64),
    /// Arbitrary-precision counter.
    BigInteger(BigUint),
    /// Counter that ignores all updates.
    Noop,
}

impl Counter {
    /// New fixed-width counter at zero.
    pub fn long() -> Self {
        Self::Long(0)
    }

    /// New arbitrary-precision counter at zero.
    pub fn big_integer() -> Self {
        Self::BigInteger(BigUint::ZERO)
    }

    /// Counter that stays at zero.
    pub fn noop() -> Self {
        Self::Noop
    }

    /// Add `delta` to the current value.
    pub fn add(&mut self, delta: u64) {
        match self {
            Self::Long(value) => *value = value.saturating_add(delta),
            Self::BigInteger(value) => *value += delta,
            Self::Noop => {}
        }
    }

    /// Add one.
    pub fn increment(&mut self) {
        self.add(1);
    }

    /// Add the value held by another counter of any kind.
    pub fn add_counter(&mut self, other: &Counter) {
        match self {
            Self::Long(value) => {
                let delta = other.get_long().unwrap_or(u64::MAX);
                *value = value.saturating_add(delta);
            }
            Self::BigInteger(value) => *value += other.get_big_integer(),
            Self::Noop => {}
        }
    }

    /// Back to zero.
    pub fn reset(&mut self) {
        match self {
            Self::Long(value) => *value = 0,
            Self::BigInteger(value) => *value = BigUint::ZERO,
            Self::Noop => {}
        }
    }

    /// Current value, whatever the representation.
    pub fn get(&self) -> BigUint {
        self.get_big_integer()
    }

    /// Current value as `u64`; `None` when it does not fit.
    pub fn get_long(&self) -> Option<u64> {
        match self {
            Self::Long(value) => Some(*value),
            Self::BigInteger(value) => u64::try_from(value).ok(),
            Self::Noop => Some(0),
        }
    }

    /// Current value as an arbitrary-precision integer.
    pub fn get_big_integer(&self) -> BigUint {
        match self {
            Self::Long(value) => BigUint::from(*value),
            Self::BigInteger(value) => value.clone(),
            Self::Noop => BigUint::ZERO,
        }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::long()
    }
}

impl PartialEq for Counter {
    fn eq(&self, other: &Self) -> bool {
        match (self.get_long(), other.get_long()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.get_big_integer() == other.get_big_integer(),
            _ => false,
        }
    }
}

impl Eq for Counter {}

impl Hash for Counter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Hash the canonical digits so equal values hash equally across kinds.
        self.get_big_integer().to_u64_digits().hash(state);
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(value) => write!(f, "{value}"),
            Self::BigInteger(value) => write!(f, "{value}"),
            Self::Noop => write!(f, "0"),
        }
    }
}
