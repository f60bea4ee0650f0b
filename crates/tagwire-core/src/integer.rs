//! Bridge between the wire's 64-bit integer domain and the host's numbers.
//!
//! Hosts whose numbers are IEEE-754 doubles can only represent integers up to
//! 2^53 - 1 exactly. [`IntegerStrategy::SafeDouble`] rejects anything larger
//! instead of silently rounding it; [`IntegerStrategy::Native`] keeps full
//! 64-bit values and performs no check.
//!
//! The strategy is picked once, when a [`CodecConfig`](crate::CodecConfig) is
//! built, and travels with the codec from then on.

use crate::error::{Error, Result};

/// Largest integer a binary64 double represents exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// How 64-bit wire integers are represented on the host side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegerStrategy {
    /// Double-backed numbers; magnitudes above 2^53 - 1 are rejected
    #[default]
    SafeDouble,
    /// Native 64-bit integers; every wire value is accepted
    Native,
}

impl IntegerStrategy {
    /// The largest magnitude accepted by this strategy
    pub fn ceiling(&self) -> u64 {
        match self {
            IntegerStrategy::SafeDouble => MAX_SAFE_INTEGER,
            IntegerStrategy::Native => i64::MAX as u64,
        }
    }

    /// Convert an unsigned wire value, failing above the ceiling
    pub fn to_host_u64(&self, value: u64) -> Result<u64> {
        match self {
            IntegerStrategy::Native => Ok(value),
            IntegerStrategy::SafeDouble if value <= MAX_SAFE_INTEGER => Ok(value),
            IntegerStrategy::SafeDouble => Err(Error::integer_overflow(value, MAX_SAFE_INTEGER)),
        }
    }

    /// Convert a signed wire value, failing when its magnitude exceeds the ceiling
    pub fn to_host_i64(&self, value: i64) -> Result<i64> {
        match self {
            IntegerStrategy::Native => Ok(value),
            IntegerStrategy::SafeDouble if value.unsigned_abs() <= MAX_SAFE_INTEGER => Ok(value),
            IntegerStrategy::SafeDouble => Err(Error::integer_overflow(value, MAX_SAFE_INTEGER)),
        }
    }
}

/// Widen a host integer to its wire bit pattern.
///
/// Host values are assumed to be in range by the time they are encoded.
pub fn from_host_integer(value: i64) -> u64 {
    value as u64
}
