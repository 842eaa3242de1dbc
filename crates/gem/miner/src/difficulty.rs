//! Difficulty to acceptance threshold conversion.
//!
//! The gem contract accepts a salt when `keccak(...) <= 2^256 / difficulty`.
//! `2^256` itself does not fit in 256 bits, so the quotient is derived from
//! `U256::MAX` and corrected when the divisor is a power of two.

use alloy_primitives::U256;

use crate::MinerError;

/// Returns `floor(2^256 / difficulty)`.
///
/// A difficulty of one would yield `2^256`, one past the largest representable
/// value. It saturates to [`U256::MAX`], which accepts every digest exactly as
/// the unsaturated threshold would.
///
/// Fails with [`MinerError::InvalidDifficulty`] when `difficulty` is zero.
pub fn threshold(difficulty: U256) -> Result<U256, MinerError> {
    if difficulty.is_zero() {
        return Err(MinerError::InvalidDifficulty);
    }

    // 2^256 = MAX + 1 = q * d + (r + 1), so the floor gains one when r + 1 == d.
    let quotient = U256::MAX / difficulty;
    let remainder = U256::MAX % difficulty;
    if remainder == difficulty - U256::from(1u8) {
        Ok(quotient.saturating_add(U256::from(1u8)))
    } else {
        Ok(quotient)
    }
}

/// Acceptance predicate. The boundary is inclusive.
#[inline(always)]
pub fn is_accepted(digest: U256, threshold: U256) -> bool {
    digest <= threshold
}
