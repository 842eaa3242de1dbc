//! Salt hashing, bit-compatible with the gem contract's verifier.
//!
//! The contract checks
//!
//! ```solidity
//! keccak256(abi.encodePacked(chainid, entropy, address(this), msg.sender, kind, nonce, salt))
//! ```
//!
//! Packed encoding keeps every `uint256`/`bytes32` at 32 bytes and every
//! `address` at 20 bytes, with no padding between fields.

use alloy_primitives::{keccak256, Address, B256, U256};

use crate::config::MiningContext;

/// Length of the packed preimage.
pub const PREIMAGE_LEN: usize = 32 + 32 + 20 + 20 + 32 + 32 + 32;

/// Offset of the salt, the only field that changes per iteration.
const SALT_OFFSET: usize = PREIMAGE_LEN - 32;

/// Packed preimage with every field but the salt filled in.
///
/// Built once per state snapshot, so grinding only copies 32 bytes and runs
/// one keccak per salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSeed {
    preimage: [u8; PREIMAGE_LEN],
}

impl HashSeed {
    /// Packs the round-invariant fields.
    pub fn new(context: &MiningContext, entropy: B256, nonce: U256) -> Self {
        let mut preimage = [0u8; PREIMAGE_LEN];
        let mut offset = 0;
        let mut put = |bytes: &[u8]| {
            preimage[offset..offset + bytes.len()].copy_from_slice(bytes);
            offset += bytes.len();
        };

        put(&U256::from(context.chain_id).to_be_bytes::<32>());
        put(entropy.as_slice());
        put(context.contract.as_slice());
        put(context.target.as_slice());
        put(&context.gem_kind.to_be_bytes::<32>());
        put(&nonce.to_be_bytes::<32>());
        debug_assert_eq!(offset, SALT_OFFSET);

        Self { preimage }
    }

    /// Full preimage for `salt`.
    pub fn preimage(&self, salt: U256) -> [u8; PREIMAGE_LEN] {
        let mut preimage = self.preimage;
        preimage[SALT_OFFSET..].copy_from_slice(&salt.to_be_bytes::<32>());
        preimage
    }

    /// Hashes `salt` against this seed.
    #[inline]
    pub fn digest(&self, salt: U256) -> U256 {
        U256::from_be_bytes(keccak256(self.preimage(salt)).0)
    }
}

/// Digest of a single claim candidate.
///
/// Convenience form of [`HashSeed::digest`] for one-off checks.
pub fn digest(
    chain_id: u64,
    entropy: B256,
    contract: Address,
    target: Address,
    gem_kind: U256,
    nonce: U256,
    salt: U256,
) -> U256 {
    let context = MiningContext { chain_id, contract, target, gem_kind };
    HashSeed::new(&context, entropy, nonce).digest(salt)
}

/// Hash function the search loop grinds with.
pub trait SaltHasher: Send + 'static {
    /// Hashes `salt` against `seed`.
    fn digest(&mut self, seed: &HashSeed, salt: U256) -> U256;
}

/// Production hasher: keccak-256 over the packed preimage.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeccakHasher;

impl SaltHasher for KeccakHasher {
    #[inline]
    fn digest(&mut self, seed: &HashSeed, salt: U256) -> U256 {
        seed.digest(salt)
    }
}
