//! The ledger seam: everything the miner needs from the chain.
//!
//! Transport, ABI encoding and signing live behind [`LedgerClient`]. The
//! search loop and the claim submitter only ever see these types.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

/// Raw gem state as reported by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemState {
    /// Entropy mixed into every digest
    pub entropy: B256,
    /// Raw difficulty
    pub difficulty: U256,
    /// Claim nonce of the target address
    pub nonce: U256,
}

/// Transaction parameters for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimTxParams {
    /// Sender; must be the address the salt was mined for
    pub from: Address,
    /// Gas price in wei
    pub gas_price: u128,
    /// Gas limit
    pub gas_limit: u64,
}

/// A claim transaction accepted by the node but not yet mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingClaim {
    /// Transaction hash
    pub tx_hash: B256,
}

/// Receipt of a mined claim transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimReceipt {
    /// Transaction hash
    pub tx_hash: B256,
    /// Execution status
    pub success: bool,
    /// Block the transaction landed in
    pub block_number: Option<u64>,
    /// Gas consumed
    pub gas_used: u64,
}

/// Ledger errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The contract reverted (salt already used, stale nonce, ...)
    #[error("call reverted: {0}")]
    Reverted(String),

    /// RPC transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// Transaction was sent but no receipt arrived
    #[error("confirmation failed: {0}")]
    Confirmation(String),

    /// A signing operation was requested without a key
    #[error("no signing key configured")]
    MissingSigner,

    /// The signing key is not a valid secp256k1 scalar
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// Chain access used by one worker.
#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
    /// Read entropy and difficulty of `gem_kind` and the target's claim nonce.
    async fn fetch_state(&self, gem_kind: U256) -> Result<GemState, LedgerError>;

    /// Dry-run a claim of `salt` sent from `from` and return its gas estimate.
    ///
    /// Errors are routine here: a lost race or a stale nonce reverts.
    async fn estimate_claim_cost(
        &self,
        gem_kind: U256,
        salt: U256,
        from: Address,
    ) -> Result<u64, LedgerError>;

    /// Current network gas price in wei.
    async fn current_gas_price(&self) -> Result<u128, LedgerError>;

    /// Sign and broadcast a claim.
    async fn submit_claim(
        &self,
        gem_kind: U256,
        salt: U256,
        params: ClaimTxParams,
    ) -> Result<PendingClaim, LedgerError>;

    /// Wait until `pending` is mined.
    async fn await_confirmation(&self, pending: PendingClaim) -> Result<ClaimReceipt, LedgerError>;
}
