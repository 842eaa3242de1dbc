//! Gem Miner
//!
//! Searches for salts whose digest, bound to the current on-chain gem state,
//! falls below the gem's difficulty threshold, and claims them on-chain when
//! the network gas price allows it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     WORKER ORCHESTRATOR                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Search Loop (one per worker, no shared state)           │   │
//! │   │  • StateCache: entropy, difficulty, nonce                │   │
//! │   │  • Random 256-bit salts, keccak digest vs threshold      │   │
//! │   │  • Background refresh, cooperative yield, cancellation   │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                              │ accepted salt                    │
//! │   ┌─────────────────────────────────────────────────────────┐   │
//! │   │  Claim Submitter                                         │   │
//! │   │  • Gas estimate (reverts = gem already taken)            │   │
//! │   │  • Observe-only / gas price ceiling gates                │   │
//! │   │  • Submit with fixed gas limit, await receipt            │   │
//! │   └─────────────────────────────────────────────────────────┘   │
//! │                              │                                  │
//! │                       LedgerClient (RPC)                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod config;
pub mod difficulty;
pub mod hasher;
pub mod ledger;
pub mod orchestrator;
pub mod search;
pub mod state;
pub mod submit;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{MinerConfig, MiningContext, RoundPolicy};
pub use hasher::{HashSeed, KeccakHasher, SaltHasher};
pub use ledger::{ClaimReceipt, ClaimTxParams, GemState, LedgerClient, LedgerError, PendingClaim};
pub use orchestrator::{PoolReport, WorkerHandle, WorkerOrchestrator, WorkerReport};
pub use search::{LoopExit, LoopPhase, LoopStats, RoundReport, SearchAttempt, SearchConfig, SearchLoop};
pub use state::{ChainState, StateCache};
pub use submit::{ClaimOutcome, ClaimPolicy, ClaimRequest, ClaimSubmitter};

use thiserror::Error;

/// Miner errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MinerError {
    /// The contract reported a difficulty of zero
    #[error("invalid difficulty: zero")]
    InvalidDifficulty,

    /// Configuration is missing or inconsistent for the requested mode
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Ledger access failed
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Worker task died without reporting
    #[error("worker {slot} aborted: {reason}")]
    WorkerAborted {
        /// Slot of the worker
        slot: usize,
        /// Join error description
        reason: String,
    },
}

impl MinerError {
    /// Fatal errors stop the affected worker; everything else is retried.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Ledger(_))
    }
}
