//! Claim submission for accepted salts.
//!
//! A claim walks through four gates: a dry-run gas estimate (reverts mean the
//! gem was taken or the nonce moved), the observe-only switch, the gas price
//! ceiling and finally the signed transaction and its receipt.

use alloy_primitives::{Address, B256, U256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ledger::{ClaimTxParams, LedgerClient};

/// Gas price ceiling used when none is configured: 1 gwei.
pub const DEFAULT_GAS_PRICE_CEILING: u128 = 1_000_000_000;

/// Gas limit attached to claim transactions.
pub const DEFAULT_CLAIM_GAS_LIMIT: u64 = 120_000;

/// How accepted salts are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPolicy {
    /// Report finds without submitting
    pub observe_only: bool,
    /// Maximum gas price in wei (None = [`DEFAULT_GAS_PRICE_CEILING`])
    pub gas_price_ceiling: Option<u128>,
    /// Gas limit of the claim transaction, also the upper bound for estimates
    pub gas_limit: u64,
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self { observe_only: true, gas_price_ceiling: None, gas_limit: DEFAULT_CLAIM_GAS_LIMIT }
    }
}

impl ClaimPolicy {
    /// The ceiling in effect.
    pub fn effective_ceiling(&self) -> u128 {
        self.gas_price_ceiling.unwrap_or(DEFAULT_GAS_PRICE_CEILING)
    }
}

/// An accepted salt on its way to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRequest {
    /// Winning salt
    pub salt: U256,
    /// Gem kind the salt was mined for
    pub gem_kind: U256,
    /// Address bound into the digest; claims are sent from it
    pub target: Address,
    /// Per-request ceiling, overriding the policy's
    pub gas_price_ceiling: Option<u128>,
}

/// Result of one claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The estimate failed or exceeded the gas limit
    Invalid {
        /// Why the claim cannot succeed
        reason: String,
    },
    /// Observe-only mode: the find was reported, nothing was sent
    FoundNoClaim,
    /// Network gas price above the ceiling
    AbortedPriceTooHigh {
        /// Observed price in wei
        price: u128,
        /// Ceiling in wei
        ceiling: u128,
    },
    /// Transaction mined successfully
    Submitted {
        /// Hash of the claim transaction
        transaction_id: B256,
    },
    /// Sending, confirmation or execution failed
    Failed {
        /// Failure description
        reason: String,
    },
}

impl ClaimOutcome {
    /// Whether the claim landed on-chain.
    pub const fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }
}

impl fmt::Display for ClaimOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { reason } => write!(f, "invalid: {reason}"),
            Self::FoundNoClaim => f.write_str("found, not claimed"),
            Self::AbortedPriceTooHigh { price, ceiling } => {
                write!(f, "gas price {price} wei above ceiling {ceiling} wei")
            }
            Self::Submitted { transaction_id } => write!(f, "submitted {transaction_id}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Drives accepted salts through the claim gates.
#[derive(Debug)]
pub struct ClaimSubmitter<L> {
    ledger: Arc<L>,
    policy: ClaimPolicy,
    confirmed: u64,
}

impl<L: LedgerClient> ClaimSubmitter<L> {
    /// Create a submitter for `policy`.
    pub const fn new(ledger: Arc<L>, policy: ClaimPolicy) -> Self {
        Self { ledger, policy, confirmed: 0 }
    }

    /// The policy in effect.
    pub const fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }

    /// Claims confirmed through this submitter.
    pub const fn confirmed(&self) -> u64 {
        self.confirmed
    }

    /// Run `request` through every gate. Never returns an error: each failure
    /// mode is an outcome.
    pub async fn submit(&mut self, request: ClaimRequest) -> ClaimOutcome {
        let ClaimRequest { salt, gem_kind, target, gas_price_ceiling } = request;

        let estimate = match self.ledger.estimate_claim_cost(gem_kind, salt, target).await {
            Ok(estimate) => estimate,
            Err(err) => {
                info!(target: "gem::claim", salt = %salt, error = %err, "Claim estimate failed, salt invalid");
                return ClaimOutcome::Invalid { reason: err.to_string() };
            }
        };
        if estimate > self.policy.gas_limit {
            info!(
                target: "gem::claim",
                salt = %salt,
                estimate,
                limit = self.policy.gas_limit,
                "Claim estimate above gas limit"
            );
            return ClaimOutcome::Invalid {
                reason: format!("estimate {estimate} exceeds gas limit {}", self.policy.gas_limit),
            };
        }

        if self.policy.observe_only {
            info!(target: "gem::claim", salt = %salt, kind = %gem_kind, "Found gem, auto-claim disabled");
            return ClaimOutcome::FoundNoClaim;
        }

        let ceiling = gas_price_ceiling.unwrap_or_else(|| self.policy.effective_ceiling());
        let price = match self.ledger.current_gas_price().await {
            Ok(price) => price,
            Err(err) => {
                warn!(target: "gem::claim", error = %err, "Failed to read gas price");
                return ClaimOutcome::Failed { reason: err.to_string() };
            }
        };
        if price > ceiling {
            info!(target: "gem::claim", price, ceiling, "Gas price above ceiling, claim aborted");
            return ClaimOutcome::AbortedPriceTooHigh { price, ceiling };
        }

        let params = ClaimTxParams { from: target, gas_price: price, gas_limit: self.policy.gas_limit };
        let pending = match self.ledger.submit_claim(gem_kind, salt, params).await {
            Ok(pending) => pending,
            Err(err) => {
                warn!(target: "gem::claim", salt = %salt, error = %err, "Claim submission failed");
                return ClaimOutcome::Failed { reason: err.to_string() };
            }
        };
        debug!(target: "gem::claim", tx = %pending.tx_hash, gas_price = price, "Claim sent");

        match self.ledger.await_confirmation(pending).await {
            Ok(receipt) if receipt.success => {
                self.confirmed += 1;
                info!(
                    target: "gem::claim",
                    tx = %receipt.tx_hash,
                    block = ?receipt.block_number,
                    gas_used = receipt.gas_used,
                    confirmed = self.confirmed,
                    "Gem claimed"
                );
                ClaimOutcome::Submitted { transaction_id: receipt.tx_hash }
            }
            Ok(receipt) => {
                warn!(target: "gem::claim", tx = %receipt.tx_hash, "Claim reverted on-chain");
                ClaimOutcome::Failed { reason: format!("transaction {} reverted", receipt.tx_hash) }
            }
            Err(err) => {
                warn!(target: "gem::claim", tx = %pending.tx_hash, error = %err, "Claim not confirmed");
                ClaimOutcome::Failed { reason: err.to_string() }
            }
        }
    }
}
