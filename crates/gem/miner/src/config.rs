//! Typed miner configuration.
//!
//! Everything here is read once at startup and treated as immutable by the
//! search and claim machinery.

use alloy_primitives::{Address, B256, U256};
use std::fmt;
use std::time::Duration;

use crate::search::SearchConfig;
use crate::submit::{ClaimPolicy, DEFAULT_CLAIM_GAS_LIMIT};
use crate::MinerError;

/// Default time to wait for a claim transaction to be mined.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// What a worker does after a round settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundPolicy {
    /// Stop after the first accepted salt.
    #[default]
    Single,
    /// Start a fresh round after every settled claim.
    Continuous,
}

impl RoundPolicy {
    /// Policy for the `loop` flag of the config file.
    pub const fn from_loop_flag(looping: bool) -> Self {
        if looping { Self::Continuous } else { Self::Single }
    }

    /// Whether a settled round is followed by another one.
    pub const fn restarts(&self) -> bool {
        matches!(self, Self::Continuous)
    }
}

/// Identity the digest is bound to. Any mismatch with the contract's view of
/// these fields makes every accepted salt worthless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningContext {
    /// Chain id of the network hosting the gem contract
    pub chain_id: u64,
    /// Gem contract address
    pub contract: Address,
    /// Address the gem is mined for (the claim's `msg.sender`)
    pub target: Address,
    /// Gem kind identifier
    pub gem_kind: U256,
}

/// Complete miner configuration.
#[derive(Clone)]
pub struct MinerConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Hash-binding identity
    pub context: MiningContext,
    /// Signing key for claim transactions
    signing_key: Option<B256>,
    /// Whether found salts are claimed automatically when a key is present
    auto_claim: bool,
    /// Derived once from `signing_key` and `auto_claim`
    observe_only: bool,
    /// Maximum gas price in wei (None = default ceiling)
    pub gas_price_ceiling: Option<u128>,
    /// Gas limit attached to claim transactions
    pub claim_gas_limit: u64,
    /// How long to wait for a claim to be mined
    pub confirmation_timeout: Duration,
    /// Single-shot or continuous rounds
    pub round_policy: RoundPolicy,
    /// Ring the terminal bell on every find
    pub ding: bool,
    /// Number of independent workers
    pub workers: usize,
    /// Grinding cadence
    pub search: SearchConfig,
}

impl MinerConfig {
    /// Create a config for `context` with defaults everywhere else.
    ///
    /// Starts out observe-only: no signing key has been supplied yet.
    pub fn new(rpc_url: impl Into<String>, context: MiningContext) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            context,
            signing_key: None,
            auto_claim: true,
            observe_only: true,
            gas_price_ceiling: None,
            claim_gas_limit: DEFAULT_CLAIM_GAS_LIMIT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            round_policy: RoundPolicy::default(),
            ding: false,
            workers: num_cpus::get().max(1),
            search: SearchConfig::default(),
        }
    }

    /// Set the signing key.
    pub fn with_signing_key(mut self, key: Option<B256>) -> Self {
        self.signing_key = key;
        self.observe_only = self.signing_key.is_none() || !self.auto_claim;
        self
    }

    /// Enable or disable automatic claiming.
    pub fn with_auto_claim(mut self, enabled: bool) -> Self {
        self.auto_claim = enabled;
        self.observe_only = self.signing_key.is_none() || !self.auto_claim;
        self
    }

    /// Set the worker count (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// The signing key, if any.
    pub const fn signing_key(&self) -> Option<&B256> {
        self.signing_key.as_ref()
    }

    /// True when found salts are reported but never submitted.
    pub const fn observe_only(&self) -> bool {
        self.observe_only
    }

    /// Check the address of the loaded key against the claim sender.
    ///
    /// Claims are sent from [`MiningContext::target`], so with claiming
    /// enabled the key must control that address.
    pub fn check_signer(&self, signer: Option<Address>) -> Result<(), MinerError> {
        if self.observe_only {
            return Ok(());
        }
        match signer {
            Some(signer) if signer == self.context.target => Ok(()),
            Some(signer) => Err(MinerError::Config(format!(
                "signing key controls {signer}, but gems are mined for {}",
                self.context.target
            ))),
            None => Err(MinerError::Config("claiming is enabled but no signer is loaded".into())),
        }
    }

    /// Claim policy derived from this config.
    pub const fn claim_policy(&self) -> ClaimPolicy {
        ClaimPolicy {
            observe_only: self.observe_only,
            gas_price_ceiling: self.gas_price_ceiling,
            gas_limit: self.claim_gas_limit,
        }
    }
}

impl fmt::Debug for MinerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinerConfig")
            .field("rpc_url", &self.rpc_url)
            .field("context", &self.context)
            .field("signing_key", &self.signing_key.map(|_| "<redacted>"))
            .field("auto_claim", &self.auto_claim)
            .field("observe_only", &self.observe_only)
            .field("gas_price_ceiling", &self.gas_price_ceiling)
            .field("claim_gas_limit", &self.claim_gas_limit)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .field("round_policy", &self.round_policy)
            .field("ding", &self.ding)
            .field("workers", &self.workers)
            .field("search", &self.search)
            .finish()
    }
}
