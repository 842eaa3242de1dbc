//! JSON configuration file.
//!
//! ```json
//! {
//!     "network": { "rpc": "https://rpc.ftm.tools", "gem_address": "0x...", "chain_id": 250 },
//!     "address": "0x...",
//!     "gem_type": 1,
//!     "claim": { "private_key": "0x...", "maximum_gas_price": 150 },
//!     "loop": true,
//!     "ding": true
//! }
//! ```

use alloy_primitives::utils::parse_units;
use alloy_primitives::{Address, B256, U256};
use eyre::{bail, eyre, WrapErr};
use gem_miner::{MinerConfig, MiningContext, RoundPolicy};
use serde::Deserialize;
use std::path::Path;

/// Network section
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NetworkConfig {
    /// JSON-RPC endpoint
    pub(crate) rpc: String,
    /// Gem contract address
    pub(crate) gem_address: Address,
    /// Chain id bound into every digest
    pub(crate) chain_id: u64,
}

/// Gas price in gwei, as a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Gwei {
    /// `150`, `2.5`
    Number(serde_json::Number),
    /// `"150"`, `"2.5"`
    Text(String),
}

impl Gwei {
    /// Value in wei.
    pub(crate) fn to_wei(&self) -> eyre::Result<u128> {
        let amount = match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        };
        let parsed =
            parse_units(&amount, "gwei").map_err(|err| eyre!("invalid gas price {amount}: {err}"))?;
        if parsed.is_negative() {
            bail!("gas price {amount} is negative");
        }
        u128::try_from(parsed.get_absolute()).map_err(|_| eyre!("gas price {amount} gwei is out of range"))
    }
}

/// Claim section; its presence enables automatic claiming.
#[derive(Clone, Deserialize)]
pub(crate) struct ClaimConfig {
    /// Hex-encoded secp256k1 key, with or without `0x`
    pub(crate) private_key: String,
    /// Ceiling in gwei (default 1)
    #[serde(default)]
    pub(crate) maximum_gas_price: Option<Gwei>,
}

impl std::fmt::Debug for ClaimConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimConfig")
            .field("private_key", &"<redacted>")
            .field("maximum_gas_price", &self.maximum_gas_price)
            .finish()
    }
}

/// The whole file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FileConfig {
    /// Network section
    pub(crate) network: NetworkConfig,
    /// Address the gems are mined for
    pub(crate) address: Address,
    /// Gem kind
    pub(crate) gem_type: u64,
    /// Automatic claiming
    #[serde(default)]
    pub(crate) claim: Option<ClaimConfig>,
    /// Start a new round after every find
    #[serde(default, rename = "loop")]
    pub(crate) looping: bool,
    /// Ring the terminal bell on finds
    #[serde(default)]
    pub(crate) ding: bool,
    /// Worker count (default: available parallelism)
    #[serde(default)]
    pub(crate) workers: Option<usize>,
    /// Iterations between state refreshes
    #[serde(default)]
    pub(crate) refresh_interval: Option<u64>,
    /// Iterations between yield points
    #[serde(default)]
    pub(crate) yield_interval: Option<u64>,
}

impl FileConfig {
    /// Read and parse `path`.
    pub(crate) fn load(path: &Path) -> eyre::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&raw).wrap_err_with(|| format!("invalid config file {}", path.display()))
    }

    /// Parse a config document.
    pub(crate) fn parse(raw: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Build the typed miner configuration.
    pub(crate) fn into_miner_config(self) -> eyre::Result<MinerConfig> {
        let context = MiningContext {
            chain_id: self.network.chain_id,
            contract: self.network.gem_address,
            target: self.address,
            gem_kind: U256::from(self.gem_type),
        };

        let (signing_key, ceiling) = match &self.claim {
            Some(claim) => {
                let ceiling = claim.maximum_gas_price.as_ref().map(Gwei::to_wei).transpose()?;
                (Some(parse_private_key(&claim.private_key)?), ceiling)
            }
            None => (None, None),
        };

        let mut config = MinerConfig::new(self.network.rpc, context).with_signing_key(signing_key);
        config.gas_price_ceiling = ceiling;
        config.round_policy = RoundPolicy::from_loop_flag(self.looping);
        config.ding = self.ding;
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if let Some(interval) = self.refresh_interval {
            config.search.refresh_interval = interval;
        }
        if let Some(interval) = self.yield_interval {
            config.search.yield_interval = interval.max(1);
        }
        Ok(config)
    }
}

/// Parse a hex private key.
pub(crate) fn parse_private_key(raw: &str) -> eyre::Result<B256> {
    raw.trim().parse::<B256>().map_err(|_| eyre!("private key must be 32 bytes of hex"))
}
