//! JSON-RPC [`LedgerClient`] for the gem contract.
//!
//! Reads go through `eth_call`, claims are signed locally and sent with
//! `eth_sendTransaction` through the provider's wallet filler.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, B256, U256};
use alloy_provider::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, SolCall};
use alloy_transport::{RpcError, TransportError};
use async_trait::async_trait;
use gem_miner::{
    ClaimReceipt, ClaimTxParams, GemState, LedgerClient, LedgerError, MinerConfig, PendingClaim,
};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

sol! {
    /// Subset of the gem contract used by the miner.
    interface IGem {
        function gems(uint256 kind) external view returns (
            string name,
            string color,
            bytes32 entropy,
            uint256 difficulty,
            uint256 gemsPerMine,
            uint256 multiplier,
            address crafter,
            address manager,
            address pendingManager
        );

        function nonce(address who) external view returns (uint256);

        function mine(uint256 kind, uint256 salt) external;
    }
}

/// Ledger client backed by an HTTP JSON-RPC endpoint.
#[derive(Clone)]
pub struct RpcLedger {
    provider: DynProvider,
    contract: Address,
    target: Address,
    signer: Option<Address>,
    confirmation_timeout: Duration,
}

impl RpcLedger {
    /// Connect to `rpc_url`. Without a signing key the client is read-only
    /// and [`LedgerClient::submit_claim`] fails with
    /// [`LedgerError::MissingSigner`].
    pub fn connect(
        rpc_url: &str,
        contract: Address,
        target: Address,
        signing_key: Option<&B256>,
        confirmation_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|err| LedgerError::Transport(format!("invalid rpc url {rpc_url}: {err}")))?;

        let (provider, signer) = match signing_key {
            Some(key) => {
                let signer = PrivateKeySigner::from_bytes(key)
                    .map_err(|err| LedgerError::InvalidKey(err.to_string()))?;
                let address = signer.address();
                if address != target {
                    warn!(
                        target: "gem::ledger",
                        signer = %address,
                        mining_for = %target,
                        "Signing key does not control the target address, claims will be rejected"
                    );
                }
                let provider =
                    ProviderBuilder::new().wallet(EthereumWallet::from(signer)).connect_http(url).erased();
                (provider, Some(address))
            }
            None => (ProviderBuilder::new().connect_http(url).erased(), None),
        };

        debug!(target: "gem::ledger", %contract, mining_for = %target, signer = ?signer, "Connected to RPC endpoint");
        Ok(Self { provider, contract, target, signer, confirmation_timeout })
    }

    /// Connect with the endpoint, identity and key of `config`.
    pub fn from_config(config: &MinerConfig) -> Result<Self, LedgerError> {
        Self::connect(
            &config.rpc_url,
            config.context.contract,
            config.context.target,
            config.signing_key(),
            config.confirmation_timeout,
        )
    }

    /// Address of the loaded signing key.
    pub const fn signer(&self) -> Option<Address> {
        self.signer
    }

    fn request(&self, input: Vec<u8>) -> TransactionRequest {
        TransactionRequest::default().with_to(self.contract).with_input(input)
    }

    async fn call<C: SolCall>(&self, call: C) -> Result<C::Return, LedgerError> {
        let output = self.provider.call(self.request(call.abi_encode())).await.map_err(rpc_error)?;
        C::abi_decode_returns(&output).map_err(|err| LedgerError::Decode(err.to_string()))
    }
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger")
            .field("contract", &self.contract)
            .field("target", &self.target)
            .field("signer", &self.signer)
            .field("confirmation_timeout", &self.confirmation_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    async fn fetch_state(&self, gem_kind: U256) -> Result<GemState, LedgerError> {
        let gem = self.call(IGem::gemsCall { kind: gem_kind }).await?;
        let nonce = self.call(IGem::nonceCall { who: self.target }).await?;

        trace!(
            target: "gem::ledger",
            kind = %gem_kind,
            name = %gem.name,
            difficulty = %gem.difficulty,
            %nonce,
            "Fetched gem state"
        );
        Ok(GemState { entropy: gem.entropy, difficulty: gem.difficulty, nonce })
    }

    async fn estimate_claim_cost(
        &self,
        gem_kind: U256,
        salt: U256,
        from: Address,
    ) -> Result<u64, LedgerError> {
        let tx = self.request(mine_calldata(gem_kind, salt)).with_from(from);
        let estimate = self.provider.estimate_gas(tx).await.map_err(rpc_error)?;
        debug!(target: "gem::ledger", salt = %salt, estimate, "Estimated claim gas");
        Ok(estimate)
    }

    async fn current_gas_price(&self) -> Result<u128, LedgerError> {
        self.provider.get_gas_price().await.map_err(rpc_error)
    }

    async fn submit_claim(
        &self,
        gem_kind: U256,
        salt: U256,
        params: ClaimTxParams,
    ) -> Result<PendingClaim, LedgerError> {
        if self.signer.is_none() {
            return Err(LedgerError::MissingSigner);
        }

        let tx = self
            .request(mine_calldata(gem_kind, salt))
            .with_from(params.from)
            .with_gas_price(params.gas_price)
            .with_gas_limit(params.gas_limit);
        let pending = self.provider.send_transaction(tx).await.map_err(rpc_error)?;
        Ok(PendingClaim { tx_hash: *pending.tx_hash() })
    }

    async fn await_confirmation(&self, pending: PendingClaim) -> Result<ClaimReceipt, LedgerError> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), pending.tx_hash)
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|err| LedgerError::Confirmation(err.to_string()))?;

        Ok(ClaimReceipt {
            tx_hash: receipt.transaction_hash(),
            success: receipt.status(),
            block_number: receipt.block_number(),
            gas_used: receipt.gas_used(),
        })
    }
}

/// Calldata of `mine(kind, salt)`.
pub fn mine_calldata(gem_kind: U256, salt: U256) -> Vec<u8> {
    IGem::mineCall { kind: gem_kind, salt }.abi_encode()
}

/// JSON-RPC error code geth uses for execution reverts.
const EXECUTION_REVERTED: i64 = 3;

fn is_revert(code: i64, message: &str) -> bool {
    code == EXECUTION_REVERTED || message.to_ascii_lowercase().contains("revert")
}

fn rpc_error(err: TransportError) -> LedgerError {
    match err {
        RpcError::ErrorResp(payload) if is_revert(payload.code, &payload.message) => {
            LedgerError::Reverted(payload.message.to_string())
        }
        RpcError::ErrorResp(payload) => {
            LedgerError::Transport(format!("rpc error {}: {}", payload.code, payload.message))
        }
        RpcError::DeserError { err, .. } => LedgerError::Decode(err.to_string()),
        other => LedgerError::Transport(other.to_string()),
    }
}
