//! In-memory ledger and scripted hasher for tests.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

use crate::hasher::{HashSeed, SaltHasher};
use crate::ledger::{ClaimReceipt, ClaimTxParams, GemState, LedgerClient, LedgerError, PendingClaim};

pub(crate) const TEST_GAS_ESTIMATE: u64 = 60_000;

pub(crate) fn gem_state(difficulty: U256) -> GemState {
    GemState { entropy: B256::repeat_byte(0x42), difficulty, nonce: U256::ZERO }
}

pub(crate) fn tx_hash(n: u8) -> B256 {
    B256::repeat_byte(n)
}

/// Scriptable [`LedgerClient`] that counts every call.
#[derive(Debug)]
pub(crate) struct MockLedger {
    states: Mutex<VecDeque<GemState>>,
    fetch_failures: Mutex<VecDeque<LedgerError>>,
    estimate: Mutex<Result<u64, LedgerError>>,
    gas_price: Mutex<Result<u128, LedgerError>>,
    submit: Mutex<Result<PendingClaim, LedgerError>>,
    receipt_success: Mutex<Result<bool, LedgerError>>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    claimed_state: Mutex<Option<GemState>>,
    pub(crate) estimated_salts: Mutex<Vec<U256>>,
    pub(crate) submitted: Mutex<Vec<(U256, ClaimTxParams)>>,
    pub(crate) fetches: AtomicUsize,
    pub(crate) estimates: AtomicUsize,
    pub(crate) gas_price_reads: AtomicUsize,
    pub(crate) submits: AtomicUsize,
    pub(crate) confirmations: AtomicUsize,
}

impl MockLedger {
    /// Ledger reporting `difficulty` forever, with cheap gas and successful claims.
    pub(crate) fn new(difficulty: U256) -> Self {
        Self::with_states(vec![gem_state(difficulty)])
    }

    /// Ledger serving `states` in order, repeating the last one.
    pub(crate) fn with_states(states: Vec<GemState>) -> Self {
        assert!(!states.is_empty(), "at least one state is required");
        Self {
            states: Mutex::new(states.into()),
            fetch_failures: Mutex::new(VecDeque::new()),
            estimate: Mutex::new(Ok(TEST_GAS_ESTIMATE)),
            gas_price: Mutex::new(Ok(1_000_000)),
            submit: Mutex::new(Ok(PendingClaim { tx_hash: tx_hash(0xee) })),
            receipt_success: Mutex::new(Ok(true)),
            cancel_after: Mutex::new(None),
            claimed_state: Mutex::new(None),
            estimated_salts: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            estimates: AtomicUsize::new(0),
            gas_price_reads: AtomicUsize::new(0),
            submits: AtomicUsize::new(0),
            confirmations: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_estimates(self) -> Self {
        *self.estimate.lock() = Err(LedgerError::Reverted("gem already mined".into()));
        self
    }

    pub(crate) fn with_estimate(self, estimate: u64) -> Self {
        *self.estimate.lock() = Ok(estimate);
        self
    }

    pub(crate) fn with_gas_price(self, price: Result<u128, LedgerError>) -> Self {
        *self.gas_price.lock() = price;
        self
    }

    pub(crate) fn with_submit(self, result: Result<PendingClaim, LedgerError>) -> Self {
        *self.submit.lock() = result;
        self
    }

    pub(crate) fn with_receipt(self, success: Result<bool, LedgerError>) -> Self {
        *self.receipt_success.lock() = success;
        self
    }

    /// Cancel `token` once `estimates` estimate calls have been made.
    pub(crate) fn cancel_after_estimates(self, estimates: usize, token: CancellationToken) -> Self {
        *self.cancel_after.lock() = Some((estimates, token));
        self
    }

    /// Serve `state` from every fetch after the first submitted claim.
    pub(crate) fn with_claimed_state(self, state: GemState) -> Self {
        *self.claimed_state.lock() = Some(state);
        self
    }

    /// Make the next `fetch_state` fail with `err`.
    pub(crate) fn fail_next_fetch(&self, err: LedgerError) {
        self.fetch_failures.lock().push_back(err);
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn fetch_state(&self, _gem_kind: U256) -> Result<GemState, LedgerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fetch_failures.lock().pop_front() {
            return Err(err);
        }
        let mut states = self.states.lock();
        if states.len() > 1 {
            if let Some(state) = states.pop_front() {
                return Ok(state);
            }
        }
        states.front().copied().ok_or_else(|| LedgerError::Decode("no state".into()))
    }

    async fn estimate_claim_cost(
        &self,
        _gem_kind: U256,
        salt: U256,
        _from: Address,
    ) -> Result<u64, LedgerError> {
        let calls = self.estimates.fetch_add(1, Ordering::SeqCst) + 1;
        self.estimated_salts.lock().push(salt);
        if let Some((after, token)) = self.cancel_after.lock().as_ref() {
            if calls >= *after {
                token.cancel();
            }
        }
        self.estimate.lock().clone()
    }

    async fn current_gas_price(&self) -> Result<u128, LedgerError> {
        self.gas_price_reads.fetch_add(1, Ordering::SeqCst);
        self.gas_price.lock().clone()
    }

    async fn submit_claim(
        &self,
        _gem_kind: U256,
        salt: U256,
        params: ClaimTxParams,
    ) -> Result<PendingClaim, LedgerError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().push((salt, params));
        // round trip; spawned tasks get to run
        tokio::task::yield_now().await;
        let claimed = *self.claimed_state.lock();
        if let Some(state) = claimed {
            *self.states.lock() = VecDeque::from([state]);
        }
        self.submit.lock().clone()
    }

    async fn await_confirmation(&self, pending: PendingClaim) -> Result<ClaimReceipt, LedgerError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        let success = self.receipt_success.lock().clone()?;
        Ok(ClaimReceipt { tx_hash: pending.tx_hash, success, block_number: Some(1), gas_used: 55_000 })
    }
}

/// Hasher returning `U256::MAX` except on call number `hit_on` (1-based),
/// where it returns `value`.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedHasher {
    pub(crate) calls: u64,
    hit_on: u64,
    value: U256,
}

impl ScriptedHasher {
    pub(crate) const fn hit_on(call: u64, value: U256) -> Self {
        Self { calls: 0, hit_on: call, value }
    }

    /// Hasher that never produces an accepted digest for difficulty above 1.
    pub(crate) const fn never() -> Self {
        Self::hit_on(u64::MAX, U256::MAX)
    }
}

impl SaltHasher for ScriptedHasher {
    fn digest(&mut self, _seed: &HashSeed, _salt: U256) -> U256 {
        self.calls += 1;
        if self.calls == self.hit_on { self.value } else { U256::MAX }
    }
}
