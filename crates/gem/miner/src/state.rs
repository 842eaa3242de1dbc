//! Cached gem state with non-blocking background refresh.
//!
//! The search loop reads the last snapshot on every batch and never waits on
//! the network once grinding has started. Fresh snapshots are fetched on a
//! spawned task and swapped in wholesale when they land.

use alloy_primitives::{B256, U256};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::difficulty::threshold;
use crate::ledger::{GemState, LedgerClient, LedgerError};
use crate::MinerError;

/// Immutable snapshot of the on-chain mining state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainState {
    /// Entropy mixed into every digest
    pub entropy: B256,
    /// Raw difficulty
    pub difficulty: U256,
    /// `floor(2^256 / difficulty)`
    pub threshold: U256,
    /// Claim nonce of the target address
    pub nonce: U256,
}

impl ChainState {
    /// Build a snapshot, deriving the threshold. Zero difficulty is rejected.
    pub fn new(entropy: B256, difficulty: U256, nonce: U256) -> Result<Self, MinerError> {
        Ok(Self { entropy, difficulty, threshold: threshold(difficulty)?, nonce })
    }
}

impl TryFrom<GemState> for ChainState {
    type Error = MinerError;

    fn try_from(state: GemState) -> Result<Self, Self::Error> {
        Self::new(state.entropy, state.difficulty, state.nonce)
    }
}

type RefreshTask = JoinHandle<Result<ChainState, MinerError>>;

/// Per-worker holder of the latest [`ChainState`].
pub struct StateCache<L> {
    ledger: Arc<L>,
    gem_kind: U256,
    current: Option<Arc<ChainState>>,
    pending: Option<RefreshTask>,
    refresh_interval: u64,
    stale_iterations: u64,
    nonce_floor: U256,
    refreshes: u64,
}

impl<L: LedgerClient> StateCache<L> {
    /// Create an empty cache. Nothing is fetched until [`Self::refresh`].
    pub fn new(ledger: Arc<L>, gem_kind: U256, refresh_interval: u64) -> Self {
        Self {
            ledger,
            gem_kind,
            current: None,
            pending: None,
            refresh_interval,
            stale_iterations: 0,
            nonce_floor: U256::ZERO,
            refreshes: 0,
        }
    }

    /// Last installed snapshot.
    pub const fn current(&self) -> Option<&Arc<ChainState>> {
        self.current.as_ref()
    }

    /// Iterations ground against the current snapshot since it was requested.
    pub const fn stale_iterations(&self) -> u64 {
        self.stale_iterations
    }

    /// Number of snapshots installed so far.
    pub const fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Whether a background fetch is outstanding.
    pub const fn is_refreshing(&self) -> bool {
        self.pending.is_some()
    }

    /// Fetch and install a snapshot, waiting for the result.
    ///
    /// An outstanding background fetch is aborted first, so the installed
    /// snapshot is never older than this call.
    pub async fn refresh(&mut self) -> Result<Arc<ChainState>, MinerError> {
        self.discard_pending();
        let state = fetch(self.ledger.as_ref(), self.gem_kind).await?;
        Ok(self.install(state))
    }

    /// Abort the outstanding background fetch, if any. Returns whether one
    /// was outstanding.
    pub fn discard_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(task) => {
                task.abort();
                debug!(target: "gem::state", kind = %self.gem_kind, "Background state refresh discarded");
                true
            }
            None => false,
        }
    }

    /// Account for `iterations` hashes against the current snapshot and start
    /// a background fetch once the snapshot is due. Returns whether a fetch
    /// was started.
    pub fn record_iterations(&mut self, iterations: u64) -> bool {
        self.stale_iterations = self.stale_iterations.saturating_add(iterations);
        if self.stale_iterations < self.refresh_interval {
            return false;
        }
        self.request_refresh()
    }

    /// Start a background fetch unless one is already outstanding.
    pub fn request_refresh(&mut self) -> bool {
        if self.pending.is_some() {
            return false;
        }

        let ledger = Arc::clone(&self.ledger);
        let gem_kind = self.gem_kind;
        self.pending = Some(tokio::spawn(async move { fetch(ledger.as_ref(), gem_kind).await }));
        self.stale_iterations = 0;

        debug!(target: "gem::state", kind = %gem_kind, "Background state refresh started");
        true
    }

    /// Install a finished background fetch, if there is one. Never waits.
    ///
    /// Returns `Ok(true)` when a new snapshot was installed. Failed fetches
    /// are logged and the stale snapshot stays in place; a zero difficulty is
    /// returned as an error.
    pub async fn poll_refresh(&mut self) -> Result<bool, MinerError> {
        if !self.pending.as_ref().is_some_and(JoinHandle::is_finished) {
            return Ok(false);
        }
        let Some(task) = self.pending.take() else { return Ok(false) };

        match join(task).await {
            Ok(state) => {
                let previous = self.current.as_deref().map(|s| s.difficulty);
                let installed = self.install(state);
                if previous.is_some_and(|d| d != installed.difficulty) {
                    info!(
                        target: "gem::state",
                        kind = %self.gem_kind,
                        difficulty = %installed.difficulty,
                        "Difficulty changed"
                    );
                }
                Ok(true)
            }
            Err(MinerError::InvalidDifficulty) => Err(MinerError::InvalidDifficulty),
            Err(err) => {
                warn!(
                    target: "gem::state",
                    kind = %self.gem_kind,
                    error = %err,
                    "State refresh failed, keeping cached state"
                );
                Ok(false)
            }
        }
    }

    /// Move the cached nonce past a confirmed claim.
    ///
    /// Later snapshots never go below the advanced nonce, so a node that has
    /// not yet seen the claim cannot roll it back.
    pub fn advance_nonce(&mut self) {
        let Some(current) = self.current.as_deref() else { return };
        let mut next = *current;
        next.nonce = next.nonce.saturating_add(U256::from(1u8));
        self.nonce_floor = next.nonce;
        self.current = Some(Arc::new(next));
    }

    fn install(&mut self, mut state: ChainState) -> Arc<ChainState> {
        if state.nonce < self.nonce_floor {
            state.nonce = self.nonce_floor;
        }
        self.stale_iterations = 0;
        self.refreshes += 1;

        let state = Arc::new(state);
        self.current = Some(Arc::clone(&state));
        state
    }
}

impl<L> fmt::Debug for StateCache<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCache")
            .field("gem_kind", &self.gem_kind)
            .field("current", &self.current)
            .field("refreshing", &self.pending.is_some())
            .field("refresh_interval", &self.refresh_interval)
            .field("stale_iterations", &self.stale_iterations)
            .field("nonce_floor", &self.nonce_floor)
            .finish()
    }
}

impl<L> Drop for StateCache<L> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

async fn fetch<L: LedgerClient>(ledger: &L, gem_kind: U256) -> Result<ChainState, MinerError> {
    ChainState::try_from(ledger.fetch_state(gem_kind).await?)
}

async fn join(task: RefreshTask) -> Result<ChainState, MinerError> {
    task.await.map_err(|err| LedgerError::Transport(format!("refresh task failed: {err}")))?
}
