//! The per-worker search loop.
//!
//! ```text
//! Init ──► Grinding ──► Accepted ──► Submitting ──► Settled ──► Done
//!   ▲                                                  │
//!   └──────────────── restart (continuous) ────────────┘
//! ```
//!
//! Grinding runs in batches of [`SearchConfig::yield_interval`] hashes. Between
//! batches the loop accounts for staleness, installs finished background
//! refreshes, yields to the scheduler and checks for cancellation.

use alloy_primitives::U256;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{MinerConfig, MiningContext, RoundPolicy};
use crate::difficulty::is_accepted;
use crate::hasher::{HashSeed, KeccakHasher, SaltHasher};
use crate::ledger::LedgerClient;
use crate::state::{ChainState, StateCache};
use crate::submit::{ClaimOutcome, ClaimPolicy, ClaimRequest, ClaimSubmitter};
use crate::MinerError;

/// Hashes between progress lines.
const PROGRESS_INTERVAL: u64 = 1_000_000;

/// Grinding cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Iterations against one snapshot before a background refresh starts
    pub refresh_interval: u64,
    /// Iterations between yield points (also the cancellation cadence)
    pub yield_interval: u64,
    /// Pause before retrying a failed initial state fetch
    pub retry_delay: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { refresh_interval: 200_000, yield_interval: 2_000, retry_delay: Duration::from_secs(5) }
    }
}

/// An accepted salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchAttempt {
    /// The salt
    pub salt: U256,
    /// Its digest, at or below the threshold it was checked against
    pub digest: U256,
    /// Hashes computed in the round up to and including this one
    pub iterations: u64,
}

/// One settled round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    /// Round number, starting at 1
    pub round: u64,
    /// The accepted attempt
    pub attempt: SearchAttempt,
    /// What became of the claim
    pub outcome: ClaimOutcome,
}

/// Running totals of one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Rounds that reached an accepted salt
    pub rounds: u64,
    /// Hashes computed
    pub hashes: u64,
    /// `Invalid` outcomes
    pub invalid: u64,
    /// `FoundNoClaim` outcomes
    pub found_no_claim: u64,
    /// `AbortedPriceTooHigh` outcomes
    pub price_aborts: u64,
    /// `Submitted` outcomes
    pub submitted: u64,
    /// `Failed` outcomes
    pub failed: u64,
}

impl LoopStats {
    fn record(&mut self, outcome: &ClaimOutcome) {
        self.rounds += 1;
        match outcome {
            ClaimOutcome::Invalid { .. } => self.invalid += 1,
            ClaimOutcome::FoundNoClaim => self.found_no_claim += 1,
            ClaimOutcome::AbortedPriceTooHigh { .. } => self.price_aborts += 1,
            ClaimOutcome::Submitted { .. } => self.submitted += 1,
            ClaimOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// How a search loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopExit {
    /// Totals over the loop's lifetime
    pub stats: LoopStats,
    /// The most recent settled round
    pub last_round: Option<RoundReport>,
    /// Whether the loop stopped because of cancellation
    pub cancelled: bool,
}

/// Search loop states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopPhase {
    /// Fetch fresh state, blocking
    Init,
    /// Hash random salts against the round's starting snapshot
    Grinding(Arc<ChainState>),
    /// A salt met the threshold
    Accepted(SearchAttempt),
    /// The claim is in flight
    Submitting(SearchAttempt, ClaimRequest),
    /// The claim resolved
    Settled(RoundReport),
    /// Terminal
    Done,
}

/// One worker: owns its state cache, hasher, RNG and claim submitter.
#[derive(Debug)]
pub struct SearchLoop<L, H = KeccakHasher, R = StdRng> {
    slot: usize,
    context: MiningContext,
    cache: StateCache<L>,
    submitter: ClaimSubmitter<L>,
    hasher: H,
    rng: R,
    config: SearchConfig,
    round_policy: RoundPolicy,
    ding: bool,
    stats: LoopStats,
}

impl<L: LedgerClient> SearchLoop<L> {
    /// Create a loop hashing with keccak and salts from an OS-seeded RNG.
    pub fn new(
        slot: usize,
        context: MiningContext,
        ledger: Arc<L>,
        policy: ClaimPolicy,
        config: SearchConfig,
        round_policy: RoundPolicy,
    ) -> Self {
        Self {
            slot,
            context,
            cache: StateCache::new(Arc::clone(&ledger), context.gem_kind, config.refresh_interval),
            submitter: ClaimSubmitter::new(ledger, policy),
            hasher: KeccakHasher,
            rng: StdRng::from_os_rng(),
            config,
            round_policy,
            ding: false,
            stats: LoopStats::default(),
        }
    }

    /// Create the loop for worker `slot` of `config`.
    pub fn from_config(slot: usize, config: &MinerConfig, ledger: Arc<L>) -> Self {
        Self::new(slot, config.context, ledger, config.claim_policy(), config.search, config.round_policy)
            .with_ding(config.ding)
    }
}

impl<L, H, R> SearchLoop<L, H, R>
where
    L: LedgerClient,
    H: SaltHasher,
    R: RngCore + Send + 'static,
{
    /// Replace the hasher.
    pub fn with_hasher<H2: SaltHasher>(self, hasher: H2) -> SearchLoop<L, H2, R> {
        SearchLoop {
            slot: self.slot,
            context: self.context,
            cache: self.cache,
            submitter: self.submitter,
            hasher,
            rng: self.rng,
            config: self.config,
            round_policy: self.round_policy,
            ding: self.ding,
            stats: self.stats,
        }
    }

    /// Replace the salt source.
    pub fn with_rng<R2: RngCore + Send + 'static>(self, rng: R2) -> SearchLoop<L, H, R2> {
        SearchLoop {
            slot: self.slot,
            context: self.context,
            cache: self.cache,
            submitter: self.submitter,
            hasher: self.hasher,
            rng,
            config: self.config,
            round_policy: self.round_policy,
            ding: self.ding,
            stats: self.stats,
        }
    }

    /// Ring the terminal bell on every accepted salt.
    pub const fn with_ding(mut self, ding: bool) -> Self {
        self.ding = ding;
        self
    }

    /// Worker slot.
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Totals so far.
    pub const fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// The cached chain state.
    pub const fn state(&self) -> Option<&Arc<ChainState>> {
        self.cache.current()
    }

    /// Run until the round policy or `cancel` ends the loop.
    ///
    /// Returns an error only for fatal conditions such as a zero difficulty.
    /// Claim failures of any kind are outcomes. Cancellation never interrupts
    /// a claim already in flight, but an accepted salt is not submitted once
    /// the token has fired.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<LoopExit, MinerError> {
        let mut phase = LoopPhase::Init;
        let mut last_round = None;
        let mut cancelled = false;

        loop {
            phase = match phase {
                LoopPhase::Init => match self.init(cancel).await? {
                    Some(state) => LoopPhase::Grinding(state),
                    None => {
                        cancelled = true;
                        LoopPhase::Done
                    }
                },
                LoopPhase::Grinding(state) => match self.grind(state, cancel).await? {
                    Some(attempt) if !cancel.is_cancelled() => LoopPhase::Accepted(attempt),
                    Some(attempt) => {
                        info!(
                            target: "gem::search",
                            slot = self.slot,
                            salt = %attempt.salt,
                            "Cancelled with an accepted salt, not claiming"
                        );
                        cancelled = true;
                        LoopPhase::Done
                    }
                    None => {
                        cancelled = true;
                        LoopPhase::Done
                    }
                },
                LoopPhase::Accepted(attempt) => {
                    self.announce(&attempt);
                    if cancel.is_cancelled() {
                        cancelled = true;
                        LoopPhase::Done
                    } else {
                        let request = ClaimRequest {
                            salt: attempt.salt,
                            gem_kind: self.context.gem_kind,
                            target: self.context.target,
                            gas_price_ceiling: self.submitter.policy().gas_price_ceiling,
                        };
                        LoopPhase::Submitting(attempt, request)
                    }
                }
                LoopPhase::Submitting(attempt, request) => {
                    let outcome = self.submitter.submit(request).await;
                    if outcome.is_submitted() {
                        self.cache.advance_nonce();
                    }
                    self.stats.record(&outcome);
                    LoopPhase::Settled(RoundReport { round: self.stats.rounds, attempt, outcome })
                }
                LoopPhase::Settled(report) => {
                    info!(
                        target: "gem::search",
                        slot = self.slot,
                        round = report.round,
                        outcome = %report.outcome,
                        "Round settled"
                    );
                    last_round = Some(report);
                    if !self.round_policy.restarts() {
                        LoopPhase::Done
                    } else if cancel.is_cancelled() {
                        cancelled = true;
                        LoopPhase::Done
                    } else {
                        LoopPhase::Init
                    }
                }
                LoopPhase::Done => break,
            };
        }

        debug!(target: "gem::search", slot = self.slot, cancelled, stats = ?self.stats, "Search loop done");
        Ok(LoopExit { stats: self.stats.clone(), last_round, cancelled })
    }

    /// Blocking state fetch, retried until it succeeds. Returns `None` when
    /// cancelled first.
    async fn init(&mut self, cancel: &CancellationToken) -> Result<Option<Arc<ChainState>>, MinerError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                result = self.cache.refresh() => result,
            };

            match result {
                Ok(state) => {
                    info!(
                        target: "gem::search",
                        slot = self.slot,
                        kind = %self.context.gem_kind,
                        difficulty = %state.difficulty,
                        nonce = %state.nonce,
                        "Mining round started"
                    );
                    return Ok(Some(state));
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(
                        target: "gem::search",
                        slot = self.slot,
                        error = %err,
                        retry_in = ?self.config.retry_delay,
                        "Failed to fetch gem state"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Ok(None),
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
            }
        }
    }

    /// Hash until a salt is accepted. Returns `None` when cancelled.
    async fn grind(
        &mut self,
        mut state: Arc<ChainState>,
        cancel: &CancellationToken,
    ) -> Result<Option<SearchAttempt>, MinerError> {
        let mut seed = HashSeed::new(&self.context, state.entropy, state.nonce);
        let batch = self.config.yield_interval.max(1);
        let started = Instant::now();
        let mut iterations = 0u64;
        let mut next_progress = PROGRESS_INTERVAL;

        loop {
            for done in 1..=batch {
                let salt = self.draw_salt();
                let digest = self.hasher.digest(&seed, salt);
                if is_accepted(digest, state.threshold) {
                    iterations += done;
                    self.stats.hashes += done;
                    self.cache.record_iterations(done);
                    return Ok(Some(SearchAttempt { salt, digest, iterations }));
                }
            }
            iterations += batch;
            self.stats.hashes += batch;
            self.cache.record_iterations(batch);

            if self.cache.poll_refresh().await? {
                if let Some(current) = self.cache.current() {
                    state = Arc::clone(current);
                    seed = HashSeed::new(&self.context, state.entropy, state.nonce);
                }
            }

            if iterations >= next_progress {
                next_progress += PROGRESS_INTERVAL;
                let elapsed = started.elapsed().as_secs_f64();
                info!(
                    target: "gem::search",
                    slot = self.slot,
                    hashes = iterations,
                    hashrate = format!("{:.2} H/s", iterations as f64 / elapsed.max(f64::EPSILON)),
                    "Mining in progress"
                );
            }

            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                return Ok(None);
            }
        }
    }

    fn draw_salt(&mut self) -> U256 {
        let mut bytes = [0u8; 32];
        self.rng.fill_bytes(&mut bytes);
        U256::from_be_bytes(bytes)
    }

    fn announce(&self, attempt: &SearchAttempt) {
        info!(
            target: "gem::search",
            slot = self.slot,
            salt = %attempt.salt,
            digest = %attempt.digest,
            hashes = attempt.iterations,
            "Found gem"
        );
        if self.ding {
            let mut stderr = std::io::stderr();
            if let Err(err) = stderr.write_all(b"\x07").and_then(|()| stderr.flush()) {
                debug!(target: "gem::search", slot = self.slot, %err, "Failed to ring terminal bell");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{GemState, LedgerError};
    use crate::test_utils::{gem_state, MockLedger, ScriptedHasher};
    use alloy_primitives::{Address, B256};
    use assert_matches::assert_matches;
    use std::sync::atomic::Ordering;

    fn context() -> MiningContext {
        MiningContext {
            chain_id: 250,
            contract: Address::repeat_byte(0x11),
            target: Address::repeat_byte(0x22),
            gem_kind: U256::from(1u64),
        }
    }

    fn claiming() -> ClaimPolicy {
        ClaimPolicy { observe_only: false, ..Default::default() }
    }

    fn search_loop(
        ledger: &Arc<MockLedger>,
        policy: ClaimPolicy,
        config: SearchConfig,
        rounds: RoundPolicy,
    ) -> SearchLoop<MockLedger> {
        SearchLoop::new(0, context(), Arc::clone(ledger), policy, config, rounds)
    }

    /// Cancels `token` on hash `after` and accepts hash `hit_on`, if set.
    struct CancellingHasher {
        calls: u64,
        after: u64,
        hit_on: Option<u64>,
        token: CancellationToken,
    }

    impl CancellingHasher {
        fn new(after: u64, token: &CancellationToken) -> Self {
            Self { calls: 0, after, hit_on: None, token: token.clone() }
        }
    }

    impl SaltHasher for CancellingHasher {
        fn digest(&mut self, _seed: &HashSeed, _salt: U256) -> U256 {
            self.calls += 1;
            if self.calls == self.after {
                self.token.cancel();
            }
            if self.hit_on == Some(self.calls) { U256::ZERO } else { U256::MAX }
        }
    }

    #[tokio::test]
    async fn test_accepts_on_third_hash_and_claims_that_salt() {
        let ledger = Arc::new(MockLedger::new(U256::from(4u64)));
        let threshold = U256::from(1u8) << 254usize;
        let mut search = search_loop(&ledger, claiming(), SearchConfig::default(), RoundPolicy::Single)
            .with_hasher(ScriptedHasher::hit_on(3, threshold - U256::from(1u8)))
            .with_rng(StdRng::seed_from_u64(7));

        let exit = search.run(&CancellationToken::new()).await.unwrap();

        let mut replay = StdRng::seed_from_u64(7);
        let mut salt = [0u8; 32];
        for _ in 0..3 {
            replay.fill_bytes(&mut salt);
        }
        let expected = U256::from_be_bytes(salt);

        let round = exit.last_round.unwrap();
        assert_eq!(round.attempt.iterations, 3);
        assert_eq!(round.attempt.salt, expected);
        assert!(round.outcome.is_submitted());
        assert_eq!(*ledger.estimated_salts.lock(), vec![expected]);
        assert_eq!(ledger.submitted.lock()[0].0, expected);
        assert_eq!(exit.stats.hashes, 3);
        assert_eq!(exit.stats.rounds, 1);
        assert!(!exit.cancelled);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive_across_batches() {
        let ledger = Arc::new(MockLedger::new(U256::from(4u64)));
        let threshold = U256::from(1u8) << 254usize;
        let mut search = search_loop(&ledger, ClaimPolicy::default(), SearchConfig::default(), RoundPolicy::Single)
            .with_hasher(ScriptedHasher::hit_on(5_001, threshold));

        let exit = search.run(&CancellationToken::new()).await.unwrap();
        let round = exit.last_round.unwrap();
        assert_eq!(round.attempt.digest, threshold);
        assert_eq!(round.attempt.iterations, 5_001);
        assert_eq!(round.outcome, ClaimOutcome::FoundNoClaim);
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_estimates_keep_continuous_loop_running() {
        let cancel = CancellationToken::new();
        let ledger = Arc::new(
            MockLedger::new(U256::from(1u64)).failing_estimates().cancel_after_estimates(3, cancel.clone()),
        );
        let mut search = search_loop(&ledger, claiming(), SearchConfig::default(), RoundPolicy::Continuous);

        let exit = search.run(&cancel).await.unwrap();
        assert!(exit.cancelled);
        assert_eq!(exit.stats.rounds, 3);
        assert_eq!(exit.stats.invalid, 3);
        assert_matches!(exit.last_round.unwrap().outcome, ClaimOutcome::Invalid { .. });
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 0);
        // one blocking fetch per round
        assert_eq!(ledger.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_shot_invalid_terminates_cleanly() {
        let ledger = Arc::new(MockLedger::new(U256::from(1u64)).failing_estimates());
        let mut search = search_loop(&ledger, claiming(), SearchConfig::default(), RoundPolicy::Single);

        let exit = search.run(&CancellationToken::new()).await.unwrap();
        assert!(!exit.cancelled);
        assert_eq!(exit.stats.invalid, 1);
        assert_eq!(ledger.estimates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_checked_at_yield_points() {
        let cancel = CancellationToken::new();
        let ledger = Arc::new(MockLedger::new(U256::from(4u64)));
        let config = SearchConfig { yield_interval: 1_000, ..Default::default() };
        let mut search = search_loop(&ledger, claiming(), config, RoundPolicy::Continuous)
            .with_hasher(CancellingHasher::new(2_500, &cancel));

        let exit = search.run(&cancel).await.unwrap();
        assert!(exit.cancelled);
        assert!(exit.last_round.is_none());
        assert_eq!(exit.stats.hashes, 3_000);
        assert_eq!(ledger.estimates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_salt_accepted_after_cancellation_is_not_claimed() {
        let cancel = CancellationToken::new();
        let ledger = Arc::new(MockLedger::new(U256::from(4u64)));
        // cancel and hit fall in the same batch
        let hasher = CancellingHasher { hit_on: Some(7), ..CancellingHasher::new(5, &cancel) };
        let mut search =
            search_loop(&ledger, claiming(), SearchConfig::default(), RoundPolicy::Single).with_hasher(hasher);

        let exit = search.run(&cancel).await.unwrap();
        assert!(exit.cancelled);
        assert!(exit.last_round.is_none());
        assert_eq!(exit.stats.hashes, 7);
        assert_eq!(exit.stats.rounds, 0);
        assert_eq!(ledger.estimates.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_next_round_starts_from_post_claim_state() {
        let cancel = CancellationToken::new();
        let claimed = GemState { entropy: B256::repeat_byte(0x43), nonce: U256::from(1u64), ..gem_state(U256::from(1u64)) };
        let ledger = Arc::new(
            MockLedger::new(U256::from(1u64))
                .with_claimed_state(claimed)
                .cancel_after_estimates(2, cancel.clone()),
        );
        // every acceptance starts a background fetch that lands while the claim is in flight
        let config = SearchConfig { refresh_interval: 1, ..Default::default() };
        let mut search = search_loop(&ledger, claiming(), config, RoundPolicy::Continuous);

        let exit = search.run(&cancel).await.unwrap();
        assert_eq!(exit.stats.submitted, 2);
        let second = search.state().unwrap();
        assert_eq!(second.entropy, B256::repeat_byte(0x43));
        assert_eq!(second.nonce, U256::from(2u64));
    }

    #[tokio::test]
    async fn test_ding_rings_without_affecting_round() {
        let ledger = Arc::new(MockLedger::new(U256::from(1u64)));
        let mut search =
            search_loop(&ledger, ClaimPolicy::default(), SearchConfig::default(), RoundPolicy::Single).with_ding(true);

        let exit = search.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(exit.stats.found_no_claim, 1);
        assert!(!exit.cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ledger = Arc::new(MockLedger::new(U256::from(4u64)));
        let mut search = search_loop(&ledger, claiming(), SearchConfig::default(), RoundPolicy::Single);

        let exit = search.run(&cancel).await.unwrap();
        assert!(exit.cancelled);
        assert_eq!(ledger.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_grinding_picks_up_background_refresh() {
        // threshold 1 first, then everything is accepted
        let ledger = Arc::new(MockLedger::with_states(vec![
            gem_state(U256::MAX),
            GemState { entropy: B256::repeat_byte(3), ..gem_state(U256::from(1u64)) },
        ]));
        let config = SearchConfig { refresh_interval: 10, yield_interval: 10, ..Default::default() };
        let mut search = search_loop(&ledger, ClaimPolicy::default(), config, RoundPolicy::Single);

        let exit = search.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(exit.last_round.unwrap().outcome, ClaimOutcome::FoundNoClaim);
        assert!(ledger.fetches.load(Ordering::SeqCst) >= 2);
        assert_eq!(search.state().unwrap().entropy, B256::repeat_byte(3));
    }

    #[tokio::test]
    async fn test_zero_difficulty_aborts_worker() {
        let ledger = Arc::new(MockLedger::new(U256::ZERO));
        let mut search = search_loop(&ledger, claiming(), SearchConfig::default(), RoundPolicy::Continuous);

        assert_matches!(search.run(&CancellationToken::new()).await, Err(MinerError::InvalidDifficulty));
        assert_eq!(ledger.estimates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_difficulty_from_background_refresh_aborts_worker() {
        let ledger = Arc::new(MockLedger::with_states(vec![gem_state(U256::from(4u64)), gem_state(U256::ZERO)]));
        let config = SearchConfig { refresh_interval: 10, yield_interval: 10, ..Default::default() };
        let mut search = search_loop(&ledger, claiming(), config, RoundPolicy::Single)
            .with_hasher(ScriptedHasher::never());

        assert_matches!(search.run(&CancellationToken::new()).await, Err(MinerError::InvalidDifficulty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_fetch_is_retried() {
        let ledger = Arc::new(MockLedger::new(U256::from(1u64)));
        ledger.fail_next_fetch(LedgerError::Transport("connection refused".into()));
        let mut search = search_loop(&ledger, ClaimPolicy::default(), SearchConfig::default(), RoundPolicy::Single);

        let exit = search.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(exit.stats.found_no_claim, 1);
        assert_eq!(ledger.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_confirmed_claims_advance_nonce() {
        let cancel = CancellationToken::new();
        let ledger = Arc::new(MockLedger::new(U256::from(1u64)).cancel_after_estimates(2, cancel.clone()));
        let mut search = search_loop(&ledger, claiming(), SearchConfig::default(), RoundPolicy::Continuous);

        let exit = search.run(&cancel).await.unwrap();
        assert_eq!(exit.stats.submitted, 2);
        // the ledger keeps reporting nonce 0
        assert_eq!(search.state().unwrap().nonce, U256::from(2u64));
    }
}
