//! Worker pool.
//!
//! Workers share nothing: each one builds its own ledger connection, state
//! cache and RNG inside its own task. The pool only starts them, hands out
//! cancellation and collects how each one ended.

use rand::RngCore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

use crate::hasher::SaltHasher;
use crate::ledger::LedgerClient;
use crate::search::{LoopExit, LoopStats, SearchLoop};
use crate::MinerError;

/// A running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    /// Worker slot, `0..workers`
    pub slot: usize,
    completion: JoinHandle<Result<LoopExit, MinerError>>,
}

impl WorkerHandle {
    /// Wait for the worker to finish. A panicked or aborted task is reported
    /// as [`MinerError::WorkerAborted`].
    pub async fn wait(self) -> WorkerReport {
        let result = match self.completion.await {
            Ok(result) => result,
            Err(err) => Err(MinerError::WorkerAborted { slot: self.slot, reason: err.to_string() }),
        };
        WorkerReport { slot: self.slot, result }
    }

    /// Whether the worker has finished.
    pub fn is_finished(&self) -> bool {
        self.completion.is_finished()
    }
}

/// How one worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Worker slot
    pub slot: usize,
    /// Loop exit or the fatal error that stopped it
    pub result: Result<LoopExit, MinerError>,
}

/// How the pool ended, one report per slot in slot order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PoolReport {
    /// Per-worker reports
    pub workers: Vec<WorkerReport>,
}

impl PoolReport {
    /// Workers that stopped with an error.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &MinerError)> {
        self.workers.iter().filter_map(|w| w.result.as_ref().err().map(|err| (w.slot, err)))
    }

    /// Whether every worker exited without error.
    pub fn all_ok(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Stats summed over all workers that exited cleanly.
    pub fn totals(&self) -> LoopStats {
        self.workers.iter().filter_map(|w| w.result.as_ref().ok()).fold(
            LoopStats::default(),
            |mut acc, exit| {
                acc.rounds += exit.stats.rounds;
                acc.hashes += exit.stats.hashes;
                acc.invalid += exit.stats.invalid;
                acc.found_no_claim += exit.stats.found_no_claim;
                acc.price_aborts += exit.stats.price_aborts;
                acc.submitted += exit.stats.submitted;
                acc.failed += exit.stats.failed;
                acc
            },
        )
    }
}

/// Fixed-size pool of independent search loops.
#[derive(Debug, Clone)]
pub struct WorkerOrchestrator {
    workers: usize,
    cancel: CancellationToken,
}

impl Default for WorkerOrchestrator {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl WorkerOrchestrator {
    /// Pool of `workers` slots (at least one).
    pub fn new(workers: usize) -> Self {
        Self { workers: workers.max(1), cancel: CancellationToken::new() }
    }

    /// Use `token` as the pool-wide cancellation signal.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Number of slots.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Pool-wide cancellation signal. Cancelling it stops every worker at its
    /// next yield point.
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Start one task per slot. `factory` runs inside the task, so a failed
    /// construction only takes down its own slot.
    pub fn spawn<F, L, H, R>(&self, factory: F) -> Vec<WorkerHandle>
    where
        F: Fn(usize) -> Result<SearchLoop<L, H, R>, MinerError> + Send + Sync + 'static,
        L: LedgerClient,
        H: SaltHasher,
        R: RngCore + Send + 'static,
    {
        let factory = Arc::new(factory);
        (0..self.workers)
            .map(|slot| {
                let factory = Arc::clone(&factory);
                let token = self.cancel.child_token();
                let span = info_span!(target: "gem::pool", "worker", slot);
                let completion = tokio::spawn(
                    async move {
                        let mut worker = factory(slot)?;
                        worker.run(&token).await
                    }
                    .instrument(span),
                );
                WorkerHandle { slot, completion }
            })
            .collect()
    }

    /// Start every worker and wait until all of them are done.
    pub async fn run<F, L, H, R>(&self, factory: F) -> PoolReport
    where
        F: Fn(usize) -> Result<SearchLoop<L, H, R>, MinerError> + Send + Sync + 'static,
        L: LedgerClient,
        H: SaltHasher,
        R: RngCore + Send + 'static,
    {
        info!(target: "gem::pool", workers = self.workers, "Starting workers");

        let mut report = PoolReport::default();
        for handle in self.spawn(factory) {
            let worker = handle.wait().await;
            match &worker.result {
                Ok(exit) => info!(
                    target: "gem::pool",
                    slot = worker.slot,
                    rounds = exit.stats.rounds,
                    hashes = exit.stats.hashes,
                    cancelled = exit.cancelled,
                    "Worker finished"
                ),
                Err(err) => error!(target: "gem::pool", slot = worker.slot, %err, "Worker failed"),
            }
            report.workers.push(worker);
        }
        report
    }
}
