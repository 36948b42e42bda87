//! CPU mining worker implementation
//!
//! Multi-threaded search over a strided split of the counter space. Worker
//! `i` of `W` tries `i, i + W, i + 2W, ...`; together the threads cover every
//! counter exactly once.
//!
//! Threads share a single "best counter" slot. A thread that finds a
//! solution lowers the slot with an atomic minimum, and every thread stops
//! once its next counter is above the slot. Every counter below the final
//! best has therefore been tested and rejected, so the result is the same
//! lowest counter the sequential search returns, for any thread count.

use super::{
    mining_span, Candidates, MiningStats, MiningWorker, ProgressLog, SearchCounters, SearchLimits,
    StopSignal, BATCH_SIZE,
};
use crate::crypto::{meets_difficulty, BlockHasher};
use crate::types::{Difficulty, NonceBuf, Solution};
use crate::{Error, Nonce, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// No solution recorded yet; never yielded by [`Candidates`]
const NOT_FOUND: u64 = u64::MAX;

/// CPU mining worker using multiple threads
#[derive(Debug)]
pub struct CpuWorker {
    thread_count: usize,
    counters: SearchCounters,
}

/// How a single thread left its loop
#[derive(Debug)]
enum ThreadExit {
    /// Found a solution or moved past the best one
    Settled,
    /// Ran out of candidates
    Exhausted,
    /// Cancelled or timed out before it could settle
    Interrupted(Error),
}

impl CpuWorker {
    /// Create a new CPU worker with specified thread count (0 = all cores)
    pub fn new(thread_count: usize) -> Self {
        let thread_count = if thread_count == 0 {
            num_cpus::get()
        } else {
            thread_count
        };

        debug!("Creating CPU worker with {} threads", thread_count);

        Self {
            thread_count,
            counters: SearchCounters::default(),
        }
    }

    /// Number of search threads
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Search one stride of the counter space
    #[allow(clippy::too_many_arguments)]
    fn mine_thread(
        thread_id: usize,
        thread_count: usize,
        hasher: &BlockHasher,
        difficulty: Difficulty,
        end: u64,
        best: &AtomicU64,
        stop: &StopSignal,
        searched: &AtomicU64,
        started: Instant,
    ) -> ThreadExit {
        debug!("Starting mining thread {}", thread_id);

        let mut buf = NonceBuf::default();
        let mut progress = ProgressLog::new(started);
        let mut hashes_computed = 0u64;
        let mut pending = 0u64;

        let exit = 'search: {
            for nonce in Candidates::new(thread_id as u64, thread_count as u64, end) {
                if nonce.value() > best.load(Ordering::Acquire) {
                    break 'search ThreadExit::Settled;
                }

                if hashes_computed % BATCH_SIZE == 0 {
                    searched.fetch_add(pending, Ordering::Relaxed);
                    pending = 0;
                    if let Err(e) = stop.check() {
                        break 'search ThreadExit::Interrupted(e);
                    }
                    // One progress line per pool, counting every thread
                    if thread_id == 0 {
                        progress.tick(searched.load(Ordering::Relaxed), nonce);
                    }
                }

                let digest = hasher.digest_nonce(nonce, &mut buf);
                hashes_computed += 1;
                pending += 1;

                if meets_difficulty(&digest, difficulty) {
                    debug!("Thread {} found candidate nonce {}", thread_id, nonce);
                    best.fetch_min(nonce.value(), Ordering::AcqRel);
                    break 'search ThreadExit::Settled;
                }
            }
            ThreadExit::Exhausted
        };

        searched.fetch_add(pending, Ordering::Relaxed);
        debug!("Thread {} completed with {} hashes", thread_id, hashes_computed);
        exit
    }
}

impl MiningWorker for CpuWorker {
    fn worker_type(&self) -> &'static str {
        "cpu"
    }

    fn search(
        &self,
        hasher: &BlockHasher,
        difficulty: Difficulty,
        limits: &SearchLimits,
        cancellation: &CancellationToken,
    ) -> Result<Solution> {
        let _span = mining_span(self.worker_type(), difficulty).entered();

        info!(
            "Starting CPU mining with {} threads (difficulty: {} bits)",
            self.thread_count, difficulty
        );

        let started = Instant::now();
        let searched = AtomicU64::new(0);
        let stop = StopSignal::new(cancellation, limits, started);
        let best = AtomicU64::new(NOT_FOUND);
        let end = limits.search_end();

        let exits: Vec<ThreadExit> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.thread_count)
                .map(|thread_id| {
                    let (best, stop, searched) = (&best, &stop, &searched);
                    let thread_count = self.thread_count;
                    scope.spawn(move || {
                        Self::mine_thread(
                            thread_id,
                            thread_count,
                            hasher,
                            difficulty,
                            end,
                            best,
                            stop,
                            searched,
                            started,
                        )
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let hashes = searched.into_inner();
        self.counters.add_hashes(hashes);
        let elapsed = started.elapsed();

        // A thread stopped early may not have ruled out every lower counter,
        // so an interruption wins over any solution found in the meantime.
        let interrupted = exits.into_iter().find_map(|exit| match exit {
            ThreadExit::Interrupted(e) => Some(e),
            ThreadExit::Settled | ThreadExit::Exhausted => None,
        });

        let result = match (interrupted, best.load(Ordering::Acquire)) {
            (Some(e), _) => {
                warn!("CPU mining stopped: {}", e);
                Err(e)
            }
            (None, NOT_FOUND) => {
                warn!("All mining threads completed without finding solution");
                Err(Error::search_exhausted(hashes))
            }
            (None, value) => {
                let nonce = Nonce::new(value);
                let digest = hasher.digest_nonce(nonce, &mut NonceBuf::default());
                Ok(Solution {
                    nonce,
                    digest,
                    hashes,
                    elapsed,
                })
            }
        };

        self.counters.finish(result.is_ok(), elapsed);

        if let Ok(solution) = &result {
            info!(
                "CPU mining found nonce {}. Total hashes: {}, Hash rate: {}",
                solution.nonce,
                solution.hashes,
                solution.hash_rate()
            );
        }

        result
    }

    fn stats(&self) -> MiningStats {
        self.counters.to_mining_stats()
    }
}
