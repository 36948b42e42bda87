//! Single-threaded reference search
//!
//! Tries counters 0, 1, 2, ... on the calling thread and returns the first
//! one that satisfies the difficulty.

use super::{
    mining_span, Candidates, MiningStats, MiningWorker, ProgressLog, SearchCounters, SearchLimits,
    StopSignal, BATCH_SIZE,
};
use crate::crypto::{meets_difficulty, BlockHasher};
use crate::types::{Difficulty, NonceBuf, Solution};
use crate::{Error, Result};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Mining worker that searches on the calling thread
#[derive(Debug, Default)]
pub struct SequentialWorker {
    counters: SearchCounters,
}

impl SequentialWorker {
    /// Create a new sequential worker
    pub fn new() -> Self {
        Self::default()
    }
}

/// Walk every counter below the search end, counting hashes as it goes
fn scan(
    hasher: &BlockHasher,
    difficulty: Difficulty,
    limits: &SearchLimits,
    stop: &StopSignal,
    started: Instant,
    hashes: &mut u64,
) -> Result<Solution> {
    let mut progress = ProgressLog::new(started);
    let mut buf = NonceBuf::default();

    for nonce in Candidates::all(limits.search_end()) {
        if *hashes % BATCH_SIZE == 0 {
            stop.check()?;
            progress.tick(*hashes, nonce);
        }

        let digest = hasher.digest_nonce(nonce, &mut buf);
        *hashes += 1;

        if meets_difficulty(&digest, difficulty) {
            return Ok(Solution {
                nonce,
                digest,
                hashes: *hashes,
                elapsed: started.elapsed(),
            });
        }
    }

    Err(Error::search_exhausted(*hashes))
}

impl MiningWorker for SequentialWorker {
    fn worker_type(&self) -> &'static str {
        "sequential"
    }

    fn search(
        &self,
        hasher: &BlockHasher,
        difficulty: Difficulty,
        limits: &SearchLimits,
        cancellation: &CancellationToken,
    ) -> Result<Solution> {
        let _span = mining_span(self.worker_type(), difficulty).entered();
        let started = Instant::now();
        let stop = StopSignal::new(cancellation, limits, started);
        let mut hashes = 0u64;

        debug!("Searching counters below {}", limits.search_end());

        let result = scan(hasher, difficulty, limits, &stop, started, &mut hashes);

        self.counters.add_hashes(hashes);
        self.counters.finish(result.is_ok(), started.elapsed());

        if let Ok(solution) = &result {
            info!(
                "Found nonce {} after {} hashes ({})",
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
