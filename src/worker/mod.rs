//! Mining worker implementations
//!
//! A worker walks a sequence of candidate nonces, hashes each one and tests
//! it against the difficulty. Generating candidates ([`Candidates`]) and
//! testing them ([`crate::crypto::meets_difficulty`]) are kept apart so the
//! same search can be split across threads by stride.

use crate::crypto::BlockHasher;
use crate::types::{Difficulty, HashRate, Solution};
use crate::{Error, Nonce, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Span};

pub mod cpu;
pub mod sequential;

pub use cpu::CpuWorker;
pub use sequential::SequentialWorker;

/// Candidates tested between two cancellation/deadline checks
pub const BATCH_SIZE: u64 = 4096;

/// Interval between progress log lines
const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// Lazily produced nonce counters: `start, start + stride, ...` below `end`
///
/// `end` is exclusive. The full counter space ends at `u64::MAX`, which is
/// never yielded and can therefore serve as a "nothing found" sentinel.
#[derive(Debug, Clone)]
pub struct Candidates {
    next: Option<u64>,
    stride: u64,
    end: u64,
}

impl Candidates {
    /// Create a strided candidate sequence
    pub fn new(start: u64, stride: u64, end: u64) -> Self {
        Self {
            next: Some(start),
            stride: stride.max(1),
            end,
        }
    }

    /// Every counter below `end`, in order
    pub fn all(end: u64) -> Self {
        Self::new(0, 1, end)
    }
}

impl Iterator for Candidates {
    type Item = Nonce;

    fn next(&mut self) -> Option<Nonce> {
        let current = self.next.filter(|value| *value < self.end)?;
        self.next = current.checked_add(self.stride);
        Some(Nonce::new(current))
    }
}

/// Optional bounds on a search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// Only counters below this value are tried
    pub max_attempts: Option<u64>,
    /// Give up once this much time has passed
    pub timeout: Option<Duration>,
}

impl SearchLimits {
    /// No iteration cap and no deadline
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Cap the number of counters tried
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Stop after a deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Exclusive end of the counter space searched under these limits
    pub fn search_end(&self) -> u64 {
        self.max_attempts.unwrap_or(u64::MAX)
    }
}

/// Cancellation token plus deadline, checked once per batch
#[derive(Debug, Clone)]
pub struct StopSignal {
    cancellation: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl StopSignal {
    /// Arm the deadline relative to `started`
    pub fn new(cancellation: &CancellationToken, limits: &SearchLimits, started: Instant) -> Self {
        Self {
            cancellation: cancellation.clone(),
            deadline: limits.timeout.map(|timeout| (started + timeout, timeout)),
        }
    }

    /// Fail with `Cancelled` or `Timeout` if the search must stop
    pub fn check(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(Error::cancelled("nonce search"));
        }
        if let Some((deadline, timeout)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::timeout("nonce search", timeout));
            }
        }
        Ok(())
    }
}

/// Mining statistics for a worker
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    /// Total hashes computed
    pub total_hashes: u64,
    /// Number of solutions found
    pub solutions_found: u64,
    /// Time spent mining
    pub mining_time: Duration,
}

impl MiningStats {
    /// Average hash rate across all searches
    pub fn hash_rate(&self) -> HashRate {
        HashRate::from_elapsed(self.total_hashes, self.mining_time)
    }
}

/// Thread-safe counters shared by the threads of one worker
#[derive(Debug, Default)]
pub struct SearchCounters {
    total_hashes: AtomicU64,
    solutions_found: AtomicU64,
    mining_micros: AtomicU64,
}

impl SearchCounters {
    /// Record a batch of hashes
    pub fn add_hashes(&self, hashes: u64) {
        self.total_hashes.fetch_add(hashes, Ordering::Relaxed);
    }

    /// Record the outcome of one search
    pub fn finish(&self, found: bool, elapsed: Duration) {
        if found {
            self.solutions_found.fetch_add(1, Ordering::Relaxed);
        }
        self.mining_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn to_mining_stats(&self) -> MiningStats {
        MiningStats {
            total_hashes: self.total_hashes.load(Ordering::Relaxed),
            solutions_found: self.solutions_found.load(Ordering::Relaxed),
            mining_time: Duration::from_micros(self.mining_micros.load(Ordering::Relaxed)),
        }
    }
}

/// Periodic debug line with the hash rate
#[derive(Debug)]
pub(crate) struct ProgressLog {
    started: Instant,
    last: Instant,
}

impl ProgressLog {
    pub(crate) fn new(started: Instant) -> Self {
        Self {
            started,
            last: started,
        }
    }

    pub(crate) fn tick(&mut self, hashes: u64, current: Nonce) {
        if self.last.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        let rate = HashRate::from_elapsed(hashes, self.started.elapsed());
        debug!("Searched {} candidates (at nonce {}), {}", hashes, current, rate);
        self.last = Instant::now();
    }
}

/// Mining worker trait
///
/// All workers search the same counter space in the same order of priority:
/// the returned nonce is always the lowest counter below
/// [`SearchLimits::search_end`] that satisfies the difficulty.
pub trait MiningWorker: Send + Sync {
    /// Get the worker type name for logging
    fn worker_type(&self) -> &'static str;

    /// Search for the lowest satisfying nonce
    ///
    /// Blocks until a solution is found, the limits are reached, or
    /// `cancellation` fires.
    fn search(
        &self,
        hasher: &BlockHasher,
        difficulty: Difficulty,
        limits: &SearchLimits,
        cancellation: &CancellationToken,
    ) -> Result<Solution>;

    /// Get current mining statistics
    fn stats(&self) -> MiningStats {
        MiningStats::default()
    }
}

/// Worker factory for creating different types of mining workers
pub struct WorkerFactory;

impl WorkerFactory {
    /// Create a single-threaded worker
    pub fn create_sequential_worker() -> Box<dyn MiningWorker> {
        Box::new(SequentialWorker::new())
    }

    /// Create a CPU worker pool (0 threads = one per logical CPU)
    pub fn create_cpu_worker(thread_count: usize) -> Box<dyn MiningWorker> {
        Box::new(CpuWorker::new(thread_count))
    }

    /// Pick the sequential worker for one thread, the pool otherwise
    pub fn for_thread_count(thread_count: usize) -> Box<dyn MiningWorker> {
        if thread_count == 1 {
            Self::create_sequential_worker()
        } else {
            Self::create_cpu_worker(thread_count)
        }
    }
}

/// Create a tracing span for mining operations
pub fn mining_span(worker_type: &str, difficulty: Difficulty) -> Span {
    tracing::info_span!(
        "mining",
        worker_type = worker_type,
        difficulty = difficulty.bits(),
    )
}
