//! Proof-of-work miner
//!
//! Finds the lowest counter whose decimal encoding, appended to the
//! predecessor hash and the transactions, yields a SHA-256 digest with at
//! least `difficulty` trailing zero bits.

use crate::config::Config;
use crate::crypto::{meets_difficulty, BlockHasher};
use crate::types::{Difficulty, Solution};
use crate::worker::{MiningStats, MiningWorker, SearchLimits, WorkerFactory};
use crate::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Mining facade: a worker plus the limits it searches under
pub struct Miner {
    worker: Box<dyn MiningWorker>,
    limits: SearchLimits,
}

impl Miner {
    /// Create a miner from a worker and search limits
    pub fn new(worker: Box<dyn MiningWorker>, limits: SearchLimits) -> Self {
        Self { worker, limits }
    }

    /// Single-threaded miner without limits
    pub fn sequential() -> Self {
        Self::new(WorkerFactory::create_sequential_worker(), SearchLimits::unbounded())
    }

    /// Miner with `thread_count` threads (1 = sequential, 0 = all cores)
    pub fn with_threads(thread_count: usize) -> Self {
        Self::new(WorkerFactory::for_thread_count(thread_count), SearchLimits::unbounded())
    }

    /// Build a miner from the thread count and limits in the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            WorkerFactory::for_thread_count(config.thread_count),
            config.search_limits()?,
        ))
    }

    /// Replace the search limits
    pub fn with_limits(mut self, limits: SearchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Current search limits
    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    /// Worker type name
    pub fn worker_type(&self) -> &'static str {
        self.worker.worker_type()
    }

    /// Statistics accumulated by the worker
    pub fn stats(&self) -> MiningStats {
        self.worker.stats()
    }

    /// Find the lowest satisfying nonce
    ///
    /// `difficulty` is validated before any hashing: negative, fractional or
    /// non-numeric values fail with [`Error::InvalidDifficulty`].
    pub fn mine<D, S>(
        &self,
        difficulty: D,
        predecessor_hash: &[u8],
        transactions: &[S],
    ) -> Result<Solution>
    where
        D: TryInto<Difficulty>,
        Error: From<D::Error>,
        S: AsRef<str>,
    {
        self.mine_with_cancel(
            difficulty,
            predecessor_hash,
            transactions,
            &CancellationToken::new(),
        )
    }

    /// Like [`Miner::mine`], stopping with [`Error::Cancelled`] once
    /// `cancellation` fires
    pub fn mine_with_cancel<D, S>(
        &self,
        difficulty: D,
        predecessor_hash: &[u8],
        transactions: &[S],
        cancellation: &CancellationToken,
    ) -> Result<Solution>
    where
        D: TryInto<Difficulty>,
        Error: From<D::Error>,
        S: AsRef<str>,
    {
        let difficulty: Difficulty = difficulty.try_into()?;

        info!(
            "Mining with difficulty {} over {} transactions ({} worker, ~{:.0} attempts expected)",
            difficulty,
            transactions.len(),
            self.worker.worker_type(),
            difficulty.expected_attempts()
        );

        let hasher = BlockHasher::new(predecessor_hash, transactions);
        let solution = self
            .worker
            .search(&hasher, difficulty, &self.limits, cancellation)?;

        debug_assert!(meets_difficulty(&solution.digest, difficulty));
        Ok(solution)
    }
}

/// Mine with a single thread and no limits, returning the nonce bytes
///
/// The bytes are the decimal ASCII text of the winning counter, exactly as
/// they were hashed.
pub fn mine<S: AsRef<str>>(
    difficulty: u32,
    predecessor_hash: &[u8],
    transactions: &[S],
) -> Result<Vec<u8>> {
    Miner::sequential()
        .mine(difficulty, predecessor_hash, transactions)
        .map(|solution| solution.nonce_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{block_digest, verify};
    use crate::Nonce;
    use std::time::Duration;

    const GENESIS: [u8; 32] = [0u8; 32];
    const NO_TRANSACTIONS: [&str; 0] = [];

    #[test]
    fn test_mine_difficulty_zero_returns_first_counter() {
        let nonce = mine(0, &[1, 2, 3], &["anything"]).unwrap();
        assert_eq!(nonce, b"0");
    }

    #[test]
    fn test_mine_is_deterministic() {
        let txs = ["tx one", "tx two", "tx three"];
        let first = mine(10, &GENESIS, &txs).unwrap();
        let second = mine(10, &GENESIS, &txs).unwrap();
        assert_eq!(first, second);
        assert!(verify(Difficulty::new(10), &GENESIS, &txs, &first));
    }

    #[test]
    fn test_mine_result_reproduces_digest() {
        let txs = vec!["alpha".to_string(), "beta".to_string()];
        let solution = Miner::sequential().mine(12u32, &GENESIS, &txs).unwrap();

        let digest = block_digest(&GENESIS, &txs, &solution.nonce_bytes());
        assert_eq!(digest, solution.digest);
        assert!(meets_difficulty(&digest, Difficulty::new(12)));
    }

    #[test]
    fn test_mine_accepts_any_predecessor_length() {
        for prev in [&[][..], &[0xAB][..], &[0x11; 64][..]] {
            let nonce = mine(4, prev, &NO_TRANSACTIONS).unwrap();
            assert!(verify(Difficulty::new(4), prev, &NO_TRANSACTIONS, &nonce));
        }
    }

    #[test]
    fn test_invalid_difficulty_performs_no_hashing() {
        let miner = Miner::sequential();

        assert!(matches!(
            miner.mine(-1i64, &GENESIS, &NO_TRANSACTIONS),
            Err(Error::InvalidDifficulty { .. })
        ));
        assert!(matches!(
            miner.mine(2.5f64, &GENESIS, &NO_TRANSACTIONS),
            Err(Error::InvalidDifficulty { .. })
        ));
        assert!(matches!(
            miner.mine("eight", &GENESIS, &NO_TRANSACTIONS),
            Err(Error::InvalidDifficulty { .. })
        ));

        assert_eq!(miner.stats().total_hashes, 0);
    }

    #[test]
    fn test_miner_accepts_validated_difficulty_forms() {
        let miner = Miner::sequential();
        let expected = miner.mine(5u32, &GENESIS, &["x"]).unwrap().nonce;

        assert_eq!(miner.mine(5i64, &GENESIS, &["x"]).unwrap().nonce, expected);
        assert_eq!(miner.mine(5.0f64, &GENESIS, &["x"]).unwrap().nonce, expected);
        assert_eq!(miner.mine("5", &GENESIS, &["x"]).unwrap().nonce, expected);
    }

    #[test]
    fn test_miner_respects_limits() {
        let miner = Miner::with_threads(2).with_limits(SearchLimits::unbounded().with_max_attempts(64));
        assert_eq!(miner.limits().max_attempts, Some(64));

        let result = miner.mine(300u32, &GENESIS, &NO_TRANSACTIONS);
        assert!(matches!(result, Err(Error::SearchExhausted { attempts: 64 })));
    }

    #[test]
    fn test_miner_cancellation() {
        let miner = Miner::sequential()
            .with_limits(SearchLimits::unbounded().with_timeout(Duration::from_secs(60)));
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let result = miner.mine_with_cancel(40u32, &GENESIS, &NO_TRANSACTIONS, &cancellation);
        assert!(matches!(result, Err(Error::Cancelled { .. })));
    }

    #[test]
    fn test_genesis_scenario() {
        let nonce = mine(8, &GENESIS, &NO_TRANSACTIONS).unwrap();
        let parsed = Nonce::from_bytes(&nonce).unwrap();
        assert_eq!(parsed.to_bytes(), nonce);

        let digest = block_digest(&GENESIS, &NO_TRANSACTIONS, &nonce);
        assert_eq!(digest[31], 0x00);
    }
}
