//! Block Miner
//!
//! Proof-of-work nonce search over SHA-256 block digests:
//! - Lowest-nonce search with a trailing-zero-bit difficulty
//! - Single-threaded and multi-threaded CPU workers with identical results
//! - Attempt limits, deadlines and cancellation
//! - Transaction sampling from a text corpus
//!
//! ```no_run
//! let nonce = block_miner::mine(8, &block_miner::GENESIS_HASH, &["coinbase"])?;
//! assert!(block_miner::verify(block_miner::Difficulty::new(8), &block_miner::GENESIS_HASH, &["coinbase"], &nonce));
//! # Ok::<(), block_miner::Error>(())
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod miner;
pub mod transactions;
pub mod types;
pub mod utils;
pub mod worker;

pub use config::Config;
pub use crypto::{block_digest, meets_difficulty, verify};
pub use error::{Error, Result};
pub use miner::{mine, Miner};
pub use types::*;

/// Predecessor hash of the first block
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Application information
pub const APP_NAME: &str = "block-miner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
