//! Transaction sources
//!
//! The miner treats transactions as opaque, ordered strings. Where they come
//! from is decided here: a fixed list, or lines sampled from a text corpus
//! with an injected random number generator.

use crate::config::Config;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

/// Corpus path that reads standard input
pub const STDIN_PATH: &str = "-";

/// Supplies the ordered transaction sequence for a block
pub trait TransactionSource: Send {
    /// Produce the transactions to include, in hashing order
    fn transactions(&mut self) -> Result<Vec<String>>;
}

/// A fixed list of transactions, returned as given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedTransactions(pub Vec<String>);

impl FixedTransactions {
    /// Create from anything string-like
    pub fn new<I, S>(transactions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(transactions.into_iter().map(Into::into).collect())
    }
}

impl TransactionSource for FixedTransactions {
    fn transactions(&mut self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// A line-oriented text corpus, one entry per line
///
/// Lines are trimmed of surrounding whitespace; blank lines stay in as empty
/// entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCorpus {
    lines: Vec<String>,
}

impl LineCorpus {
    /// Split text into trimmed lines
    pub fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(|line| line.trim().to_string()).collect(),
        }
    }

    /// Read a corpus file
    pub async fn from_path(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let corpus = Self::parse(&content);
        debug!("Loaded {} lines from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    /// Read a corpus from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let lines = reader
            .lines()
            .map(|line| line.map(|line| line.trim().to_string()))
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self { lines })
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the corpus has no entries
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Entries in file order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Draws `count` entries uniformly, with replacement, from a corpus
#[derive(Debug, Clone)]
pub struct RandomSample<R> {
    corpus: LineCorpus,
    count: usize,
    rng: R,
}

impl<R: Rng> RandomSample<R> {
    /// Sample with the given random number generator
    pub fn new(corpus: LineCorpus, count: usize, rng: R) -> Self {
        Self { corpus, count, rng }
    }
}

impl RandomSample<StdRng> {
    /// Reproducible sampling from a seed
    pub fn seeded(corpus: LineCorpus, count: usize, seed: u64) -> Self {
        Self::new(corpus, count, StdRng::seed_from_u64(seed))
    }

    /// Sampling seeded from the operating system
    pub fn from_os_rng(corpus: LineCorpus, count: usize) -> Self {
        Self::new(corpus, count, StdRng::from_os_rng())
    }
}

impl<R: Rng + Send> TransactionSource for RandomSample<R> {
    fn transactions(&mut self) -> Result<Vec<String>> {
        if self.count == 0 {
            return Ok(Vec::new());
        }
        if self.corpus.is_empty() {
            return Err(Error::transactions(format!(
                "cannot sample {} transactions from an empty corpus",
                self.count
            )));
        }

        let lines = self.corpus.lines();
        Ok((0..self.count)
            .map(|_| lines[self.rng.random_range(0..lines.len())].clone())
            .collect())
    }
}

/// Build the transaction source described by the configuration
///
/// `--transaction` values are used in the given order; a corpus file (or
/// standard input for `-`) is sampled, reproducibly when a seed is set. With neither, the block has no
/// transactions.
pub async fn source_from_config(config: &Config) -> Result<Box<dyn TransactionSource>> {
    if let Some(path) = &config.transactions_file {
        let corpus = if path.as_os_str() == STDIN_PATH {
            LineCorpus::from_reader(std::io::stdin().lock())?
        } else {
            LineCorpus::from_path(path).await?
        };
        return Ok(match config.seed {
            Some(seed) => Box::new(RandomSample::seeded(corpus, config.count, seed)),
            None => Box::new(RandomSample::from_os_rng(corpus, config.count)),
        });
    }

    Ok(Box::new(FixedTransactions::new(config.transactions.iter().cloned())))
}
