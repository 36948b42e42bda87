//! Configuration management for the block miner
//!
//! Supports configuration via command line arguments, environment variables,
//! and configuration files (YAML/JSON). Values given on the command line or
//! through the environment take precedence over the file.

use crate::types::{Difficulty, Nonce};
use crate::utils::hex_to_bytes;
use crate::worker::SearchLimits;
use crate::{Error, Result};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Hex encoding of the conventional genesis predecessor (32 zero bytes)
pub const GENESIS_HASH_HEX: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    Plain,
    /// One JSON object per event
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plain => write!(f, "plain"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Complete configuration for the miner
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "block-miner",
    version = env!("CARGO_PKG_VERSION"),
    about = "Proof-of-work nonce miner",
    long_about = "Searches for the lowest nonce whose SHA-256 digest over (predecessor hash || transactions || nonce) has the requested number of trailing zero bits"
)]
pub struct Config {
    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(skip)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Required number of trailing zero bits
    #[arg(short = 'd', long, default_value = "20", allow_hyphen_values = true)]
    #[serde(default = "default_difficulty")]
    pub difficulty: String,

    /// Predecessor block hash in hex (default: genesis, 32 zero bytes)
    #[arg(short = 'p', long, default_value = GENESIS_HASH_HEX)]
    #[serde(default = "default_prev_hash")]
    pub prev_hash: String,

    /// Text corpus to sample transactions from, one per line ("-" for stdin)
    #[arg(short = 'f', long, value_name = "FILE", conflicts_with = "transactions")]
    #[serde(default)]
    pub transactions_file: Option<PathBuf>,

    /// Transaction to include, in order (repeatable)
    #[arg(short = 't', long = "transaction", value_name = "TX")]
    #[serde(default)]
    pub transactions: Vec<String>,

    /// Number of transactions to sample from the corpus
    #[arg(short = 'n', long, default_value = "10")]
    #[serde(default = "default_count")]
    pub count: usize,

    /// Seed for reproducible transaction sampling
    #[arg(long)]
    #[serde(default)]
    pub seed: Option<u64>,

    /// Number of mining threads (1 = sequential, 0 = all cores)
    #[arg(short = 'c', long = "threads", env = "BLOCK_MINER_THREADS", default_value = "1")]
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Give up after trying this many nonces
    #[arg(long)]
    #[serde(default)]
    pub max_attempts: Option<u64>,

    /// Give up after this long (e.g. "30s", "5m")
    #[arg(long)]
    #[serde(default)]
    pub timeout: Option<String>,

    /// Verify this nonce instead of mining
    #[arg(long, value_name = "NONCE")]
    #[serde(default)]
    pub verify: Option<String>,

    /// Log level
    #[arg(short = 'l', long, env = "BLOCK_MINER_LOG_LEVEL", default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, default_value = "plain")]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process arguments and optional file
    ///
    /// Exits with a usage message on invalid arguments, `--help` and
    /// `--version`.
    pub async fn load() -> Result<Self> {
        Self::from_matches(Self::command().get_matches()).await
    }

    /// Load configuration from explicit arguments
    pub async fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command()
            .try_get_matches_from(args)
            .map_err(|e| Error::config(e.to_string()))?;
        Self::from_matches(matches).await
    }

    async fn from_matches(matches: ArgMatches) -> Result<Self> {
        let mut config =
            Self::from_arg_matches(&matches).map_err(|e| Error::config(e.to_string()))?;

        if let Some(config_file) = &config.config_file {
            let file_config = Self::load_from_file(config_file).await?;
            config = config.merge_with_file(file_config, &matches);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            // Default to YAML
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Take file values for every field not set on the command line or in
    /// the environment
    fn merge_with_file(mut self, file: Self, matches: &ArgMatches) -> Self {
        let from_file = |id: &str| {
            !matches!(
                matches.value_source(id),
                Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable)
            )
        };

        if from_file("difficulty") {
            self.difficulty = file.difficulty;
        }
        if from_file("prev_hash") {
            self.prev_hash = file.prev_hash;
        }
        if from_file("transactions_file") && from_file("transactions") {
            self.transactions_file = file.transactions_file;
            self.transactions = file.transactions;
        }
        if from_file("count") {
            self.count = file.count;
        }
        if from_file("seed") {
            self.seed = file.seed;
        }
        if from_file("thread_count") {
            self.thread_count = file.thread_count;
        }
        if from_file("max_attempts") {
            self.max_attempts = file.max_attempts;
        }
        if from_file("timeout") {
            self.timeout = file.timeout;
        }
        if from_file("verify") {
            self.verify = file.verify;
        }
        if from_file("log_level") {
            self.log_level = file.log_level;
        }
        if from_file("log_format") {
            self.log_format = file.log_format;
        }
        if from_file("log_file") {
            self.log_file = file.log_file;
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.difficulty()?;
        self.prev_hash_bytes()?;
        self.timeout_duration()?;
        self.verify_nonce()?;

        if self.transactions_file.is_some() && !self.transactions.is_empty() {
            return Err(Error::config(
                "Use either a transactions file or explicit transactions, not both",
            ));
        }

        // An unseeded sample is a different block on every run
        if self.verify.is_some() && self.transactions_file.is_some() && self.seed.is_none() {
            return Err(Error::config(
                "Verifying against a sampled transactions file requires --seed",
            ));
        }

        if self.max_attempts == Some(0) {
            return Err(Error::config("Max attempts must be greater than 0"));
        }

        Ok(())
    }

    /// Get parsed difficulty
    pub fn difficulty(&self) -> Result<Difficulty> {
        Difficulty::from_str(&self.difficulty)
    }

    /// Get predecessor hash bytes
    pub fn prev_hash_bytes(&self) -> Result<Vec<u8>> {
        hex_to_bytes(&self.prev_hash)
            .map_err(|e| Error::config(format!("Invalid predecessor hash: {}", e)))
    }

    /// Get parsed timeout
    pub fn timeout_duration(&self) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|s| {
                humantime::parse_duration(s)
                    .map_err(|e| Error::config(format!("Invalid timeout {:?}: {}", s, e)))
            })
            .transpose()
    }

    /// Get the nonce to verify, if any
    pub fn verify_nonce(&self) -> Result<Option<Nonce>> {
        self.verify.as_deref().map(Nonce::from_str).transpose()
    }

    /// Get search limits
    pub fn search_limits(&self) -> Result<SearchLimits> {
        Ok(SearchLimits {
            max_attempts: self.max_attempts,
            timeout: self.timeout_duration()?,
        })
    }
}

// Default value functions for serde
fn default_difficulty() -> String { "20".to_string() }
fn default_prev_hash() -> String { GENESIS_HASH_HEX.to_string() }
fn default_count() -> usize { 10 }
fn default_thread_count() -> usize { 1 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_format() -> LogFormat { LogFormat::Plain }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_config_defaults() {
        let config = Config::try_parse_from(["block-miner"]).unwrap();

        assert_eq!(config.difficulty().unwrap(), Difficulty::new(20));
        assert_eq!(config.prev_hash_bytes().unwrap(), vec![0u8; 32]);
        assert_eq!(config.count, 10);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.log_format, LogFormat::Plain);
        assert_eq!(config.search_limits().unwrap(), SearchLimits::unbounded());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_limits() {
        let config = Config::try_parse_from([
            "block-miner",
            "--max-attempts",
            "5000",
            "--timeout",
            "1m 30s",
        ])
        .unwrap();

        let limits = config.search_limits().unwrap();
        assert_eq!(limits.max_attempts, Some(5000));
        assert_eq!(limits.timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_config_validation_errors() {
        let cases: [&[&str]; 5] = [
            &["block-miner", "--difficulty", "-1"],
            &["block-miner", "--difficulty", "1.5"],
            &["block-miner", "--prev-hash", "xyz"],
            &["block-miner", "--timeout", "soon"],
            &["block-miner", "--max-attempts", "0"],
        ];

        for args in cases {
            let config = Config::try_parse_from(args).unwrap();
            assert!(config.validate().is_err(), "args = {:?}", args);
        }

        let config = Config::try_parse_from(["block-miner", "--difficulty", "abc"]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidDifficulty { .. })
        ));
    }

    #[test]
    fn test_transactions_file_conflicts_with_transactions() {
        let result = Config::try_parse_from([
            "block-miner",
            "--transactions-file",
            "corpus.txt",
            "--transaction",
            "tx",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_from_yaml() {
        let yaml_content = r#"
difficulty: "12"
prev_hash: "ff00"
transactions: ["a", "b"]
thread_count: 4
timeout: "10s"
log_format: json
"#;

        let mut temp_file = Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();

        let config = Config::load_from_file(temp_file.path())
            .await
            .unwrap();

        assert_eq!(config.difficulty().unwrap(), Difficulty::new(12));
        assert_eq!(config.prev_hash_bytes().unwrap(), vec![0xff, 0x00]);
        assert_eq!(config.transactions, vec!["a", "b"]);
        assert_eq!(config.thread_count, 4);
        assert_eq!(config.timeout_duration().unwrap(), Some(Duration::from_secs(10)));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.count, 10);
    }

    #[tokio::test]
    async fn test_command_line_overrides_file() {
        let mut temp_file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(temp_file, r#"{{"difficulty": "12", "count": 3, "seed": 99}}"#).unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let config = Config::load_from([
            "block-miner",
            "--config-file",
            path.as_str(),
            "--difficulty",
            "6",
        ])
        .await
        .unwrap();

        assert_eq!(config.difficulty().unwrap(), Difficulty::new(6));
        assert_eq!(config.count, 3);
        assert_eq!(config.seed, Some(99));
    }

    #[test]
    fn test_verify_nonce_parsing() {
        let config = Config::try_parse_from(["block-miner", "--verify", "1234"]).unwrap();
        assert_eq!(config.verify_nonce().unwrap(), Some(Nonce::new(1234)));

        let config = Config::try_parse_from(["block-miner", "--verify", "0012"]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_verify_sampled_block_requires_seed() {
        let config = Config::try_parse_from([
            "block-miner",
            "--verify",
            "5",
            "--transactions-file",
            "corpus.txt",
        ])
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));

        let config = Config::try_parse_from([
            "block-miner",
            "--verify",
            "5",
            "--transactions-file",
            "corpus.txt",
            "--seed",
            "3",
        ])
        .unwrap();
        assert!(config.validate().is_ok());

        let config = Config::try_parse_from(["block-miner", "--transactions-file", "corpus.txt"])
            .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogFormat::Json.to_string(), "json");
    }
}
