//! Core types for proof-of-work mining
//!
//! Difficulty and nonce values with validation at the boundary, plus the
//! solution record returned by a successful search.

use crate::crypto::DIGEST_BITS;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Number of trailing zero bits a digest must have
///
/// Any `u32` is accepted. Values above the digest width can only be met by
/// an all-zero digest; they are a boundary case, not an error.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Difficulty(u32);

impl Difficulty {
    /// Create a new difficulty
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Required number of trailing zero bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Number of digest bits the predicate actually inspects
    pub fn effective_bits(&self) -> u32 {
        self.0.min(DIGEST_BITS)
    }

    /// Expected number of attempts to find a solution (2^k)
    pub fn expected_attempts(&self) -> f64 {
        2f64.powi(self.effective_bits() as i32)
    }
}

impl From<u32> for Difficulty {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl TryFrom<i64> for Difficulty {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| Error::invalid_difficulty(value))
    }
}

impl TryFrom<i32> for Difficulty {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self> {
        Self::try_from(i64::from(value))
    }
}

impl TryFrom<u64> for Difficulty {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| Error::invalid_difficulty(value))
    }
}

impl TryFrom<f64> for Difficulty {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        if !value.is_finite() || value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
            return Err(Error::invalid_difficulty(value));
        }
        Ok(Self(value as u32))
    }
}

impl TryFrom<&str> for Difficulty {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| Error::invalid_difficulty(s))
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Longest decimal rendering of a `u64`
const MAX_NONCE_DIGITS: usize = 20;

/// Proof-of-work nonce
///
/// The counter is hashed as its decimal ASCII text, not as raw binary. A
/// verifier must reproduce exactly these bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Nonce(pub u64);

impl Nonce {
    /// Create a new nonce
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the nonce value
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Canonical byte encoding (decimal ASCII)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = NonceBuf::default();
        buf.encode(*self).to_vec()
    }

    /// Parse the canonical byte encoding
    ///
    /// Rejects empty input, signs, non-digits, leading zeros and values that
    /// overflow a `u64`, so every accepted input re-encodes to itself.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::nonce("empty nonce"));
        }
        if bytes.len() > 1 && bytes[0] == b'0' {
            return Err(Error::nonce("leading zeros are not canonical"));
        }
        if !bytes.iter().all(u8::is_ascii_digit) {
            return Err(Error::nonce(format!(
                "expected decimal digits, got {:?}",
                String::from_utf8_lossy(bytes)
            )));
        }

        // Digits only, so this is valid UTF-8 and parse only fails on overflow
        std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Self)
            .ok_or_else(|| Error::nonce("value does not fit in 64 bits"))
    }
}

impl FromStr for Nonce {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.trim().as_bytes())
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reusable stack buffer for encoding nonces without allocating
#[derive(Debug, Default)]
pub struct NonceBuf {
    digits: [u8; MAX_NONCE_DIGITS],
}

impl NonceBuf {
    /// Write the decimal encoding of `nonce` and return it
    pub fn encode(&mut self, nonce: Nonce) -> &[u8] {
        let mut value = nonce.0;
        let mut pos = MAX_NONCE_DIGITS;
        loop {
            pos -= 1;
            self.digits[pos] = b'0' + (value % 10) as u8;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        &self.digits[pos..]
    }
}

/// A nonce that satisfies the difficulty, with the digest it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// The winning nonce
    pub nonce: Nonce,
    /// Digest of (predecessor hash || transactions || nonce)
    pub digest: [u8; 32],
    /// Total hashes computed across all workers
    pub hashes: u64,
    /// Wall-clock time spent searching
    pub elapsed: Duration,
}

impl Solution {
    /// Canonical nonce bytes, as hashed
    pub fn nonce_bytes(&self) -> Vec<u8> {
        self.nonce.to_bytes()
    }

    /// Digest as a hex string
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Average hash rate over the search
    pub fn hash_rate(&self) -> HashRate {
        HashRate::from_elapsed(self.hashes, self.elapsed)
    }
}

/// Hash rate in hashes per second
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct HashRate(pub f64);

impl HashRate {
    /// Create new hash rate
    pub fn new(rate: f64) -> Self {
        Self(rate)
    }

    /// Compute the rate for a number of hashes over a time period
    pub fn from_elapsed(hashes: u64, elapsed: Duration) -> Self {
        if elapsed.as_secs_f64() > 0.0 {
            Self(hashes as f64 / elapsed.as_secs_f64())
        } else {
            Self(0.0)
        }
    }

    /// Get the rate value
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for HashRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000_000_000.0 {
            write!(f, "{:.2}G H/s", self.0 / 1_000_000_000.0)
        } else if self.0 >= 1_000_000.0 {
            write!(f, "{:.2}M H/s", self.0 / 1_000_000.0)
        } else if self.0 >= 1_000.0 {
            write!(f, "{:.2}K H/s", self.0 / 1_000.0)
        } else {
            write!(f, "{:.2} H/s", self.0)
        }
    }
}
