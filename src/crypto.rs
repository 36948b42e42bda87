//! Cryptographic utilities for mining
//!
//! SHA-256 digest construction over (predecessor hash || transactions || nonce)
//! and the trailing-zero-bit difficulty predicate.

use crate::types::{Difficulty, Nonce, NonceBuf};
use sha2::{Digest, Sha256};

/// Width of a digest in bits
pub const DIGEST_BITS: u32 = 256;

/// SHA-256 hasher with the predecessor hash and transactions already absorbed
///
/// Cloning the prefix state and feeding it the nonce hashes exactly the same
/// bytes as hashing the full concatenation, so each candidate only pays for
/// the nonce suffix.
#[derive(Clone)]
pub struct BlockHasher {
    prefix: Sha256,
}

impl BlockHasher {
    /// Absorb the predecessor hash, then every transaction in order
    ///
    /// Transactions are concatenated without separators: `["ab", "c"]` and
    /// `["a", "bc"]` produce the same prefix.
    pub fn new<S: AsRef<str>>(predecessor_hash: &[u8], transactions: &[S]) -> Self {
        let mut prefix = Sha256::new();
        prefix.update(predecessor_hash);
        for transaction in transactions {
            prefix.update(transaction.as_ref().as_bytes());
        }
        Self { prefix }
    }

    /// Digest for the given nonce bytes
    #[inline]
    pub fn digest(&self, nonce: &[u8]) -> [u8; 32] {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce);
        hasher.finalize().into()
    }

    /// Digest for a nonce counter, encoding it into `buf`
    #[inline]
    pub fn digest_nonce(&self, nonce: Nonce, buf: &mut NonceBuf) -> [u8; 32] {
        self.digest(buf.encode(nonce))
    }
}

/// One-shot digest of (predecessor hash || transactions || nonce)
pub fn block_digest<S: AsRef<str>>(
    predecessor_hash: &[u8],
    transactions: &[S],
    nonce: &[u8],
) -> [u8; 32] {
    BlockHasher::new(predecessor_hash, transactions).digest(nonce)
}

/// Count trailing zero bits of the digest read as a big-endian integer
///
/// The least significant bits live in the last byte.
pub fn trailing_zero_bits(digest: &[u8; 32]) -> u32 {
    let mut zeros = 0u32;
    for byte in digest.iter().rev() {
        if *byte == 0 {
            zeros += 8;
        } else {
            zeros += byte.trailing_zeros();
            break;
        }
    }
    zeros
}

/// Test `(digest & ((1 << k) - 1)) == 0`
///
/// For k above the digest width the mask covers every bit, so only the
/// all-zero digest passes.
#[inline]
pub fn meets_difficulty(digest: &[u8; 32], difficulty: Difficulty) -> bool {
    trailing_zero_bits(digest) >= difficulty.effective_bits()
}

/// Check a claimed nonce with a single digest computation
///
/// Only the canonical decimal encoding verifies; `b"007"` is not the same
/// nonce as `b"7"` as far as a miner is concerned.
pub fn verify<S: AsRef<str>>(
    difficulty: Difficulty,
    predecessor_hash: &[u8],
    transactions: &[S],
    nonce: &[u8],
) -> bool {
    if Nonce::from_bytes(nonce).is_err() {
        return false;
    }
    meets_difficulty(&block_digest(predecessor_hash, transactions, nonce), difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use proptest::prelude::*;

    const NO_TRANSACTIONS: [&str; 0] = [];

    #[test]
    fn test_block_digest_matches_plain_sha256() {
        // SHA-256("abc")
        let expected = hex::decode(
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        )
        .unwrap();

        let digest = block_digest(b"a", &["b"], b"c");
        assert_eq!(digest.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_transactions_have_no_separators() {
        let prev = [0u8; 32];
        assert_eq!(
            block_digest(&prev, &["ab", "c"], b"1"),
            block_digest(&prev, &["a", "bc"], b"1")
        );
        assert_ne!(
            block_digest(&prev, &["a", "b"], b"1"),
            block_digest(&prev, &["b", "a"], b"1")
        );
    }

    #[test]
    fn test_hasher_prefix_reuse() {
        let prev = [7u8; 32];
        let txs = vec!["alice pays bob".to_string(), "bob pays carol".to_string()];
        let hasher = BlockHasher::new(&prev, &txs);
        let mut buf = NonceBuf::default();

        for value in [0u64, 1, 99, 123_456] {
            let nonce = Nonce::new(value);
            assert_eq!(
                hasher.digest_nonce(nonce, &mut buf),
                block_digest(&prev, &txs, &nonce.to_bytes())
            );
        }
    }

    #[test]
    fn test_trailing_zero_bits() {
        assert_eq!(trailing_zero_bits(&[0u8; 32]), 256);
        assert_eq!(trailing_zero_bits(&[0xFF; 32]), 0);

        let mut digest = [0xFF; 32];
        digest[31] = 0x00;
        digest[30] = 0x10;
        assert_eq!(trailing_zero_bits(&digest), 12);

        let mut digest = [0u8; 32];
        digest[0] = 0x80;
        assert_eq!(trailing_zero_bits(&digest), 255);
    }

    #[test]
    fn test_predicate_matches_big_integer_mask() {
        let mut samples = vec![[0u8; 32], [0xFF; 32]];
        let mut high_bit = [0u8; 32];
        high_bit[0] = 0x80;
        samples.push(high_bit);
        let mut low_bit = [0u8; 32];
        low_bit[31] = 0x01;
        samples.push(low_bit);
        let mut mixed = [0xA5; 32];
        mixed[31] = 0x00;
        mixed[30] = 0x40;
        samples.push(mixed);
        samples.push(block_digest(&[0u8; 32], &NO_TRANSACTIONS, b"0"));

        for digest in &samples {
            let value = BigUint::from_bytes_be(digest);
            for k in [0usize, 1, 7, 8, 9, 14, 15, 64, 255, 256, 257, 300, 1024] {
                let mask = (BigUint::from(1u32) << k) - 1u32;
                let expected = (&value & &mask) == BigUint::from(0u32);
                assert_eq!(
                    meets_difficulty(digest, Difficulty::new(k as u32)),
                    expected,
                    "k = {} digest = {}",
                    k,
                    hex::encode(digest)
                );
            }
        }
    }

    proptest! {
        #[test]
        fn predicate_matches_mask_for_any_digest(
            mut digest in prop::array::uniform32(any::<u8>()),
            zero_tail in 0usize..=32,
            k in 0u32..=300,
        ) {
            // Clear trailing bytes so large k is reached, not just k < 8
            for byte in digest.iter_mut().rev().take(zero_tail) {
                *byte = 0;
            }

            let value = BigUint::from_bytes_be(&digest);
            let mask = (BigUint::from(1u32) << k as usize) - 1u32;
            let expected = (&value & &mask) == BigUint::from(0u32);

            prop_assert_eq!(meets_difficulty(&digest, Difficulty::new(k)), expected);
        }

        #[test]
        fn prefix_hasher_matches_one_shot_digest(
            prev in prop::collection::vec(any::<u8>(), 0..64),
            txs in prop::collection::vec(".{0,12}", 0..5),
            nonce in any::<u64>(),
        ) {
            let nonce = Nonce::new(nonce);
            let hasher = BlockHasher::new(&prev, &txs);
            prop_assert_eq!(
                hasher.digest_nonce(nonce, &mut NonceBuf::default()),
                block_digest(&prev, &txs, &nonce.to_bytes())
            );
            prop_assert_eq!(
                block_digest(&prev, &txs, &nonce.to_bytes()),
                block_digest(&prev, &[txs.concat()], &nonce.to_bytes())
            );
        }
    }

    #[test]
    fn test_verify() {
        let prev = [0u8; 32];
        // Difficulty zero accepts any canonical nonce
        assert!(verify(Difficulty::new(0), &prev, &NO_TRANSACTIONS, b"0"));
        assert!(verify(Difficulty::new(0), &prev, &NO_TRANSACTIONS, b"12345"));
        // Non-canonical encodings never verify
        assert!(!verify(Difficulty::new(0), &prev, &NO_TRANSACTIONS, b"00"));
        assert!(!verify(Difficulty::new(0), &prev, &NO_TRANSACTIONS, b"\x00"));
        // Nothing satisfies a mask wider than the digest in practice
        assert!(!verify(Difficulty::new(300), &prev, &NO_TRANSACTIONS, b"0"));
    }
}
