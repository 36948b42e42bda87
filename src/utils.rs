//! Utility functions and helpers
//!
//! Hex parsing for configuration and abbreviated hex for log output.

/// Strip an optional `0x`/`0X` prefix
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Convert hex string to bytes
///
/// Surrounding whitespace and a `0x` prefix are ignored. An empty string
/// decodes to no bytes.
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(strip_hex_prefix(s.trim()))
}

/// Short hex form for log lines: the first and last `edge` bytes
pub fn abbreviate_hex(bytes: &[u8], edge: usize) -> String {
    if bytes.len() <= edge * 2 {
        return hex::encode(bytes);
    }
    format!(
        "{}..{}",
        hex::encode(&bytes[..edge]),
        hex::encode(&bytes[bytes.len() - edge..])
    )
}
