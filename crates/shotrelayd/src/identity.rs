//! Short hashed identifiers for agents and capture requests.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Hex characters in an agent id.
pub const AGENT_ID_LEN: usize = 12;

/// Hex characters in a request token.
pub const REQUEST_TOKEN_LEN: usize = 8;

/// Derives an agent id from the peer address and admission time.
///
/// `attempt` salts the digest so a caller can draw a fresh id when the first
/// candidate is already taken.
#[must_use]
pub fn agent_id(peer: &str, at: OffsetDateTime, attempt: u32) -> String {
    let seed = if attempt == 0 {
        format!("{peer}:{}", unix_millis(at))
    } else {
        format!("{peer}:{}:{attempt}", unix_millis(at))
    };
    short_digest(&seed, AGENT_ID_LEN)
}

/// Issues request tokens from the current time and a per-source counter.
#[derive(Debug, Default)]
pub struct TokenSource {
    nonce: AtomicU64,
}

impl TokenSource {
    /// Creates a token source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws a token for a request raised by `requester` at `at`.
    pub fn next(&self, at: OffsetDateTime, requester: &str) -> String {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        short_digest(&format!("{}:{requester}:{nonce}", unix_millis(at)), REQUEST_TOKEN_LEN)
    }
}

fn unix_millis(at: OffsetDateTime) -> i128 {
    at.unix_timestamp_nanos() / 1_000_000
}

fn short_digest(seed: &str, len: usize) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let mut hex = String::with_capacity(len);
    for byte in digest.iter().take(len.div_ceil(2)) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex.truncate(len);
    hex
}
