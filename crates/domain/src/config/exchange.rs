use serde::{Deserialize, Serialize};
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exchange
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Local exchange behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// What a fetch does when the block is not stored locally.
    #[serde(default)]
    pub mode: FetchMode,

    /// Timeout applied by the CLI to each fetch.  Library callers bound
    /// their calls with their own scope instead.
    #[serde(default = "d_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Buffer size of the announcement channel.  Waiters that fall further
    /// behind than this re-check the store instead of missing a block.
    #[serde(default = "d_announce_capacity")]
    pub announce_capacity: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::default(),
            fetch_timeout_ms: d_fetch_timeout_ms(),
            announce_capacity: d_announce_capacity(),
        }
    }
}

impl ExchangeConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// How a fetch treats blocks that are not (yet) available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Missing blocks fail with `NotFound` straight away.
    #[default]
    Offline,
    /// Missing blocks are awaited until announced via `has_block`, or
    /// until the caller's scope ends.
    Pending,
}

fn d_fetch_timeout_ms() -> u64 {
    10_000
}

fn d_announce_capacity() -> usize {
    1024
}
