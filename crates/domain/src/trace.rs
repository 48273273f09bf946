use serde::Serialize;

/// Structured trace events emitted across all exchange crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
    },
    SessionEnded {
        session_id: String,
        blocks_fetched: u64,
        blocks_missed: u64,
        reason: String,
    },
    BlockAnnounced {
        cid: String,
        size: usize,
    },
    BlockFetched {
        cid: String,
        session_id: Option<String>,
        waited_ms: u64,
    },
    BlockMissing {
        cid: String,
        session_id: Option<String>,
    },
    ExchangeClosed {
        sessions_released: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "bx_event");
    }
}
