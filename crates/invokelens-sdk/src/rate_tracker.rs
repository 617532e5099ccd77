//! Per-agent sliding-window invocation counter.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

/// Process-wide, mutex-protected map of agent id to recorded invocation
/// timestamps. Pruning happens opportunistically on read; agents that stop
/// being evaluated are not reaped, matching the upstream behavior this was
/// translated from.
pub struct RateTracker {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateTracker {
    fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// The process-wide singleton used by the invocation wrapper.
    pub fn global() -> &'static RateTracker {
        static TRACKER: OnceLock<RateTracker> = OnceLock::new();
        TRACKER.get_or_init(RateTracker::new)
    }

    /// Record one invocation for `agent_id` at the current instant. A
    /// poisoned lock is treated as an empty tracker for this call rather
    /// than propagated: missing one rate-limit record is preferable to
    /// panicking on a guardrail-adjacent path.
    pub fn record(&self, agent_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.entry(agent_id.to_string()).or_default().push(Instant::now());
        }
    }

    /// Prune entries older than `window_seconds` and return the remaining
    /// count. Returns `0` if the lock is poisoned, matching fail-open
    /// evaluation elsewhere in the wrapper.
    pub fn count_in_window(&self, agent_id: &str, window_seconds: u64) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let list = entries.entry(agent_id.to_string()).or_default();
        let cutoff = Instant::now().checked_sub(Duration::from_secs(window_seconds));
        if let Some(cutoff) = cutoff {
            list.retain(|t| *t > cutoff);
        }
        list.len()
    }

    /// Clear all recorded state. Test-only: production code never resets
    /// the singleton.
    #[cfg(test)]
    pub fn reset(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
