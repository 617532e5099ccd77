//! TTL-bounded, fail-open cache of per-agent kill-switch status and
//! guardrail policies, backed by one HTTP GET per cache miss.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use invokelens_core::policy::PolicyRecord;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const STATUS_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum FetchError {
    #[error("status request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("non-2xx status response: {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    blocked_reason: Option<String>,
    #[serde(default)]
    policies: Vec<PolicyRecord>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    blocked: bool,
    blocked_reason: Option<String>,
    policies: Vec<PolicyRecord>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// The result of a [`StatusPolicyCache::lookup`]: whether the agent is
/// currently blocked, the backend-supplied reason, and the agent's
/// guardrail policies.
#[derive(Debug, Clone, Default)]
pub struct AgentStatus {
    pub blocked: bool,
    pub blocked_reason: Option<String>,
    pub policies: Vec<PolicyRecord>,
}

/// A thread-safe, TTL-bounded cache of per-agent status and policies.
///
/// Reads never block on the network when the entry is fresh. A miss or
/// expiry triggers one synchronous-from-the-caller's-perspective HTTP GET;
/// network or parse failures leave the cache untouched so the next call
/// retries, while a non-2xx response is cached as `ACTIVE` for the TTL to
/// avoid hammering a backend that is deliberately failing closed-soft.
pub struct StatusPolicyCache {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl StatusPolicyCache {
    /// Create a cache pointed at `endpoint` (e.g. `https://api.invokelens.com`).
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_ttl(endpoint, api_key, DEFAULT_TTL)
    }

    /// Create a cache with a non-default TTL (`status_check_ttl`).
    #[must_use]
    pub fn with_ttl(endpoint: impl Into<String>, api_key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up an agent's block status and policies, fetching from the
    /// backend on a cache miss or expiry. Never returns an error: any
    /// network or parse failure yields an unblocked, policy-free result
    /// without mutating the cache.
    pub async fn lookup(&self, agent_id: &str) -> AgentStatus {
        if let Some(entry) = self.fresh_entry(agent_id) {
            return AgentStatus {
                blocked: entry.blocked,
                blocked_reason: entry.blocked_reason,
                policies: entry.policies,
            };
        }

        match self.fetch_status(agent_id).await {
            Ok(entry) => {
                let status = AgentStatus {
                    blocked: entry.blocked,
                    blocked_reason: entry.blocked_reason.clone(),
                    policies: entry.policies.clone(),
                };
                self.insert(agent_id, entry);
                status
            }
            Err(FetchError::Status(code)) => {
                warn!(agent_id, %code, "status endpoint returned non-2xx, caching ACTIVE");
                let entry = CacheEntry {
                    blocked: false,
                    blocked_reason: None,
                    policies: Vec::new(),
                    expires_at: Instant::now() + self.ttl,
                };
                self.insert(agent_id, entry);
                AgentStatus::default()
            }
            Err(err) => {
                debug!(agent_id, error = %err, "status lookup failed, not caching");
                AgentStatus::default()
            }
        }
    }

    /// Remove a single agent's cached entry, forcing a refetch on the next lookup.
    pub fn invalidate(&self, agent_id: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(agent_id);
        }
    }

    /// Remove every cached entry.
    pub fn clear_cache(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    fn fresh_entry(&self, agent_id: &str) -> Option<CacheEntry> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(agent_id)?;
        entry.is_fresh().then(|| entry.clone())
    }

    fn insert(&self, agent_id: &str, entry: CacheEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(agent_id.to_string(), entry);
        }
    }

    async fn fetch_status(&self, agent_id: &str) -> Result<CacheEntry, FetchError> {
        let url = format!("{}/agents/{}/status", self.endpoint, agent_id);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let body: StatusResponse = response.json().await?;
        Ok(CacheEntry {
            blocked: body.status == "BLOCKED",
            blocked_reason: body.blocked_reason,
            policies: body.policies,
            expires_at: Instant::now() + self.ttl,
        })
    }
}
