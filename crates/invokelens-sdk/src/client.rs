//! Public facade: constructs the cache, transport, and rate tracker and
//! exposes the wrapper factories.

use crate::config::SdkConfig;
use crate::tool::ToolBuilder;
use crate::wrapper::ObserveBuilder;
use invokelens_cache::StatusPolicyCache;
use invokelens_core::span::TraceContext;
use invokelens_transport::Transport;

/// Entry point for an embedding application: one client per API key /
/// endpoint, shared across every wrapped invocation.
pub struct InvokeLensClient {
    config: SdkConfig,
    cache: StatusPolicyCache,
    transport: Transport,
}

impl InvokeLensClient {
    /// Build a client, spawning its background transport worker.
    #[must_use]
    pub fn new(config: SdkConfig) -> Self {
        let cache = StatusPolicyCache::with_ttl(config.endpoint_url.clone(), config.api_key.clone(), config.status_check_ttl_duration());
        let transport = Transport::spawn(config.to_transport_config());
        Self { config, cache, transport }
    }

    pub(crate) fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub(crate) fn cache(&self) -> &StatusPolicyCache {
        &self.cache
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Wrap a user invocation for `agent_id`: kill-switch check, policy
    /// evaluation, tracing, and telemetry emission.
    #[must_use]
    pub fn observe(&self, agent_id: impl Into<String>) -> ObserveBuilder<'_> {
        ObserveBuilder::new(self, agent_id)
    }

    /// Wrap a nested tool/function call in a span on an already-open trace
    /// (typically the one an [`ObserveBuilder::call_with_trace`] closure
    /// was handed).
    #[must_use]
    pub fn trace_tool<'t>(&self, trace: &'t TraceContext, name: impl Into<String>) -> ToolBuilder<'t> {
        ToolBuilder::new(trace, name)
    }

    /// Force an immediate refetch of `agent_id`'s status and policies on
    /// the next `observe` call.
    pub fn invalidate_cache(&self, agent_id: &str) {
        self.cache.invalidate(agent_id);
    }

    /// Clear every cached status/policy entry.
    pub fn clear_cache(&self) {
        self.cache.clear_cache();
    }

    /// Flush the transport and stop its background worker. Idempotent to
    /// call once; subsequent calls are no-ops since the worker handle is
    /// already taken.
    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }
}
