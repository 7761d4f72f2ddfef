//! Immutable per-configuration state and its atomic swap point
//!
//! Requests capture one `Arc<Snapshot>` at dispatch and keep it to the end, so a
//! reload never tears a request in half.

use crate::cache::{ContextCache, KvStore, ResponseCache};
use crate::config::{GatewayConfig, RuleConfig};
use crate::http::HttpClient;
use crate::providers::{ProviderRegistry, ProviderResult};
use crate::rules::{HttpRuleExecutor, RulePipeline};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Everything a request needs that is derived from configuration
pub struct Snapshot {
    pub providers: ProviderRegistry,
    /// Input rules in declaration order
    pub rules: Vec<RuleConfig>,
    pub pipeline: RulePipeline,
    pub response_cache: ResponseCache,
    pub context_cache: ContextCache,
    pub audit_logging: bool,
    pub usage_logging: bool,
}

impl Snapshot {
    /// Build from a validated configuration over the long-lived KV backend
    pub fn build(config: &GatewayConfig, kv: Arc<dyn KvStore>) -> ProviderResult<Self> {
        let settings = &config.settings;
        let http = HttpClient::from_config(&settings.connection)?;
        let executor = HttpRuleExecutor::new(http.inner().clone(), &settings.rule_server);

        Ok(Self {
            providers: ProviderRegistry::from_config(&config.providers, &http),
            rules: config.rules.input.clone(),
            pipeline: RulePipeline::new(Arc::new(executor)),
            response_cache: ResponseCache::new(&settings.cache, Arc::clone(&kv)),
            context_cache: ContextCache::new(
                &settings.context_cache,
                &settings.cache.prefix,
                kv,
                http.inner().clone(),
            ),
            audit_logging: settings.audit_logging.enabled,
            usage_logging: settings.usage_logging.enabled,
        })
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("providers", &self.providers)
            .field("rules", &self.rules.len())
            .field("response_cache", &self.response_cache.is_enabled())
            .field("context_cache", &self.context_cache.is_enabled())
            .finish()
    }
}

/// Shared handle to the live snapshot
#[derive(Clone)]
pub struct SnapshotHandle {
    tx: Arc<watch::Sender<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: Snapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(snapshot));
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot for a new request; never blocks on writers
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.tx.borrow())
    }

    /// Replace the live snapshot; in-flight requests keep the old one
    pub fn install(&self, snapshot: Snapshot) {
        info!(
            providers = snapshot.providers.len(),
            rules = snapshot.rules.len(),
            "Installing configuration snapshot"
        );
        self.tx.send_replace(Arc::new(snapshot));
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }
}

impl std::fmt::Debug for SnapshotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotHandle")
            .field("current", &*self.tx.borrow())
            .finish()
    }
}
