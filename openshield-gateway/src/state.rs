//! Shared application state

use crate::middleware::KeyedLimiter;
use openshield_core::audit::ApiKeyDirectory;
use openshield_core::Orchestrator;
use std::sync::Arc;

/// Cloned into every handler and middleware
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub api_keys: Arc<dyn ApiKeyDirectory>,
    /// Absent when rate limiting is disabled
    pub rate_limiter: Option<Arc<KeyedLimiter>>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, api_keys: Arc<dyn ApiKeyDirectory>) -> Self {
        Self {
            orchestrator,
            api_keys,
            rate_limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<KeyedLimiter>) -> Self {
        self.rate_limiter = limiter.map(Arc::new);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("orchestrator", &self.orchestrator)
            .field("rate_limited", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
