use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::{AdapterError, ChainAdapter};

/// Chain id -> adapter lookup
#[derive(Clone, Default)]
pub struct ChainAdapterRegistry {
    adapters: HashMap<String, Arc<dyn ChainAdapter>>,
}

impl ChainAdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own chain id, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn ChainAdapter>) {
        let chain_id = adapter.chain_id().to_string();
        if self.adapters.insert(chain_id.clone(), adapter).is_some() {
            warn!(chain_id = %chain_id, "replaced chain adapter");
        } else {
            info!(chain_id = %chain_id, "registered chain adapter");
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, chain_id: &str) -> Result<Arc<dyn ChainAdapter>, AdapterError> {
        self.adapters
            .get(chain_id)
            .cloned()
            .ok_or_else(|| AdapterError::UnsupportedChain(chain_id.to_string()))
    }

    pub fn supports(&self, chain_id: &str) -> bool {
        self.adapters.contains_key(chain_id)
    }

    pub fn chain_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn health_check(&self) -> HashMap<String, bool> {
        let mut health = HashMap::new();
        for (chain_id, adapter) in &self.adapters {
            health.insert(chain_id.clone(), adapter.is_healthy().await);
        }
        health
    }
}
