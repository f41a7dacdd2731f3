use std::sync::Arc;

use bakehouse_engine::{BakeEngine, EngineConfig, MemoryStore};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BakeEngine>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            engine: Arc::new(BakeEngine::new(store, config)),
        }
    }
}
