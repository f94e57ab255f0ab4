use crate::engine_trait::RecognitionEngine;
use speechlink_core::EngineError;
use std::collections::HashMap;
use std::sync::Arc;

pub struct EngineRegistry {
    factories: HashMap<String, fn() -> Arc<dyn RecognitionEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("null", || Arc::new(crate::null_engine::NullEngine::new()));
        #[cfg(feature = "azure")]
        registry.register("azure", || Arc::new(crate::azure_engine::AzureEngine::new()));
        registry
    }

    pub fn register(&mut self, name: &str, factory: fn() -> Arc<dyn RecognitionEngine>) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn create(&self, name: &str) -> Result<Arc<dyn RecognitionEngine>, EngineError> {
        self.factories
            .get(name)
            .map(|f| f())
            .ok_or_else(|| EngineError::NotFound(name.to_string()))
    }

    pub fn list_engines(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
