use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PackError, PackResult};
use crate::types::ProviderKind;

use super::traits::Provider;
use super::{GeminiProvider, OpenAIProvider};

/// Registry of available providers
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry with the built-in HTTP providers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GeminiProvider::new()));
        registry.register(Arc::new(OpenAIProvider::new()));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, kind: &ProviderKind) -> Option<Arc<dyn Provider>> {
        self.providers.get(kind).cloned()
    }

    /// Like [`get`](Self::get), but a missing provider is a config error
    pub fn require(&self, kind: &ProviderKind) -> PackResult<Arc<dyn Provider>> {
        self.get(kind)
            .ok_or_else(|| PackError::Config(format!("no provider registered for '{kind}'")))
    }

    pub fn has(&self, kind: &ProviderKind) -> bool {
        self.providers.contains_key(kind)
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.providers.keys().cloned().collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FnProvider, GenerationRequest};

    #[test]
    fn registry_defaults() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.has(&ProviderKind::Gemini));
        assert!(registry.has(&ProviderKind::OpenAI));
        assert!(!registry.has(&ProviderKind::Custom("local".into())));

        let provider = registry.get(&ProviderKind::Gemini).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Gemini);
    }

    #[test]
    fn registry_custom_provider() {
        let mut registry = ProviderRegistry::new();
        let kind = ProviderKind::Custom("local".into());
        registry.register(Arc::new(
            FnProvider::from_fn(|_req: GenerationRequest| async move { Ok::<String, PackError>("[]".to_string()) })
                .with_kind(kind.clone()),
        ));

        assert!(registry.require(&kind).is_ok());
        assert_eq!(registry.providers(), vec![kind]);
    }

    #[test]
    fn registry_missing_is_config_error() {
        let registry = ProviderRegistry::new();
        assert!(registry.get(&ProviderKind::Gemini).is_none());
        assert!(matches!(
            registry.require(&ProviderKind::Gemini),
            Err(PackError::Config(_))
        ));
        assert!(registry.providers().is_empty());
    }
}
