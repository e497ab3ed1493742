//! Closure-backed provider: plugs any async function in as a generation service.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PackResult;
use crate::types::{AuthProfile, ModelInfo, ProviderKind};

use super::traits::{GenerationRequest, Provider};

/// Function type for generation delegation.
pub type GenerateFn = Arc<
    dyn Fn(GenerationRequest) -> Pin<Box<dyn Future<Output = PackResult<String>> + Send>>
        + Send
        + Sync,
>;

/// Answers generation requests by calling a function.
pub struct FnProvider {
    kind: ProviderKind,
    generate_fn: GenerateFn,
}

impl FnProvider {
    pub fn new(generate_fn: GenerateFn) -> Self {
        Self {
            kind: ProviderKind::Custom("fn".into()),
            generate_fn,
        }
    }

    /// Wrap a plain async closure.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(GenerationRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PackResult<String>> + Send + 'static,
    {
        Self::new(Arc::new(move |req| Box::pin(f(req))))
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }
}

#[async_trait]
impl Provider for FnProvider {
    fn kind(&self) -> ProviderKind {
        self.kind.clone()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        _model: &ModelInfo,
        _auth: &AuthProfile,
    ) -> PackResult<String> {
        (self.generate_fn)(request.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PackError, ServiceError};
    use crate::types::Stage;

    fn model() -> ModelInfo {
        ModelInfo::gemini("test")
    }

    fn auth() -> AuthProfile {
        AuthProfile::new(ProviderKind::Gemini, "k")
    }

    #[tokio::test]
    async fn forwards_request_to_function() {
        let provider = FnProvider::from_fn(|req: GenerationRequest| async move {
            Ok(format!("{}:{}", req.stage, req.prompt))
        });
        let request = GenerationRequest::new(Stage::Hierarchy, "", "build it");
        let out = provider.generate(&request, &model(), &auth()).await.unwrap();
        assert_eq!(out, "hierarchy:build it");
    }

    #[tokio::test]
    async fn propagates_errors() {
        let provider = FnProvider::from_fn(|_req: GenerationRequest| async move {
            Err::<String, PackError>(ServiceError::Provider("down".into()).into())
        });
        let request = GenerationRequest::new(Stage::Quiz, "", "q");
        let err = provider.generate(&request, &model(), &auth()).await.unwrap_err();
        assert!(matches!(err, PackError::ExternalService(ServiceError::Provider(_))));
    }

    #[test]
    fn kind_defaults_to_custom_and_overrides() {
        let provider = FnProvider::from_fn(|_req: GenerationRequest| async move { Ok::<String, PackError>(String::new()) });
        assert_eq!(provider.kind(), ProviderKind::Custom("fn".into()));
        let provider = provider.with_kind(ProviderKind::Gemini);
        assert_eq!(provider.kind(), ProviderKind::Gemini);
    }

    #[test]
    fn is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FnProvider>();
    }
}
