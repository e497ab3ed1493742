use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{PackError, PackResult};
use crate::types::{AuthProfile, ModelInfo, Stage};

use super::traits::{GenerationRequest, Provider};

/// Instructions prepended to every stage prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert educational assistant.
Follow instructions strictly.
Return ONLY the output requested.
Do NOT add explanations unless explicitly asked.
If JSON is requested, return valid JSON only.";

/// Everything a stage needs to talk to the generation service.
///
/// Built once per pipeline and cloned into each stage; cloning shares the
/// provider.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn Provider>,
    model: ModelInfo,
    auth: AuthProfile,
    system_prompt: String,
    timeout: Option<Duration>,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn Provider>, model: ModelInfo, auth: AuthProfile) -> Self {
        Self {
            provider,
            model,
            auth,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            timeout: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Deadline applied to each individual generation call
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &ModelInfo {
        &self.model
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Send one prompt on behalf of `stage`.
    pub async fn generate(&self, stage: Stage, prompt: impl Into<String>) -> PackResult<String> {
        let request = GenerationRequest::new(stage, self.system_prompt.clone(), prompt);
        debug!(
            stage = %stage,
            model = %self.model.id,
            prompt_chars = request.prompt.len(),
            "generation request"
        );

        let call = self.provider.generate(&request, &self.model, &self.auth);
        let text = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| PackError::StageTimeout {
                    stage,
                    timeout_ms: timeout_ms(limit),
                })??,
            None => call.await?,
        };

        debug!(stage = %stage, response_chars = text.len(), "generation response");
        Ok(text)
    }
}

fn timeout_ms(limit: Duration) -> u64 {
    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FnProvider;
    use crate::types::ProviderKind;

    fn client(provider: FnProvider) -> GenerationClient {
        GenerationClient::new(
            Arc::new(provider),
            ModelInfo::gemini("test-model"),
            AuthProfile::new(ProviderKind::Gemini, "k"),
        )
    }

    #[tokio::test]
    async fn sends_stage_and_system_prompt() {
        let provider = FnProvider::from_fn(|req: GenerationRequest| async move {
            Ok::<String, PackError>(format!("{}|{}|{}", req.stage, req.system, req.prompt))
        });
        let out = client(provider)
            .with_system_prompt("sys")
            .generate(Stage::Answers, "hello")
            .await
            .unwrap();
        assert_eq!(out, "answers|sys|hello");
    }

    #[tokio::test]
    async fn default_system_prompt_is_applied() {
        let provider = FnProvider::from_fn(|req: GenerationRequest| async move {
            Ok::<String, PackError>(req.system)
        });
        let out = client(provider).generate(Stage::Quiz, "x").await.unwrap();
        assert_eq!(out, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let provider = FnProvider::from_fn(|_req: GenerationRequest| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<String, PackError>("late".into())
        });
        let err = client(provider)
            .with_timeout(Some(Duration::from_millis(20)))
            .generate(Stage::Hierarchy, "x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PackError::StageTimeout {
                stage: Stage::Hierarchy,
                timeout_ms: 20
            }
        ));
    }

    #[tokio::test]
    async fn fast_call_within_timeout() {
        let provider = FnProvider::from_fn(|_req: GenerationRequest| async move {
            Ok::<String, PackError>("quick".into())
        });
        let out = client(provider)
            .with_timeout(Some(Duration::from_secs(5)))
            .generate(Stage::Hierarchy, "x")
            .await
            .unwrap();
        assert_eq!(out, "quick");
    }

    #[test]
    fn timeout_millis_saturate() {
        assert_eq!(timeout_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(timeout_ms(Duration::MAX), u64::MAX);
    }

    #[test]
    fn client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GenerationClient>();
    }
}
