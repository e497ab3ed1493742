use crate::error::PackResult;
use crate::types::*;

/// A single prompt sent to a generation service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Pipeline stage issuing the request
    pub stage: Stage,
    /// Instructions shared by every stage
    pub system: String,
    /// Stage-specific prompt
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(stage: Stage, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            stage,
            system: system.into(),
            prompt: prompt.into(),
        }
    }

    /// System and user prompt as one text block, for services without a
    /// separate system channel.
    pub fn combined_prompt(&self) -> String {
        let system = self.system.trim();
        if system.is_empty() {
            self.prompt.clone()
        } else {
            format!("{system}\n\n{}", self.prompt)
        }
    }
}

/// Stateless prompt-in, text-out completion service
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Get provider kind
    fn kind(&self) -> ProviderKind;

    /// Produce an unstructured text completion for one request
    async fn generate(
        &self,
        request: &GenerationRequest,
        model: &ModelInfo,
        auth: &AuthProfile,
    ) -> PackResult<String>;
}
