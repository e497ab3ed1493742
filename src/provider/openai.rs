use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::{PackResult, ServiceError};
use crate::types::*;

use super::traits::{GenerationRequest, Provider};
use super::{retry_after_ms, status_error};

/// OpenAI-compatible chat completions endpoint (non-streaming)
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: "https://api.openai.com".into(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn build_body(&self, request: &GenerationRequest, model: &ModelInfo) -> serde_json::Value {
        let mut api_messages = Vec::new();
        if !request.system.trim().is_empty() {
            api_messages.push(json!({"role": "system", "content": request.system.trim()}));
        }
        api_messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": model.id,
            "messages": api_messages,
        });

        if model.max_output_tokens > 0 {
            body["max_tokens"] = json!(model.max_output_tokens);
        }
        if let Some(temperature) = model.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    fn extract_text(data: &serde_json::Value) -> Option<String> {
        data.get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::to_string)
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        model: &ModelInfo,
        auth: &AuthProfile,
    ) -> PackResult<String> {
        let body = self.build_body(request, model);
        let base = auth.base_url.as_deref().unwrap_or(&self.base_url);
        let url = format!("{}/v1/chat/completions", base.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", auth.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = retry_after_ms(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("openai", status, retry_after, &body).into());
        }

        let data: serde_json::Value = response.json().await?;
        match Self::extract_text(&data) {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ServiceError::EmptyCompletion.into()),
        }
    }
}
