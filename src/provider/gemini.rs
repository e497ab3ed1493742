use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::{PackResult, ServiceError};
use crate::types::*;

use super::traits::{GenerationRequest, Provider};
use super::{retry_after_ms, status_error};

pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: "https://generativelanguage.googleapis.com".into(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, model: &ModelInfo, auth: &AuthProfile) -> String {
        let base = auth.base_url.as_deref().unwrap_or(&self.base_url);
        format!(
            "{}/v1beta/models/{}:generateContent",
            base.trim_end_matches('/'),
            model.id
        )
    }

    fn build_body(&self, request: &GenerationRequest, model: &ModelInfo) -> serde_json::Value {
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": request.combined_prompt()}],
            }],
        });

        let mut generation_config = serde_json::Map::new();
        if model.max_output_tokens > 0 {
            generation_config.insert("maxOutputTokens".into(), json!(model.max_output_tokens));
        }
        if let Some(temperature) = model.temperature {
            generation_config.insert("temperature".into(), json!(temperature));
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = serde_json::Value::Object(generation_config);
        }

        body
    }

    /// Concatenate the text parts of the first candidate.
    fn extract_text(data: &serde_json::Value) -> Option<String> {
        let parts = data
            .get("candidates")?
            .get(0)?
            .get("content")?
            .get("parts")?
            .as_array()?;

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect();

        Some(text)
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
        model: &ModelInfo,
        auth: &AuthProfile,
    ) -> PackResult<String> {
        let body = self.build_body(request, model);
        let url = self.endpoint(model, auth);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &auth.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = retry_after_ms(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("gemini", status, retry_after, &body).into());
        }

        let data: serde_json::Value = response.json().await?;

        if let Some(reason) = data
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(|r| r.as_str())
        {
            return Err(ServiceError::Provider(format!("Gemini blocked the prompt: {reason}")).into());
        }

        match Self::extract_text(&data) {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(ServiceError::EmptyCompletion.into()),
        }
    }
}
