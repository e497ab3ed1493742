use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PackError, PackResult};
use crate::provider::DEFAULT_SYSTEM_PROMPT;
use crate::segment::SegmentConfig;
use crate::types::{AuthProfile, ModelInfo, ProviderKind};

/// Placeholder values shipped in sample env files.
const PLACEHOLDER_KEYS: &[&str] = &["your_api_key_here", "your_actual_api_key_here"];

/// Keys shorter than this are probably truncated.
const MIN_PLAUSIBLE_KEY_LEN: usize = 20;

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_model")]
    pub model: ModelInfo,
    #[serde(default)]
    pub segment: SegmentConfig,
    #[serde(default = "default_max_quiz_attempts")]
    pub max_quiz_attempts: usize,
    /// Windows sent to the extractor at once; 1 keeps it sequential
    #[serde(default = "default_extraction_concurrency")]
    pub extraction_concurrency: usize,
    /// Per-call deadline; `None` or 0 disables it
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: Option<u64>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_model() -> ModelInfo {
    ModelInfo::gemini("gemini-1.5-flash")
}

fn default_max_quiz_attempts() -> usize {
    3
}

fn default_extraction_concurrency() -> usize {
    1
}

fn default_stage_timeout_secs() -> Option<u64> {
    Some(60)
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            segment: SegmentConfig::default(),
            max_quiz_attempts: default_max_quiz_attempts(),
            extraction_concurrency: default_extraction_concurrency(),
            stage_timeout_secs: default_stage_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl PipelineConfig {
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn from_json(json: &str) -> PackResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> PackResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from defaults plus whatever `lookup` returns for the known
    /// variable names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PackResult<Self> {
        let mut config = Self::default();

        let provider = match non_empty(&lookup, "LEARNPACK_PROVIDER") {
            Some(name) => parse_provider(&name),
            None => ProviderKind::Gemini,
        };
        let model_id = non_empty(&lookup, "LEARNPACK_MODEL")
            .or_else(|| {
                (provider == ProviderKind::Gemini)
                    .then(|| non_empty(&lookup, "GEMINI_MODEL"))
                    .flatten()
            })
            .unwrap_or_else(|| default_model_id(&provider).to_string());
        config.model = ModelInfo::new(provider, model_id);

        if let Some(v) = parse_var(&lookup, "LEARNPACK_MAX_WINDOW_CHARS")? {
            config.segment.max_window_chars = v;
        }
        if let Some(v) = parse_var(&lookup, "LEARNPACK_OVERLAP_SENTENCES")? {
            config.segment.overlap_sentences = v;
        }
        if let Some(v) = parse_var(&lookup, "LEARNPACK_MAX_QUIZ_ATTEMPTS")? {
            config.max_quiz_attempts = v;
        }
        if let Some(v) = parse_var(&lookup, "LEARNPACK_EXTRACTION_CONCURRENCY")? {
            config.extraction_concurrency = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, "LEARNPACK_STAGE_TIMEOUT_SECS")? {
            config.stage_timeout_secs = (v > 0).then_some(v);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PackResult<()> {
        if self.model.id.trim().is_empty() {
            return Err(PackError::Config("model id is empty".into()));
        }
        if self.segment.max_window_chars == 0 {
            return Err(PackError::Config("max_window_chars must be positive".into()));
        }
        if self.max_quiz_attempts == 0 {
            return Err(PackError::Config("max_quiz_attempts must be at least 1".into()));
        }
        if self.extraction_concurrency == 0 {
            return Err(PackError::Config(
                "extraction_concurrency must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl AuthProfile {
    /// Read the API key for `provider` from the process environment.
    pub fn from_env(provider: ProviderKind) -> PackResult<Self> {
        Self::from_lookup(provider, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        provider: ProviderKind,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> PackResult<Self> {
        let var = api_key_var(&provider);
        let key = non_empty(&lookup, var)
            .ok_or_else(|| PackError::Config(format!("{var} is not configured")))?;

        if PLACEHOLDER_KEYS.contains(&key.as_str()) {
            return Err(PackError::Config(format!(
                "{var} is set to a placeholder value"
            )));
        }
        if key.len() < MIN_PLAUSIBLE_KEY_LEN {
            warn!(var, "API key looks too short, check that it is complete");
        }

        let mut profile = AuthProfile::new(provider, key);
        profile.base_url = non_empty(&lookup, "LEARNPACK_BASE_URL");
        Ok(profile)
    }
}

fn api_key_var(provider: &ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Gemini => "GEMINI_API_KEY",
        ProviderKind::OpenAI => "OPENAI_API_KEY",
        ProviderKind::Custom(_) => "LEARNPACK_API_KEY",
    }
}

fn default_model_id(provider: &ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAI => "gpt-4o-mini",
        _ => "gemini-1.5-flash",
    }
}

fn parse_provider(name: &str) -> ProviderKind {
    match name.to_ascii_lowercase().as_str() {
        "gemini" => ProviderKind::Gemini,
        "openai" => ProviderKind::OpenAI,
        other => ProviderKind::Custom(other.to_string()),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> PackResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    non_empty(lookup, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| PackError::Config(format!("{key}={raw}: {e}")))
        })
        .transpose()
}
