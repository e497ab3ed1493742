use thiserror::Error;

use crate::types::Stage;

/// Failures reported by a generation service backend.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider rate limited: {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned an empty completion")]
    EmptyCompletion,
}

#[derive(Error, Debug)]
pub enum PackError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No concepts extracted: {failed} of {windows} windows failed")]
    NoConceptsExtracted { windows: usize, failed: usize },

    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("Invalid quiz: {0}")]
    InvalidQuiz(String),

    #[error("Invalid validation verdict: {0}")]
    InvalidVerdict(String),

    #[error("Invalid answers: {0}")]
    InvalidAnswer(String),

    #[error("Missing context: {0}")]
    MissingContext(String),

    #[error("Invalid explanation: {0}")]
    InvalidExplanation(String),

    #[error("External service error: {0}")]
    ExternalService(#[from] ServiceError),

    #[error("Stage timed out: stage={stage}, after {timeout_ms}ms")]
    StageTimeout { stage: Stage, timeout_ms: u64 },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PackError {
    fn from(err: reqwest::Error) -> Self {
        PackError::ExternalService(ServiceError::Http(err))
    }
}

impl PackError {
    /// True when the caller supplied bad input (maps to a 4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, PackError::InvalidInput(_))
    }

    /// HTTP status a boundary should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            PackError::InvalidInput(_) => 400,
            PackError::Config(_) | PackError::MissingContext(_) => 500,
            PackError::StageTimeout { .. } => 504,
            PackError::ExternalService(ServiceError::RateLimited { .. }) => 503,
            _ => 502,
        }
    }
}

pub type PackResult<T> = Result<T, PackError>;
