//! Framework-agnostic request handling for a "generate learning package"
//! endpoint. A web layer deserializes the body into [`GenerateRequest`],
//! calls [`handle_generate`], and writes back `status` and `body`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::PackError;
use crate::pipeline::LearningPipeline;
use crate::types::{Answer, ConceptCard, Explanation, HierarchyNode, LearningPackage, QuizItem};

pub const SUCCESS_MESSAGE: &str = "Learning package generated successfully";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub message: String,
    pub hierarchy: HierarchyNode,
    pub concepts: Vec<ConceptCard>,
    pub quiz: Vec<QuizItem>,
    pub answers: Vec<Answer>,
    pub explanation: Explanation,
}

impl From<LearningPackage> for GenerateResponse {
    fn from(package: LearningPackage) -> Self {
        Self {
            message: SUCCESS_MESSAGE.to_string(),
            hierarchy: package.hierarchy,
            concepts: package.concepts,
            quiz: package.quiz,
            answers: package.answers,
            explanation: package.explanation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryResponse {
    pub status: u16,
    pub body: Value,
}

impl BoundaryResponse {
    fn error(status: u16, message: impl Into<String>) -> Self {
        let body = ErrorBody {
            error: message.into(),
        };
        Self {
            status,
            body: serde_json::to_value(&body).unwrap_or_else(|_| Value::Null),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<PackError> for BoundaryResponse {
    fn from(err: PackError) -> Self {
        Self::error(err.status_code(), err.to_string())
    }
}

pub async fn handle_generate(pipeline: &LearningPipeline, request: GenerateRequest) -> BoundaryResponse {
    let Some(text) = request.text.filter(|t| !t.trim().is_empty()) else {
        return BoundaryResponse::error(400, "Text is required");
    };

    match pipeline.run(&text).await {
        Ok(package) => match serde_json::to_value(GenerateResponse::from(package)) {
            Ok(body) => BoundaryResponse { status: 200, body },
            Err(e) => PackError::from(e).into(),
        },
        Err(e) => {
            warn!(status = e.status_code(), error = %e, "generate request failed");
            e.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_text_is_optional() {
        let req: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert!(req.text.is_none());
        let req: GenerateRequest = serde_json::from_str(r#"{"text": "Cells divide."}"#).unwrap();
        assert_eq!(req.text.as_deref(), Some("Cells divide."));
    }

    #[test]
    fn errors_map_to_status_and_body() {
        let resp = BoundaryResponse::from(PackError::InvalidQuiz("duplicate question id E1".into()));
        assert_eq!(resp.status, 502);
        assert!(!resp.is_success());
        assert_eq!(resp.body["error"], "Invalid quiz: duplicate question id E1");

        let resp = BoundaryResponse::from(PackError::Config("GEMINI_API_KEY is not configured".into()));
        assert_eq!(resp.status, 500);
    }
}
