use tracing::debug;

use crate::error::{PackError, PackResult};
use crate::provider::GenerationClient;
use crate::sanitize::parse_json;
use crate::types::{Stage, TieredQuiz, ValidationVerdict};

use super::pretty_json;

/// Judges whether a drafted quiz is good enough to keep.
pub struct QuizValidator {
    client: GenerationClient,
}

impl QuizValidator {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    /// An unreadable verdict is an error, never an implicit rejection.
    pub async fn validate(&self, quiz: &TieredQuiz) -> PackResult<ValidationVerdict> {
        let prompt = validation_prompt(&pretty_json(quiz)?);
        let raw = self.client.generate(Stage::Validation, prompt).await?;
        let verdict: ValidationVerdict =
            parse_json(&raw).map_err(|e| PackError::InvalidVerdict(e.to_string()))?;

        debug!(
            is_valid = verdict.is_valid,
            issues = verdict.issues.len(),
            "quiz judged"
        );
        Ok(verdict)
    }
}

fn validation_prompt(quiz_json: &str) -> String {
    format!(
        r#"You are an expert educational evaluator.

TASK:
Evaluate the quality and correctness of the quiz below.

VALIDATION CRITERIA:
1. Easy questions -> definitions / basics
2. Medium questions -> application / comparison
3. Hard questions -> reasoning / trade-offs
4. No duplicate questions
5. All questions must relate to the topic
6. Difficulty levels must be logically correct

OUTPUT FORMAT (STRICT JSON ONLY):
{{ "isValid": true, "issues": [] }}

OR

{{ "isValid": false, "issues": ["issue1", "issue2"] }}

QUIZ:
{quiz_json}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::testing;
    use crate::types::{QuestionKind, QuizQuestion};

    fn quiz() -> TieredQuiz {
        TieredQuiz {
            easy: vec![QuizQuestion {
                id: "E1".into(),
                question: "What is a cell?".into(),
                kind: QuestionKind::ShortAnswer,
                options: Vec::new(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn accepts_valid_verdict() {
        let verdict = QuizValidator::new(testing::fixed("```json\n{\"isValid\": true, \"issues\": []}\n```"))
            .validate(&quiz())
            .await
            .unwrap();
        assert_eq!(verdict, ValidationVerdict::accept());
    }

    #[tokio::test]
    async fn rejection_carries_issues() {
        let (client, seen) =
            testing::recording(r#"Here you go: {"isValid": false, "issues": ["E1 is too vague"]}"#);
        let verdict = QuizValidator::new(client).validate(&quiz()).await.unwrap();
        assert!(!verdict.is_valid);
        assert_eq!(verdict.issues, vec!["E1 is too vague".to_string()]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].stage, Stage::Validation);
        assert!(seen[0].prompt.contains("What is a cell?"));
    }

    #[tokio::test]
    async fn unreadable_verdict_is_an_error() {
        let err = QuizValidator::new(testing::fixed("Looks fine to me!"))
            .validate(&quiz())
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidVerdict(_)));

        let err = QuizValidator::new(testing::fixed(r#"{"issues": []}"#))
            .validate(&quiz())
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidVerdict(_)));
    }
}
