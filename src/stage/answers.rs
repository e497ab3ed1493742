use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PackError, PackResult};
use crate::provider::GenerationClient;
use crate::sanitize::parse_json;
use crate::types::{Answer, AnswerSheet, Stage, TieredQuiz};

use super::pretty_json;

/// Produces an answer and a short explanation for each accepted question.
pub struct AnswerGenerator {
    client: GenerationClient,
}

/// Either `{"answers": [...]}` or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAnswers {
    Sheet { answers: Vec<Answer> },
    List(Vec<Answer>),
}

impl AnswerGenerator {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    /// Answers are keyed by question id; ids not in `quiz` are dropped and
    /// the first answer wins for repeated ids.
    pub async fn answer(&self, quiz: &TieredQuiz) -> PackResult<AnswerSheet> {
        let prompt = answer_prompt(&pretty_json(quiz)?);
        let raw = self.client.generate(Stage::Answers, prompt).await?;
        let parsed: RawAnswers =
            parse_json(&raw).map_err(|e| PackError::InvalidAnswer(e.to_string()))?;
        let answers = match parsed {
            RawAnswers::Sheet { answers } | RawAnswers::List(answers) => answers,
        };

        let sheet = reconcile(quiz, answers);
        debug!(
            questions = quiz.len(),
            answered = sheet.answers.len(),
            "answers generated"
        );
        Ok(sheet)
    }
}

fn reconcile(quiz: &TieredQuiz, answers: Vec<Answer>) -> AnswerSheet {
    let known = quiz.ids();
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(answers.len());

    for mut answer in answers {
        answer.id = answer.id.trim().to_string();
        if !known.contains(answer.id.as_str()) {
            warn!(id = %answer.id, "dropping answer for unknown question");
            continue;
        }
        if !seen.insert(answer.id.clone()) {
            warn!(id = %answer.id, "dropping repeated answer");
            continue;
        }
        kept.push(answer);
    }

    AnswerSheet { answers: kept }
}

fn answer_prompt(quiz_json: &str) -> String {
    format!(
        r#"You are an expert educator.

TASK:
Generate correct answers for the following quiz questions.

RULES:
- Do NOT modify the questions
- Do NOT change question IDs
- Answers must be accurate and concise
- Provide a short explanation for each answer
- Return ONLY valid JSON
- No markdown
- No extra text

OUTPUT FORMAT:
{{
  "answers": [
    {{ "id": "E1", "answer": "", "explanation": "" }}
  ]
}}

QUIZ:
{quiz_json}"#
    )
}
