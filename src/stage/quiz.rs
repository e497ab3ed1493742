use std::collections::HashSet;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PackError, PackResult};
use crate::provider::GenerationClient;
use crate::sanitize::parse_json;
use crate::types::{HierarchyNode, QuestionKind, QuizQuestion, Stage, Tier, TieredQuiz};

use super::pretty_json;

/// Drafts a tiered quiz from the concept hierarchy.
///
/// Stateless: every call is a fresh draft, which is what lets the quiz loop
/// simply ask again after a rejection.
pub struct QuizSynthesizer {
    client: GenerationClient,
}

impl QuizSynthesizer {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    pub async fn synthesize(&self, hierarchy: &HierarchyNode) -> PackResult<TieredQuiz> {
        let prompt = quiz_prompt(&pretty_json(hierarchy)?);
        let raw = self.client.generate(Stage::Quiz, prompt).await?;
        let quiz = parse_quiz(&raw)?;

        debug!(
            easy = quiz.easy.len(),
            medium = quiz.medium.len(),
            hard = quiz.hard.len(),
            "quiz drafted"
        );
        Ok(quiz)
    }
}

/// A reply decodes as a quiz only if it names at least one tier, so a
/// wrapper object falls through to the quiz nested inside it.
#[derive(Debug, Deserialize)]
#[serde(try_from = "QuizFields")]
struct RawQuiz {
    easy: Vec<RawQuestion>,
    medium: Vec<RawQuestion>,
    hard: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct QuizFields {
    #[serde(default)]
    easy: Option<Vec<RawQuestion>>,
    #[serde(default)]
    medium: Option<Vec<RawQuestion>>,
    #[serde(default)]
    hard: Option<Vec<RawQuestion>>,
}

impl TryFrom<QuizFields> for RawQuiz {
    type Error = String;

    fn try_from(fields: QuizFields) -> Result<Self, Self::Error> {
        if fields.easy.is_none() && fields.medium.is_none() && fields.hard.is_none() {
            return Err("quiz reply has no easy, medium or hard tier".into());
        }
        Ok(Self {
            easy: fields.easy.unwrap_or_default(),
            medium: fields.medium.unwrap_or_default(),
            hard: fields.hard.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    question: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    options: Vec<String>,
}

fn quiz_prompt(hierarchy_json: &str) -> String {
    format!(
        r#"You are an expert educational assessment designer.

TASK:
Generate quiz questions based on the following concept hierarchy.

RULES:
- Return ONLY valid JSON
- NO explanations
- NO answers
- NO markdown
- Questions must be conceptually correct
- Difficulty must be logically assigned

OUTPUT FORMAT:
{{
  "easy": [
    {{ "id": "E1", "question": "", "type": "mcq", "options": [] }}
  ],
  "medium": [
    {{ "id": "M1", "question": "", "type": "short" }}
  ],
  "hard": [
    {{ "id": "H1", "question": "", "type": "short" }}
  ]
}}

DIFFICULTY LOGIC:
- Easy   -> definitions, basic understanding
- Medium -> comparisons, applications
- Hard   -> reasoning, trade-offs, deeper insights

CONCEPT HIERARCHY:
{hierarchy_json}"#
    )
}

fn parse_quiz(raw: &str) -> PackResult<TieredQuiz> {
    let draft: RawQuiz = parse_json(raw).map_err(|e| PackError::InvalidQuiz(e.to_string()))?;

    let quiz = TieredQuiz {
        easy: normalize_tier(Tier::Easy, draft.easy),
        medium: normalize_tier(Tier::Medium, draft.medium),
        hard: normalize_tier(Tier::Hard, draft.hard),
    };

    if quiz.is_empty() {
        return Err(PackError::InvalidQuiz("quiz has no questions".into()));
    }

    let mut seen = HashSet::new();
    for (_, question) in quiz.questions() {
        if !seen.insert(question.id.as_str()) {
            return Err(PackError::InvalidQuiz(format!(
                "duplicate question id {}",
                question.id
            )));
        }
    }

    Ok(quiz)
}

fn normalize_tier(tier: Tier, raw: Vec<RawQuestion>) -> Vec<QuizQuestion> {
    raw.into_iter()
        .filter(|q| {
            let blank = q.question.trim().is_empty();
            if blank {
                warn!(tier = %tier, "dropping question without text");
            }
            !blank
        })
        .enumerate()
        .map(|(i, q)| {
            let id = q
                .id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("{}{}", tier.prefix(), i + 1));
            let kind = question_kind(&q.kind);
            let options = match kind {
                QuestionKind::MultipleChoice => q.options,
                QuestionKind::ShortAnswer => Vec::new(),
            };
            QuizQuestion {
                id,
                question: q.question.trim().to_string(),
                kind,
                options,
            }
        })
        .collect()
}

fn question_kind(raw: &str) -> QuestionKind {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mcq" | "multiple-choice" | "multiple_choice" | "multiple choice" => {
            QuestionKind::MultipleChoice
        }
        _ => QuestionKind::ShortAnswer,
    }
}
