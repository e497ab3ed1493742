use serde::Deserialize;
use tracing::debug;

use crate::error::{PackError, PackResult};
use crate::provider::GenerationClient;
use crate::sanitize::parse_json;
use crate::types::{
    ConceptExplanation, ConceptSet, Explanation, HierarchyNode, QuizAlignment, Stage, TieredQuiz,
};

use super::pretty_json;

/// Inputs the composer explains from. All three are required.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplanationContext<'a> {
    pub hierarchy: Option<&'a HierarchyNode>,
    pub concepts: Option<&'a ConceptSet>,
    pub quiz: Option<&'a TieredQuiz>,
}

impl<'a> ExplanationContext<'a> {
    pub fn new(hierarchy: &'a HierarchyNode, concepts: &'a ConceptSet, quiz: &'a TieredQuiz) -> Self {
        Self {
            hierarchy: Some(hierarchy),
            concepts: Some(concepts),
            quiz: Some(quiz),
        }
    }
}

/// Writes a beginner-level walkthrough aligned with the hierarchy and quiz.
pub struct ExplanationComposer {
    client: GenerationClient,
}

impl ExplanationComposer {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    pub async fn explain(&self, context: ExplanationContext<'_>) -> PackResult<Explanation> {
        let hierarchy = context
            .hierarchy
            .ok_or_else(|| PackError::MissingContext("hierarchy".into()))?;
        let concepts = context
            .concepts
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PackError::MissingContext("concepts".into()))?;
        let quiz = context
            .quiz
            .filter(|q| !q.is_empty())
            .ok_or_else(|| PackError::MissingContext("quiz".into()))?;

        let prompt = explanation_prompt(
            &pretty_json(hierarchy)?,
            &serde_json::to_string(concepts)?,
            &pretty_json(quiz)?,
        );
        let raw = self.client.generate(Stage::Explanation, prompt).await?;
        let ExplanationReply(explanation) =
            parse_json(&raw).map_err(|e| PackError::InvalidExplanation(e.to_string()))?;

        if is_blank(&explanation) {
            return Err(PackError::InvalidExplanation(
                "explanation has no content".into(),
            ));
        }

        debug!(
            title = %explanation.title,
            concepts = explanation.concept_explanations.len(),
            alignments = explanation.quiz_alignment.len(),
            "explanation composed"
        );
        Ok(explanation)
    }
}

/// An object decodes as an explanation only if it carries one of the
/// explanation keys; anything else falls through to later spans.
#[derive(Deserialize)]
#[serde(try_from = "ReplyFields")]
struct ExplanationReply(Explanation);

#[derive(Deserialize)]
struct ReplyFields {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    concept_explanations: Option<Vec<ConceptExplanation>>,
    #[serde(default)]
    quiz_alignment: Option<Vec<QuizAlignment>>,
    #[serde(default)]
    final_summary: Option<String>,
}

impl TryFrom<ReplyFields> for ExplanationReply {
    type Error = String;

    fn try_from(fields: ReplyFields) -> Result<Self, Self::Error> {
        if fields.title.is_none()
            && fields.overview.is_none()
            && fields.concept_explanations.is_none()
            && fields.quiz_alignment.is_none()
            && fields.final_summary.is_none()
        {
            return Err("reply has no explanation fields".into());
        }
        Ok(Self(Explanation {
            title: fields.title.unwrap_or_default(),
            overview: fields.overview.unwrap_or_default(),
            concept_explanations: fields.concept_explanations.unwrap_or_default(),
            quiz_alignment: fields.quiz_alignment.unwrap_or_default(),
            final_summary: fields.final_summary.unwrap_or_default(),
        }))
    }
}

fn is_blank(explanation: &Explanation) -> bool {
    explanation.title.trim().is_empty()
        && explanation.overview.trim().is_empty()
        && explanation.final_summary.trim().is_empty()
        && explanation.concept_explanations.is_empty()
}

fn explanation_prompt(hierarchy_json: &str, concepts_json: &str, quiz_json: &str) -> String {
    format!(
        r#"You are an expert teacher explaining a topic to a beginner.

GOAL:
Explain the topic in a clear, simple, and structured way.

INPUT CONTEXT:
- Topic hierarchy
- Key concepts
- Quiz questions students will attempt

RULES:
- Explain from basics to advanced
- Use simple language
- Match explanations with quiz topics
- Use real-world analogies where helpful
- No markdown
- No emojis
- No extra commentary
- Return ONLY valid JSON

OUTPUT FORMAT:
{{
  "title": "",
  "overview": "",
  "concept_explanations": [
    {{ "concept": "", "explanation": "" }}
  ],
  "quiz_alignment": [
    {{ "question_id": "", "related_explanation": "" }}
  ],
  "final_summary": ""
}}

HIERARCHY:
{hierarchy_json}

CONCEPTS:
{concepts_json}

QUIZ:
{quiz_json}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::testing;
    use crate::types::{QuestionKind, QuizQuestion};

    const EXPLANATION: &str = r#"{
        "title": "Photosynthesis",
        "overview": "How plants make food from light.",
        "concept_explanations": [{"concept": "Chlorophyll", "explanation": "The green pigment."}],
        "quiz_alignment": [{"question_id": "E1", "related_explanation": "See Chlorophyll."}],
        "final_summary": "Light becomes sugar."
    }"#;

    fn inputs() -> (HierarchyNode, ConceptSet, TieredQuiz) {
        let tree = HierarchyNode::new("Photosynthesis", vec![HierarchyNode::leaf("Chlorophyll")]);
        let concepts = ConceptSet::from(vec!["Photosynthesis".to_string(), "Chlorophyll".to_string()]);
        let quiz = TieredQuiz {
            easy: vec![QuizQuestion {
                id: "E1".into(),
                question: "What is chlorophyll?".into(),
                kind: QuestionKind::ShortAnswer,
                options: Vec::new(),
            }],
            ..Default::default()
        };
        (tree, concepts, quiz)
    }

    #[tokio::test]
    async fn composes_from_full_context() {
        let (tree, concepts, quiz) = inputs();
        let (client, seen) = testing::recording(EXPLANATION);
        let explanation = ExplanationComposer::new(client)
            .explain(ExplanationContext::new(&tree, &concepts, &quiz))
            .await
            .unwrap();

        assert_eq!(explanation.title, "Photosynthesis");
        assert_eq!(explanation.for_concept("chlorophyll"), Some("The green pigment."));
        assert_eq!(explanation.quiz_alignment[0].question_id, "E1");

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].stage, Stage::Explanation);
        assert!(seen[0].prompt.contains(r#"["Photosynthesis","Chlorophyll"]"#));
        assert!(seen[0].prompt.contains("What is chlorophyll?"));
    }

    #[tokio::test]
    async fn missing_inputs_fail_before_calling() {
        let (tree, concepts, quiz) = inputs();
        let (client, seen) = testing::recording(EXPLANATION);
        let composer = ExplanationComposer::new(client);

        let cases = [
            ExplanationContext {
                hierarchy: None,
                ..ExplanationContext::new(&tree, &concepts, &quiz)
            },
            ExplanationContext {
                concepts: None,
                ..ExplanationContext::new(&tree, &concepts, &quiz)
            },
            ExplanationContext {
                quiz: None,
                ..ExplanationContext::new(&tree, &concepts, &quiz)
            },
            ExplanationContext::default(),
        ];
        for context in cases {
            let err = composer.explain(context).await.unwrap_err();
            assert!(matches!(err, PackError::MissingContext(_)));
        }

        let empty_quiz = TieredQuiz::default();
        let err = composer
            .explain(ExplanationContext::new(&tree, &concepts, &empty_quiz))
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::MissingContext(msg) if msg == "quiz"));

        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_or_empty_explanation_is_an_error() {
        let (tree, concepts, quiz) = inputs();

        let err = ExplanationComposer::new(testing::fixed("Plants are neat."))
            .explain(ExplanationContext::new(&tree, &concepts, &quiz))
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidExplanation(_)));

        let err = ExplanationComposer::new(testing::fixed(r#"{"title": " "}"#))
            .explain(ExplanationContext::new(&tree, &concepts, &quiz))
            .await
            .unwrap_err();
        assert!(matches!(err, PackError::InvalidExplanation(_)));
    }

    #[tokio::test]
    async fn wrapped_explanation_is_unwrapped() {
        let (tree, concepts, quiz) = inputs();
        let reply = format!(r#"{{"explanation": {EXPLANATION}}}"#);
        let explanation = ExplanationComposer::new(testing::fixed(&reply))
            .explain(ExplanationContext::new(&tree, &concepts, &quiz))
            .await
            .unwrap();
        assert_eq!(explanation.title, "Photosynthesis");
        assert_eq!(explanation.final_summary, "Light becomes sugar.");
    }

    #[tokio::test]
    async fn bad_field_reports_decode_error() {
        let (tree, concepts, quiz) = inputs();

        let err = ExplanationComposer::new(testing::fixed(
            r#"{"title": "Photosynthesis", "concept_explanations": "Chlorophyll is green."}"#,
        ))
        .explain(ExplanationContext::new(&tree, &concepts, &quiz))
        .await
        .unwrap_err();
        assert!(matches!(&err, PackError::InvalidExplanation(msg) if msg.contains("invalid type")), "{err}");

        let err = ExplanationComposer::new(testing::fixed(r#"{"summary": "Plants eat light."}"#))
            .explain(ExplanationContext::new(&tree, &concepts, &quiz))
            .await
            .unwrap_err();
        assert!(matches!(&err, PackError::InvalidExplanation(msg) if msg.contains("no explanation fields")), "{err}");
    }
}
