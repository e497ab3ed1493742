//! Generation stages.
//!
//! Each stage owns a [`GenerationClient`](crate::provider::GenerationClient),
//! builds one kind of prompt, and turns the sanitized completion into a typed
//! artifact:
//!
//! | Stage | Input | Output |
//! |-------|-------|--------|
//! | [`ConceptExtractor`] | text windows | [`ConceptSet`](crate::types::ConceptSet) |
//! | [`HierarchyBuilder`] | concepts | [`HierarchyNode`](crate::types::HierarchyNode) |
//! | [`QuizSynthesizer`] | hierarchy | [`TieredQuiz`](crate::types::TieredQuiz) |
//! | [`QuizValidator`] | quiz | [`ValidationVerdict`](crate::types::ValidationVerdict) |
//! | [`AnswerGenerator`] | quiz | [`AnswerSheet`](crate::types::AnswerSheet) |
//! | [`ExplanationComposer`] | hierarchy + concepts + quiz | [`Explanation`](crate::types::Explanation) |

mod answers;
mod concepts;
mod explanation;
mod hierarchy;
mod quiz;
mod validator;

pub use answers::AnswerGenerator;
pub use concepts::{ConceptExtractor, ExtractionReport, WindowOutcome};
pub use explanation::{ExplanationComposer, ExplanationContext};
pub use hierarchy::HierarchyBuilder;
pub use quiz::QuizSynthesizer;
pub use validator::QuizValidator;

use serde::Serialize;

use crate::error::PackResult;

/// Indented JSON for embedding an artifact in a prompt.
fn pretty_json<T: Serialize + ?Sized>(value: &T) -> PackResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
