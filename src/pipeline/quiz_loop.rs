//! Generate/validate loop for the quiz.
//!
//! ```text
//!             ┌──────────────────────────────┐
//!             ▼                              │ invalid, attempts < max
//!        Generating ──draft──▶ Validating ───┤
//!                                            ├─ valid ──────────▶ Accepted
//!                                            └─ invalid, == max ─▶ Exhausted
//! ```
//!
//! A rejected draft is discarded and a fresh one requested; the validator's
//! issues are recorded but not fed back into generation. When attempts run
//! out the last draft is kept.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::PackResult;
use crate::stage::{QuizSynthesizer, QuizValidator};
use crate::types::{HierarchyNode, TieredQuiz, ValidationVerdict};

/// Produces quiz drafts.
#[async_trait]
pub trait QuizSource: Send + Sync {
    async fn draft(&self, hierarchy: &HierarchyNode) -> PackResult<TieredQuiz>;
}

/// Passes judgment on a draft.
#[async_trait]
pub trait QuizJudge: Send + Sync {
    async fn judge(&self, quiz: &TieredQuiz) -> PackResult<ValidationVerdict>;
}

#[async_trait]
impl QuizSource for QuizSynthesizer {
    async fn draft(&self, hierarchy: &HierarchyNode) -> PackResult<TieredQuiz> {
        self.synthesize(hierarchy).await
    }
}

#[async_trait]
impl QuizJudge for QuizValidator {
    async fn judge(&self, quiz: &TieredQuiz) -> PackResult<ValidationVerdict> {
        self.validate(quiz).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    Generating,
    Validating(TieredQuiz),
    Accepted(TieredQuiz),
    Exhausted(TieredQuiz),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizLoopOutcome {
    pub quiz: TieredQuiz,
    /// Validations performed
    pub attempts: usize,
    pub accepted: bool,
    /// One verdict per attempt, in order
    pub verdicts: Vec<ValidationVerdict>,
}

#[derive(Debug, Clone, Copy)]
pub struct QuizLoop {
    max_attempts: usize,
}

impl QuizLoop {
    pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

    /// `max_attempts` below 1 is treated as 1.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Drive the loop to `Accepted` or `Exhausted`. Errors from either side
    /// abort immediately and are not retried.
    pub async fn run(
        &self,
        source: &dyn QuizSource,
        judge: &dyn QuizJudge,
        hierarchy: &HierarchyNode,
    ) -> PackResult<QuizLoopOutcome> {
        let mut state = LoopState::Generating;
        let mut attempts = 0;
        let mut verdicts = Vec::new();

        loop {
            state = match state {
                LoopState::Generating => LoopState::Validating(source.draft(hierarchy).await?),
                LoopState::Validating(quiz) => {
                    let verdict = judge.judge(&quiz).await?;
                    attempts += 1;
                    let valid = verdict.is_valid;
                    if valid {
                        info!(attempt = attempts, "quiz accepted");
                    } else {
                        warn!(
                            attempt = attempts,
                            max = self.max_attempts,
                            issues = ?verdict.issues,
                            "quiz rejected"
                        );
                    }
                    verdicts.push(verdict);

                    if valid {
                        LoopState::Accepted(quiz)
                    } else if attempts >= self.max_attempts {
                        LoopState::Exhausted(quiz)
                    } else {
                        LoopState::Generating
                    }
                }
                LoopState::Accepted(quiz) => {
                    return Ok(QuizLoopOutcome {
                        quiz,
                        attempts,
                        accepted: true,
                        verdicts,
                    })
                }
                LoopState::Exhausted(quiz) => {
                    return Ok(QuizLoopOutcome {
                        quiz,
                        attempts,
                        accepted: false,
                        verdicts,
                    })
                }
            };
        }
    }
}

impl Default for QuizLoop {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}
