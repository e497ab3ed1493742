//! Pipeline orchestrator.
//!
//! ```text
//! text ─▶ segment ─▶ concepts ─▶ hierarchy ─▶ quiz loop ─▶ answers ─▶ explanation ─▶ LearningPackage
//! ```
//!
//! Stages run one after another. Window failures during extraction are
//! tolerated; every other stage failure ends the run with that error and no
//! partial package.

pub mod present;
pub mod quiz_loop;

pub use quiz_loop::{LoopState, QuizJudge, QuizLoop, QuizLoopOutcome, QuizSource};

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PackError, PackResult};
use crate::provider::{GenerationClient, ProviderRegistry};
use crate::runlog::{LogLevel, RunLogger, RunScope};
use crate::segment::segment;
use crate::stage::{
    AnswerGenerator, ConceptExtractor, ExplanationComposer, ExplanationContext, HierarchyBuilder,
    QuizSynthesizer, QuizValidator,
};
use crate::types::{AuthProfile, LearningPackage, RunSummary, Stage};

const SOURCE: &str = "pipeline";

/// Turns source text into a [`LearningPackage`].
///
/// Holds no per-run state; one pipeline can serve concurrent runs.
pub struct LearningPipeline {
    config: PipelineConfig,
    logger: RunLogger,
    extractor: ConceptExtractor,
    hierarchy: HierarchyBuilder,
    synthesizer: QuizSynthesizer,
    validator: QuizValidator,
    answers: AnswerGenerator,
    composer: ExplanationComposer,
}

impl LearningPipeline {
    /// The client's system prompt and per-call deadline are taken from `config`.
    pub fn new(client: GenerationClient, config: PipelineConfig) -> Self {
        let client = client
            .with_system_prompt(config.system_prompt.clone())
            .with_timeout(config.stage_timeout());

        Self {
            extractor: ConceptExtractor::new(client.clone())
                .with_concurrency(config.extraction_concurrency),
            hierarchy: HierarchyBuilder::new(client.clone()),
            synthesizer: QuizSynthesizer::new(client.clone()),
            validator: QuizValidator::new(client.clone()),
            answers: AnswerGenerator::new(client.clone()),
            composer: ExplanationComposer::new(client),
            logger: RunLogger::default(),
            config,
        }
    }

    /// Resolve the configured provider from `registry`.
    pub fn from_config(
        config: PipelineConfig,
        registry: &ProviderRegistry,
        auth: AuthProfile,
    ) -> PackResult<Self> {
        config.validate()?;
        let provider = registry.require(&config.model.provider)?;
        let client = GenerationClient::new(provider, config.model.clone(), auth);
        Ok(Self::new(client, config))
    }

    /// Configuration and credentials from the environment, built-in providers.
    pub fn from_env() -> PackResult<Self> {
        let config = PipelineConfig::from_env()?;
        let auth = AuthProfile::from_env(config.model.provider.clone())?;
        Self::from_config(config, &ProviderRegistry::with_defaults(), auth)
    }

    pub fn with_logger(mut self, logger: RunLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, text: &str) -> PackResult<LearningPackage> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let log = self.logger.for_run(run_id);

        log.emit_with(
            LogLevel::Info,
            SOURCE,
            "run started",
            json!({ "chars": text.chars().count() }),
        );

        let result = self.execute(&log, text, started_at).await;
        match &result {
            Ok(package) => log.emit_with(
                LogLevel::Info,
                SOURCE,
                "run completed",
                json!({
                    "concepts": package.run.concepts,
                    "questions": package.quiz.len(),
                    "quiz_attempts": package.run.quiz_attempts,
                }),
            ),
            Err(e) => log.emit_with(
                LogLevel::Error,
                SOURCE,
                "run failed",
                json!({ "error": e.to_string(), "status": e.status_code() }),
            ),
        }
        result
    }

    async fn execute(
        &self,
        log: &RunScope<'_>,
        text: &str,
        started_at: DateTime<Utc>,
    ) -> PackResult<LearningPackage> {
        let windows = segment(text, &self.config.segment)?;
        if windows.is_empty() {
            return Err(PackError::InvalidInput(
                "text contains no complete sentence".into(),
            ));
        }
        log.emit_with(
            LogLevel::Info,
            &Stage::Segment.source(),
            "text segmented",
            json!({ "windows": windows.len() }),
        );

        let report = self.extractor.extract_report(&windows).await?;
        for (index, reason) in report.failures() {
            log.emit_with(
                LogLevel::Warn,
                &Stage::Concepts.source(),
                "window skipped",
                json!({ "window": index, "reason": reason }),
            );
        }
        log.emit_with(
            LogLevel::Info,
            &Stage::Concepts.source(),
            "concepts extracted",
            json!({ "concepts": report.concepts.len(), "failed_windows": report.failed() }),
        );
        let concepts = &report.concepts;

        let hierarchy = self.hierarchy.build(concepts).await?;
        log.emit_with(
            LogLevel::Info,
            &Stage::Hierarchy.source(),
            "hierarchy built",
            json!({ "root": hierarchy.name, "nodes": hierarchy.node_count() }),
        );

        let outcome = QuizLoop::new(self.config.max_quiz_attempts)
            .run(&self.synthesizer, &self.validator, &hierarchy)
            .await?;
        for (attempt, verdict) in outcome.verdicts.iter().enumerate() {
            let level = if verdict.is_valid {
                LogLevel::Info
            } else {
                LogLevel::Warn
            };
            log.emit_with(
                level,
                &Stage::Validation.source(),
                format!("quiz attempt {}", attempt + 1),
                json!({ "isValid": verdict.is_valid, "issues": verdict.issues }),
            );
        }
        if !outcome.accepted {
            log.warn(
                &Stage::Quiz.source(),
                format!(
                    "no quiz accepted after {} attempts, keeping the last draft",
                    outcome.attempts
                ),
            );
        }

        let answers = self.answers.answer(&outcome.quiz).await?;
        log.emit_with(
            LogLevel::Info,
            &Stage::Answers.source(),
            "answers generated",
            json!({ "answered": answers.answers.len(), "questions": outcome.quiz.len() }),
        );

        let explanation = self
            .composer
            .explain(ExplanationContext::new(&hierarchy, concepts, &outcome.quiz))
            .await?;
        log.info(&Stage::Explanation.source(), "explanation composed");

        let run = RunSummary {
            run_id: log.run_id(),
            started_at,
            finished_at: Utc::now(),
            windows: windows.len(),
            windows_failed: report.failed(),
            concepts: concepts.len(),
            quiz_attempts: outcome.attempts,
            quiz_accepted: outcome.accepted,
        };

        Ok(LearningPackage {
            concepts: present::concept_cards(concepts, &hierarchy, &explanation),
            quiz: present::flatten_quiz(&outcome.quiz, &answers),
            answers: answers.answers,
            hierarchy,
            explanation,
            run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::provider::{FnProvider, GenerationRequest};
    use crate::runlog::MemorySink;
    use crate::types::ModelInfo;
    use crate::types::ProviderKind;

    fn routed(validation: &'static str) -> GenerationClient {
        let provider = FnProvider::from_fn(move |req: GenerationRequest| async move {
            let body = match req.stage {
                Stage::Concepts => r#"["Osmosis", "Membrane"]"#,
                Stage::Hierarchy => r#"{"root": "Osmosis", "children": [{"name": "Membrane"}]}"#,
                Stage::Quiz => r#"{"easy": [{"id": "E1", "question": "What is osmosis?", "type": "short"}]}"#,
                Stage::Validation => validation,
                Stage::Answers => r#"{"answers": [{"id": "E1", "answer": "Water diffusion", "explanation": "Across a membrane."}]}"#,
                Stage::Explanation => r#"{"title": "Osmosis", "overview": "Water moves.", "concept_explanations": [], "quiz_alignment": [], "final_summary": "Done."}"#,
                Stage::Segment => "",
            };
            Ok::<String, PackError>(body.to_string())
        });
        GenerationClient::new(
            Arc::new(provider),
            ModelInfo::gemini("test-model"),
            AuthProfile::new(ProviderKind::Gemini, "test-key"),
        )
    }

    #[tokio::test]
    async fn run_logs_stage_events() {
        let sink = Arc::new(MemorySink::new());
        let pipeline = LearningPipeline::new(routed(r#"{"isValid": true}"#), PipelineConfig::default())
            .with_logger(RunLogger::new().with_sink(sink.clone()));

        let package = pipeline.run("Water crosses membranes. This is osmosis.").await.unwrap();
        assert_eq!(package.run.windows, 1);
        assert!(package.run.quiz_accepted);

        let entries = sink.entries();
        assert!(entries.iter().all(|e| e.run_id == Some(package.run.run_id)));
        assert_eq!(entries.first().unwrap().message, "run started");
        assert_eq!(entries.last().unwrap().message, "run completed");
        assert_eq!(sink.entries_from("stage:validation").len(), 1);
        assert_eq!(sink.entries_from("stage:segment")[0].payload.as_ref().unwrap()["windows"], 1);
    }

    #[tokio::test]
    async fn exhausted_quiz_is_logged_and_kept() {
        let sink = Arc::new(MemorySink::new());
        let config = PipelineConfig {
            max_quiz_attempts: 2,
            ..Default::default()
        };
        let pipeline = LearningPipeline::new(
            routed(r#"{"isValid": false, "issues": ["too easy"]}"#),
            config,
        )
        .with_logger(RunLogger::new().with_sink(sink.clone()));

        let package = pipeline.run("Water crosses membranes.").await.unwrap();
        assert!(!package.run.quiz_accepted);
        assert_eq!(package.run.quiz_attempts, 2);
        assert_eq!(package.quiz.len(), 1);
        assert_eq!(sink.entries_from("stage:validation").len(), 2);

        let exhausted = sink.entries_from("stage:quiz");
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].level, LogLevel::Warn);
    }

    #[tokio::test]
    async fn text_without_sentences_is_invalid_input() {
        let sink = Arc::new(MemorySink::new());
        let pipeline = LearningPipeline::new(routed(r#"{"isValid": true}"#), PipelineConfig::default())
            .with_logger(RunLogger::new().with_sink(sink.clone()));

        let err = pipeline.run("no terminal punctuation here").await.unwrap_err();
        assert!(matches!(err, PackError::InvalidInput(_)));

        let err = pipeline.run("   ").await.unwrap_err();
        assert!(matches!(err, PackError::InvalidInput(_)));

        let failures: Vec<_> = sink
            .entries_from(SOURCE)
            .into_iter()
            .filter(|e| e.level == LogLevel::Error)
            .collect();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].payload.as_ref().unwrap()["status"], 400);
    }

    #[test]
    fn from_config_requires_registered_provider() {
        let config = PipelineConfig::default();
        let auth = AuthProfile::new(ProviderKind::Gemini, "test-key");

        let err = LearningPipeline::from_config(config.clone(), &ProviderRegistry::new(), auth.clone())
            .err()
            .unwrap();
        assert!(matches!(err, PackError::Config(_)));

        let pipeline =
            LearningPipeline::from_config(config, &ProviderRegistry::with_defaults(), auth).unwrap();
        assert_eq!(pipeline.config().max_quiz_attempts, 3);
    }

    #[test]
    fn pipeline_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LearningPipeline>();
    }
}
