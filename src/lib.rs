//! # learnpack-core
//!
//! Turns a passage of educational text into a learning package: a concept
//! hierarchy, a tiered quiz with answers, and an explanation aligned with
//! both. Each step is one or more calls to a text-generation service.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use learnpack_core::pipeline::LearningPipeline;
//!
//! # async fn demo() -> learnpack_core::PackResult<()> {
//! // GEMINI_API_KEY, GEMINI_MODEL and LEARNPACK_* are read from the environment
//! let pipeline = LearningPipeline::from_env()?;
//!
//! let package = pipeline
//!     .run("Photosynthesis converts light into chemical energy. Chlorophyll absorbs the light.")
//!     .await?;
//!
//! println!("root concept: {}", package.hierarchy.name);
//! for item in &package.quiz {
//!     println!("[{}] {} -> {:?}", item.difficulty, item.question, item.answer);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | Core types: `TextWindow`, `ConceptSet`, `HierarchyNode`, `TieredQuiz`, `LearningPackage` |
//! | [`segment`] | Sentence-aligned windowing with overlap |
//! | [`sanitize`] | Extracts the JSON payload from fenced or chatty completions |
//! | [`stage`] | Concept extraction, hierarchy, quiz, validation, answers, explanation |
//! | [`pipeline`] | Orchestrator, quiz generate/validate state machine, presentation shaping |
//! | [`provider`] | Generation service abstraction (Gemini, OpenAI-compatible, closures) |
//! | [`config`] | Pipeline settings and credentials from JSON or environment |
//! | [`runlog`] | Structured per-run event log with pluggable sinks |
//! | [`boundary`] | Request/response mapping for an HTTP endpoint |
//! | [`error`] | Error types with thiserror and their HTTP status mapping |
//!
//! ## Failure model
//!
//! - A window whose extraction fails is skipped; the run fails only if no
//!   concept is extracted at all.
//! - A quiz the validator keeps rejecting is regenerated up to
//!   `max_quiz_attempts` times, then the last draft is used.
//! - Any other stage failure aborts the run with that stage's error.

pub mod boundary;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod runlog;
pub mod sanitize;
pub mod segment;
pub mod stage;
pub mod types;

pub use error::{PackError, PackResult};
pub use types::*;
