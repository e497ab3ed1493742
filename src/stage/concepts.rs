use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{PackError, PackResult, ServiceError};
use crate::provider::GenerationClient;
use crate::sanitize::parse_json;
use crate::types::{ConceptSet, Stage, TextWindow};

/// Labels must be longer than this many characters...
const MIN_LABEL_CHARS: usize = 1;
/// ...and shorter than this many.
const MAX_LABEL_CHARS: usize = 50;

/// What happened to a single window during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowOutcome {
    Extracted { index: usize, labels: Vec<String> },
    Failed { index: usize, reason: String },
}

impl WindowOutcome {
    pub fn index(&self) -> usize {
        match self {
            WindowOutcome::Extracted { index, .. } | WindowOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, WindowOutcome::Failed { .. })
    }
}

/// Extraction result plus the per-window outcomes it was folded from.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub concepts: ConceptSet,
    pub outcomes: Vec<WindowOutcome>,
}

impl ExtractionReport {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// `(window index, reason)` for every failed window.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            WindowOutcome::Failed { index, reason } => Some((*index, reason.as_str())),
            WindowOutcome::Extracted { .. } => None,
        })
    }
}

/// Asks the generation service for the key concepts of every window and
/// merges them into one deduplicated set.
///
/// A window that fails (service error, timeout, unparseable output) is
/// skipped; the stage only fails when nothing at all was extracted.
pub struct ConceptExtractor {
    client: GenerationClient,
    concurrency: usize,
}

impl ConceptExtractor {
    pub fn new(client: GenerationClient) -> Self {
        Self {
            client,
            concurrency: 1,
        }
    }

    /// Allow up to `limit` windows in flight at once.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub async fn extract(&self, windows: &[TextWindow]) -> PackResult<ConceptSet> {
        Ok(self.extract_report(windows).await?.concepts)
    }

    pub async fn extract_report(&self, windows: &[TextWindow]) -> PackResult<ExtractionReport> {
        let outcomes = if self.concurrency > 1 && windows.len() > 1 {
            self.run_concurrent(windows).await?
        } else {
            let mut outcomes = Vec::with_capacity(windows.len());
            for window in windows {
                outcomes.push(extract_window(&self.client, window).await);
            }
            outcomes
        };

        let mut concepts = ConceptSet::new();
        for outcome in &outcomes {
            if let WindowOutcome::Extracted { labels, .. } = outcome {
                for label in labels {
                    concepts.insert(label.clone());
                }
            }
        }

        let report = ExtractionReport { concepts, outcomes };
        if report.concepts.is_empty() {
            return Err(PackError::NoConceptsExtracted {
                windows: windows.len(),
                failed: report.failed(),
            });
        }

        debug!(
            windows = windows.len(),
            failed = report.failed(),
            concepts = report.concepts.len(),
            "concept extraction finished"
        );
        Ok(report)
    }

    /// Fan windows out over a bounded task set; outcomes come back in window order.
    async fn run_concurrent(&self, windows: &[TextWindow]) -> PackResult<Vec<WindowOutcome>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for (slot, window) in windows.iter().cloned().enumerate() {
            let client = self.client.clone();
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => extract_window(&client, &window).await,
                    Err(e) => WindowOutcome::Failed {
                        index: window.index,
                        reason: e.to_string(),
                    },
                };
                (slot, outcome)
            });
        }

        let mut slots: Vec<Option<WindowOutcome>> = vec![None; windows.len()];
        while let Some(joined) = set.join_next().await {
            let (slot, outcome) = joined.map_err(|e| {
                PackError::ExternalService(ServiceError::Provider(format!(
                    "extraction task failed: {e}"
                )))
            })?;
            slots[slot] = Some(outcome);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

async fn extract_window(client: &GenerationClient, window: &TextWindow) -> WindowOutcome {
    let result = client
        .generate(Stage::Concepts, concept_prompt(&window.content))
        .await
        .and_then(|raw| parse_labels(&raw));

    match result {
        Ok(labels) => WindowOutcome::Extracted {
            index: window.index,
            labels,
        },
        Err(e) => {
            warn!(window = window.index, error = %e, "skipping window");
            WindowOutcome::Failed {
                index: window.index,
                reason: e.to_string(),
            }
        }
    }
}

fn concept_prompt(text: &str) -> String {
    format!(
        r#"Extract the MOST IMPORTANT educational concepts from the text below.

STRICT RULES:
- Return ONLY a valid JSON array of strings
- Each concept must be 1 to 4 words
- Concepts must be general and reusable (not full sentences)
- No explanations
- No numbering
- No markdown
- No extra text

EXAMPLE OUTPUT:
["Machine Learning", "Overfitting", "Regularization"]

TEXT:
"""{text}""""#
    )
}

/// Decode a JSON array and keep the plausible labels, trimmed.
fn parse_labels(raw: &str) -> PackResult<Vec<String>> {
    let items: Vec<Value> = parse_json(raw)?;
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(label) => Some(label),
            _ => None,
        })
        .filter(|label| {
            let chars = label.chars().count();
            chars > MIN_LABEL_CHARS && chars < MAX_LABEL_CHARS
        })
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .collect())
}
