use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Pipeline Stages ────────────────────────────────────────────────────────

/// A step of the generation pipeline (used for logging, timeouts and routing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Segment,
    Concepts,
    Hierarchy,
    Quiz,
    Validation,
    Answers,
    Explanation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Segment => "segment",
            Stage::Concepts => "concepts",
            Stage::Hierarchy => "hierarchy",
            Stage::Quiz => "quiz",
            Stage::Validation => "validation",
            Stage::Answers => "answers",
            Stage::Explanation => "explanation",
        }
    }

    /// Log source label, e.g. `stage:quiz`
    pub fn source(&self) -> String {
        format!("stage:{}", self.as_str())
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Model Info ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub provider: ProviderKind,
    #[serde(default)]
    pub max_output_tokens: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ModelInfo {
    pub fn new(provider: ProviderKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider,
            max_output_tokens: 0,
            temperature: None,
        }
    }

    pub fn gemini(id: impl Into<String>) -> Self {
        Self::new(ProviderKind::Gemini, id)
    }
}

/// Known generation service providers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAI,
    Custom(String),
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Custom(s) => write!(f, "{s}"),
        }
    }
}

// ─── Auth Profile ────────────────────────────────────────────────────────────

/// Credentials for a generation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthProfile {
    pub id: String,
    pub provider: ProviderKind,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl AuthProfile {
    pub fn new(provider: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider,
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

// ─── Text Windows ────────────────────────────────────────────────────────────

/// A bounded, sentence-aligned slice of the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextWindow {
    pub index: usize,
    pub content: String,
    /// Sentences in order; `content` is their single-space join
    pub sentences: Vec<String>,
}

impl TextWindow {
    pub fn new(index: usize, sentences: Vec<String>) -> Self {
        let content = sentences.join(" ").trim().to_string();
        Self {
            index,
            content,
            sentences,
        }
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

// ─── Concepts ────────────────────────────────────────────────────────────────

/// Insertion-ordered set of concept labels, deduplicated by exact string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ConceptSet {
    labels: Vec<String>,
    seen: HashSet<String>,
}

impl ConceptSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a label. Returns false if it was already present.
    pub fn insert(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if self.seen.contains(&label) {
            return false;
        }
        self.seen.insert(label.clone());
        self.labels.push(label);
        true
    }

    pub fn contains(&self, label: &str) -> bool {
        self.seen.contains(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl From<Vec<String>> for ConceptSet {
    fn from(labels: Vec<String>) -> Self {
        let mut set = ConceptSet::new();
        for label in labels {
            set.insert(label);
        }
        set
    }
}

impl From<ConceptSet> for Vec<String> {
    fn from(set: ConceptSet) -> Self {
        set.labels
    }
}

// ─── Hierarchy ───────────────────────────────────────────────────────────────

/// A node in the concept tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub name: String,
    #[serde(default)]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn new(name: impl Into<String>, children: Vec<HierarchyNode>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Pre-order depth-first search for the first node whose name contains
    /// `needle`, ignoring case. Depth starts at 1 for this node.
    pub fn find_containing(&self, needle: &str) -> Option<(usize, &HierarchyNode)> {
        let needle = needle.to_lowercase();
        self.find_containing_at(&needle, 1)
    }

    fn find_containing_at(&self, needle: &str, depth: usize) -> Option<(usize, &HierarchyNode)> {
        if self.name.to_lowercase().contains(needle) {
            return Some((depth, self));
        }
        self.children
            .iter()
            .find_map(|child| child.find_containing_at(needle, depth + 1))
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }
}

// ─── Quiz ────────────────────────────────────────────────────────────────────

/// Difficulty tier of a quiz question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Easy,
    Medium,
    Hard,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Easy, Tier::Medium, Tier::Hard];

    /// Id prefix, e.g. `E` for `E1`
    pub fn prefix(&self) -> char {
        match self {
            Tier::Easy => 'E',
            Tier::Medium => 'M',
            Tier::Hard => 'H',
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Easy => write!(f, "easy"),
            Tier::Medium => write!(f, "medium"),
            Tier::Hard => write!(f, "hard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionKind {
    #[serde(rename = "mcq")]
    MultipleChoice,
    #[serde(rename = "short")]
    ShortAnswer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// Questions grouped by difficulty
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieredQuiz {
    #[serde(default)]
    pub easy: Vec<QuizQuestion>,
    #[serde(default)]
    pub medium: Vec<QuizQuestion>,
    #[serde(default)]
    pub hard: Vec<QuizQuestion>,
}

impl TieredQuiz {
    pub fn tier(&self, tier: Tier) -> &[QuizQuestion] {
        match tier {
            Tier::Easy => &self.easy,
            Tier::Medium => &self.medium,
            Tier::Hard => &self.hard,
        }
    }

    /// All questions in tier order, each tagged with its tier
    pub fn questions(&self) -> impl Iterator<Item = (Tier, &QuizQuestion)> {
        Tier::ALL
            .into_iter()
            .flat_map(move |tier| self.tier(tier).iter().map(move |q| (tier, q)))
    }

    pub fn ids(&self) -> HashSet<&str> {
        self.questions().map(|(_, q)| q.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.easy.len() + self.medium.len() + self.hard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Judgment on a synthesized quiz
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl ValidationVerdict {
    pub fn accept() -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
        }
    }

    pub fn reject(issues: Vec<String>) -> Self {
        Self {
            is_valid: false,
            issues,
        }
    }
}

// ─── Answers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSheet {
    #[serde(default)]
    pub answers: Vec<Answer>,
}

impl AnswerSheet {
    pub fn get(&self, id: &str) -> Option<&Answer> {
        self.answers.iter().find(|a| a.id == id)
    }
}

// ─── Explanation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptExplanation {
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAlignment {
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub related_explanation: String,
}

/// Narrative explanation tying hierarchy, concepts and quiz together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub concept_explanations: Vec<ConceptExplanation>,
    #[serde(default)]
    pub quiz_alignment: Vec<QuizAlignment>,
    #[serde(default)]
    pub final_summary: String,
}

impl Explanation {
    /// Explanation text for a concept, matched case-insensitively
    pub fn for_concept(&self, concept: &str) -> Option<&str> {
        let concept = concept.trim().to_lowercase();
        self.concept_explanations
            .iter()
            .find(|c| c.concept.trim().to_lowercase() == concept)
            .map(|c| c.explanation.as_str())
    }
}

// ─── Learning Package ────────────────────────────────────────────────────────

/// Display card for a single concept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptCard {
    pub title: String,
    pub explanation: String,
    pub level: usize,
    pub sub_concepts: Vec<String>,
}

/// A question flattened out of its tier with its answer attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub id: String,
    pub question: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub difficulty: Tier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Bookkeeping for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub windows: usize,
    pub windows_failed: usize,
    pub concepts: usize,
    pub quiz_attempts: usize,
    pub quiz_accepted: bool,
}

/// The assembled output of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPackage {
    pub hierarchy: HierarchyNode,
    pub concepts: Vec<ConceptCard>,
    pub quiz: Vec<QuizItem>,
    pub answers: Vec<Answer>,
    pub explanation: Explanation,
    pub run: RunSummary,
}
