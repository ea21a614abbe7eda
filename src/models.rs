//! Data models for the analysis pipeline.
//!
//! This module contains the core data structures shared by the segmenter,
//! the analyzers, the pipeline and the job tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Source language of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python - segmented with a syntax tree
    #[default]
    Python,
    /// JavaScript - segmented with declaration patterns
    Javascript,
    /// Anything else - segmented by size only
    Other,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Other => "other",
        }
    }

    /// File extension used for synthetic chunk file names.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Javascript => "js",
            Language::Other => "txt",
        }
    }

    /// Synthetic file name recorded in every chunk context.
    pub fn synthetic_file_name(&self) -> String {
        format!("unnamed_code.{}", self.file_extension())
    }

    /// Guess the language from a file path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "py" | "pyw" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::Javascript),
            _ => None,
        }
    }
}

/// Orchestration profile requested by the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Larger chunks, a single retry
    Quick,
    /// Configured defaults
    #[default]
    Full,
    /// Smaller chunks, a more patient retry budget
    Deep,
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Quick => write!(f, "quick"),
            AnalysisMode::Full => write!(f, "full"),
            AnalysisMode::Deep => write!(f, "deep"),
        }
    }
}

/// One of the four report dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Semantic,
    Correctness,
    EdgeCases,
    TestCases,
}

impl AnalysisKind {
    /// Execution order within a chunk.
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Semantic,
        AnalysisKind::Correctness,
        AnalysisKind::EdgeCases,
        AnalysisKind::TestCases,
    ];

    /// Text used in place of content when the analysis failed.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            AnalysisKind::Semantic => "No semantic analysis available.",
            AnalysisKind::Correctness => "No correctness analysis available.",
            AnalysisKind::EdgeCases => "No edge case analysis available.",
            AnalysisKind::TestCases => "No test cases available.",
        }
    }

    /// Human-readable section title.
    pub fn title(&self) -> &'static str {
        match self {
            AnalysisKind::Semantic => "Semantic Analysis",
            AnalysisKind::Correctness => "Correctness Analysis",
            AnalysisKind::EdgeCases => "Edge Cases",
            AnalysisKind::TestCases => "Test Cases",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisKind::Semantic => write!(f, "semantic"),
            AnalysisKind::Correctness => write!(f, "correctness"),
            AnalysisKind::EdgeCases => write!(f, "edge_cases"),
            AnalysisKind::TestCases => write!(f, "test_cases"),
        }
    }
}

/// Enclosing construct of a chunk, when one can be named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Construct {
    /// Identifier of the function or class.
    pub name: String,
    /// Kind of construct ("function", "class", "arrow_function").
    pub kind: String,
}

/// Metadata attached to a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkContext {
    /// Declared language of the submission.
    pub language: Language,
    /// Synthetic file name derived from the language.
    pub file_name: String,
    /// Number of lines in the chunk.
    pub total_lines: usize,
    /// Enclosing construct, filled in when derivable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construct: Option<Construct>,
}

/// A bounded unit of source text submitted for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub code: String,
    pub context: ChunkContext,
}

impl Chunk {
    /// Build a chunk, deriving line count and file name from the code.
    pub fn new(code: String, language: Language, construct: Option<Construct>) -> Self {
        let total_lines = code.split('\n').count();
        Self {
            context: ChunkContext {
                language,
                file_name: language.synthetic_file_name(),
                total_lines,
                construct,
            },
            code,
        }
    }

    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.code.chars().count()
    }
}

/// Result of one (chunk, analysis kind) pair.
///
/// Exactly one of content / failure is present; the enum enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeResult {
    Content { content: String },
    Failed { failure_reason: String, fallback: String },
}

/// An analysis kind together with its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub analysis_kind: AnalysisKind,
    #[serde(flatten)]
    pub result: OutcomeResult,
}

impl AnalysisOutcome {
    pub fn success(kind: AnalysisKind, content: String) -> Self {
        Self {
            analysis_kind: kind,
            result: OutcomeResult::Content { content },
        }
    }

    pub fn failure(kind: AnalysisKind, reason: String) -> Self {
        Self {
            analysis_kind: kind,
            result: OutcomeResult::Failed {
                failure_reason: reason,
                fallback: kind.fallback_message().to_string(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.result, OutcomeResult::Failed { .. })
    }

    /// Text contributed to the merged report.
    pub fn report_text(&self) -> &str {
        match &self.result {
            OutcomeResult::Content { content } => content,
            OutcomeResult::Failed { fallback, .. } => fallback,
        }
    }
}

/// All four outcomes for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    pub semantic: AnalysisOutcome,
    pub correctness: AnalysisOutcome,
    pub edge_cases: AnalysisOutcome,
    pub test_cases: AnalysisOutcome,
}

impl ChunkAnalysis {
    pub fn outcome(&self, kind: AnalysisKind) -> &AnalysisOutcome {
        match kind {
            AnalysisKind::Semantic => &self.semantic,
            AnalysisKind::Correctness => &self.correctness,
            AnalysisKind::EdgeCases => &self.edge_cases,
            AnalysisKind::TestCases => &self.test_cases,
        }
    }

    /// Number of outcomes in this chunk that failed.
    pub fn failure_count(&self) -> usize {
        AnalysisKind::ALL
            .iter()
            .filter(|kind| self.outcome(**kind).is_failure())
            .count()
    }
}

/// Metadata about a finished pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Declared language of the submission.
    pub language: Language,
    /// Mode the submission was run with.
    pub mode: AnalysisMode,
    /// Name of the reasoning model used.
    pub model_used: String,
    /// Number of chunks the submission was split into.
    pub chunks_analyzed: usize,
    /// Number of (chunk, kind) outcomes that fell back to placeholder text.
    pub failed_outcomes: usize,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
}

/// The merged result for an entire submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub semantic_analysis: String,
    pub correctness_analysis: String,
    pub edge_cases: String,
    pub test_cases: String,
}

impl Report {
    pub fn section(&self, kind: AnalysisKind) -> &str {
        match kind {
            AnalysisKind::Semantic => &self.semantic_analysis,
            AnalysisKind::Correctness => &self.correctness_analysis,
            AnalysisKind::EdgeCases => &self.edge_cases,
            AnalysisKind::TestCases => &self.test_cases,
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Processing)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Processing => write!(f, "processing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Advisory progress step shown to polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStep {
    Submitting,
    Correctness,
    EdgeCases,
    Semantic,
    TestCases,
    Completed,
}

impl ProgressStep {
    pub fn for_kind(kind: AnalysisKind) -> Self {
        match kind {
            AnalysisKind::Correctness => ProgressStep::Correctness,
            AnalysisKind::EdgeCases => ProgressStep::EdgeCases,
            AnalysisKind::Semantic => ProgressStep::Semantic,
            AnalysisKind::TestCases => ProgressStep::TestCases,
        }
    }

    /// Linear percentage over the four analysis steps.
    pub fn percent(&self) -> u8 {
        match self {
            ProgressStep::Submitting => 0,
            ProgressStep::Correctness => 25,
            ProgressStep::EdgeCases => 50,
            ProgressStep::Semantic => 75,
            ProgressStep::TestCases | ProgressStep::Completed => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgressStep::Submitting => "Submitting Code",
            ProgressStep::Correctness => "Correctness Analysis",
            ProgressStep::EdgeCases => "Edge Cases",
            ProgressStep::Semantic => "Semantic Analysis",
            ProgressStep::TestCases => "Test Cases",
            ProgressStep::Completed => "Completed",
        }
    }
}

/// Status payload returned to polling clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub state: JobState,
    pub progress_step: ProgressStep,
    pub progress_percent: u8,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result payload for a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    pub report: Report,
    pub completed_at: DateTime<Utc>,
}
