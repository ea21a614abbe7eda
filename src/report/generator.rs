//! Markdown and JSON report generation.
//!
//! A report covers every submitted source: finished jobs contribute their
//! metadata and the four merged analysis sections, failed jobs their error.

use crate::models::{AnalysisKind, JobResult, JobState, ReportMetadata};
use anyhow::Result;
use serde::Serialize;

/// Outcome of one submitted source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    /// File path, or `<stdin>`.
    pub source: String,
    pub job_id: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
}

impl SourceReport {
    pub fn completed(source: String, result: JobResult) -> Self {
        Self {
            source,
            job_id: result.job_id.clone(),
            state: JobState::Completed,
            error: None,
            result: Some(result),
        }
    }

    pub fn failed(source: String, job_id: String, error: String) -> Self {
        Self {
            source,
            job_id,
            state: JobState::Failed,
            error: Some(error),
            result: None,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(sources: &[SourceReport]) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# CodeSage Report\n\n");

    // Overview table
    output.push_str(&generate_summary_section(sources));

    for source in sources {
        output.push_str(&generate_source_section(source));
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the summary table.
fn generate_summary_section(sources: &[SourceReport]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Source | State | Chunks | Failed Analyses |\n");
    section.push_str("|:---|:---:|:---:|:---:|\n");

    for source in sources {
        let (chunks, failed) = match &source.result {
            Some(result) => (
                result.report.metadata.chunks_analyzed.to_string(),
                result.report.metadata.failed_outcomes.to_string(),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        section.push_str(&format!(
            "| `{}` | {} | {} | {} |\n",
            source.source, source.state, chunks, failed
        ));
    }
    section.push('\n');

    section
}

/// Generate the section for a single source.
fn generate_source_section(source: &SourceReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("## `{}`\n\n", source.source));

    match &source.result {
        Some(result) => {
            section.push_str(&generate_metadata_section(&source.job_id, result));
            for kind in AnalysisKind::ALL {
                section.push_str(&format!("### {}\n\n", kind.title()));
                section.push_str(result.report.section(kind).trim_end());
                section.push_str("\n\n");
            }
        }
        None => {
            section.push_str(&format!("- **Job ID:** `{}`\n", source.job_id));
            section.push_str(&format!("- **State:** {}\n\n", source.state));
            if let Some(ref error) = source.error {
                section.push_str(&format!("**Error:** {}\n\n", error));
            }
        }
    }

    section.push_str("---\n\n");

    section
}

/// Generate the metadata list of a finished job.
fn generate_metadata_section(job_id: &str, result: &JobResult) -> String {
    let metadata: &ReportMetadata = &result.report.metadata;
    let mut section = String::new();

    section.push_str(&format!("- **Job ID:** `{}`\n", job_id));
    section.push_str(&format!("- **Language:** {}\n", metadata.language));
    section.push_str(&format!("- **Mode:** {}\n", metadata.mode));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Chunks Analyzed:** {}\n",
        metadata.chunks_analyzed
    ));
    if metadata.failed_outcomes > 0 {
        section.push_str(&format!(
            "- **Failed Analyses:** {}\n",
            metadata.failed_outcomes
        ));
    }
    section.push_str(&format!(
        "- **Completed:** {}\n",
        result.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!("*Report generated by CodeSage v{}*\n", env!("CARGO_PKG_VERSION"))
}

/// Generate a JSON report.
pub fn generate_json_report(sources: &[SourceReport]) -> Result<String> {
    serde_json::to_string_pretty(sources).map_err(Into::into)
}
