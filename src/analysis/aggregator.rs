//! Merging per-chunk outcomes into report sections.
//!
//! Sections are concatenated in chunk order, two newlines between
//! chunks. Failed outcomes contribute their fallback text.

use crate::models::{AnalysisKind, ChunkAnalysis};

/// Separator placed between the contributions of consecutive chunks.
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// Merge every chunk's `kind` outcome into a single section.
pub fn merge_kind(analyses: &[ChunkAnalysis], kind: AnalysisKind) -> String {
    analyses
        .iter()
        .map(|analysis| analysis.outcome(kind).report_text())
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR)
}

/// Total number of failed outcomes across all chunks.
pub fn failed_outcomes(analyses: &[ChunkAnalysis]) -> usize {
    analyses.iter().map(ChunkAnalysis::failure_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisOutcome;

    fn analysis(tag: &str) -> ChunkAnalysis {
        ChunkAnalysis {
            semantic: AnalysisOutcome::success(AnalysisKind::Semantic, format!("S{tag}")),
            correctness: AnalysisOutcome::success(AnalysisKind::Correctness, format!("C{tag}")),
            edge_cases: AnalysisOutcome::success(AnalysisKind::EdgeCases, format!("E{tag}")),
            test_cases: AnalysisOutcome::success(AnalysisKind::TestCases, format!("T{tag}")),
        }
    }

    #[test]
    fn test_merge_keeps_chunk_order() {
        let analyses = vec![analysis("1"), analysis("2"), analysis("3")];
        assert_eq!(merge_kind(&analyses, AnalysisKind::Semantic), "S1\n\nS2\n\nS3");
        assert_eq!(merge_kind(&analyses, AnalysisKind::TestCases), "T1\n\nT2\n\nT3");
    }

    #[test]
    fn test_merge_single_chunk_has_no_separator() {
        let analyses = vec![analysis("only")];
        assert_eq!(merge_kind(&analyses, AnalysisKind::Correctness), "Conly");
    }

    #[test]
    fn test_merge_uses_fallback_for_failures() {
        let mut second = analysis("2");
        second.edge_cases = AnalysisOutcome::failure(AnalysisKind::EdgeCases, "timeout".to_string());
        let analyses = vec![analysis("1"), second];

        assert_eq!(
            merge_kind(&analyses, AnalysisKind::EdgeCases),
            "E1\n\nNo edge case analysis available."
        );
        assert_eq!(failed_outcomes(&analyses), 1);
    }

    #[test]
    fn test_merge_is_associative() {
        let all = vec![analysis("a"), analysis("b"), analysis("c")];
        let left = merge_kind(&all[..2], AnalysisKind::Semantic);
        let right = merge_kind(&all[2..], AnalysisKind::Semantic);
        assert_eq!(
            format!("{left}{CHUNK_SEPARATOR}{right}"),
            merge_kind(&all, AnalysisKind::Semantic)
        );
    }

    #[test]
    fn test_empty_merge() {
        assert_eq!(merge_kind(&[], AnalysisKind::Semantic), "");
        assert_eq!(failed_outcomes(&[]), 0);
    }
}
