//! Per-chunk analysis: four independent requests, one per kind.

use crate::analysis::prompts::build_prompt;
use crate::llm::AnalysisClient;
use crate::models::{AnalysisKind, AnalysisOutcome, Chunk, ChunkAnalysis};
use tracing::{info, warn};

/// Runs the four analyses for a chunk through one client.
pub struct ChunkAnalyzer {
    client: AnalysisClient,
}

impl ChunkAnalyzer {
    pub fn new(client: AnalysisClient) -> Self {
        Self { client }
    }

    /// Analyze `chunk`, calling `on_outcome` after each kind finishes.
    ///
    /// Kinds run one after another in progress-step order (correctness,
    /// edge cases, semantic, test cases); a failed kind does not stop the others.
    pub async fn analyze<F>(&mut self, chunk: &Chunk, mut on_outcome: F) -> ChunkAnalysis
    where
        F: FnMut(&AnalysisOutcome),
    {
        let correctness = self.run(AnalysisKind::Correctness, chunk, &mut on_outcome).await;
        let edge_cases = self.run(AnalysisKind::EdgeCases, chunk, &mut on_outcome).await;
        let semantic = self.run(AnalysisKind::Semantic, chunk, &mut on_outcome).await;
        let test_cases = self.run(AnalysisKind::TestCases, chunk, &mut on_outcome).await;

        ChunkAnalysis {
            semantic,
            correctness,
            edge_cases,
            test_cases,
        }
    }

    async fn run<F>(&mut self, kind: AnalysisKind, chunk: &Chunk, on_outcome: &mut F) -> AnalysisOutcome
    where
        F: FnMut(&AnalysisOutcome),
    {
        let outcome = self.analyze_kind(kind, chunk).await;
        on_outcome(&outcome);
        outcome
    }

    async fn analyze_kind(&mut self, kind: AnalysisKind, chunk: &Chunk) -> AnalysisOutcome {
        info!("Making API call for {} analysis", kind);
        let prompt = build_prompt(kind, chunk);

        match self.client.call(&prompt).await {
            Ok(content) => AnalysisOutcome::success(kind, content),
            Err(failure) => {
                warn!("{} analysis failed: {}", kind, failure);
                AnalysisOutcome::failure(kind, failure.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{ScriptedService, Step};
    use crate::llm::ClientConfig;
    use crate::models::{Language, OutcomeResult, ProgressStep};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    fn analyzer(service: Arc<ScriptedService>, retries: u32) -> ChunkAnalyzer {
        ChunkAnalyzer::new(AnalysisClient::new(
            service,
            ClientConfig {
                max_retries: retries,
                initial_retry_delay: Duration::from_millis(1),
            },
        ))
    }

    #[tokio::test]
    async fn test_all_kinds_succeed_in_order() {
        let service = Arc::new(ScriptedService::with_script(vec![
            Step::Reply("bugs".to_string()),
            Step::Reply("edges".to_string()),
            Step::Reply("meaning".to_string()),
            Step::Reply("tests".to_string()),
        ]));
        let mut analyzer = analyzer(service.clone(), 0);
        let chunk = Chunk::new("def f(x): return x+1".to_string(), Language::Python, None);

        let mut seen = Vec::new();
        let analysis = analyzer.analyze(&chunk, |o| seen.push(o.analysis_kind)).await;

        assert_eq!(
            seen,
            vec![
                AnalysisKind::Correctness,
                AnalysisKind::EdgeCases,
                AnalysisKind::Semantic,
                AnalysisKind::TestCases
            ]
        );
        // Each outcome moves the advisory step forward.
        let steps: Vec<_> = seen.iter().map(|k| ProgressStep::for_kind(*k)).collect();
        assert!(steps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(analysis.semantic.report_text(), "meaning");
        assert_eq!(analysis.correctness.report_text(), "bugs");
        assert_eq!(analysis.edge_cases.report_text(), "edges");
        assert_eq!(analysis.test_cases.report_text(), "tests");
        assert_eq!(analysis.failure_count(), 0);
        // One session shared by the four calls.
        assert_eq!(service.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_failed_kind_does_not_block_others() {
        let service = Arc::new(ScriptedService::with_script(vec![
            Step::FailSend("overloaded".to_string()),
            Step::Reply("edges".to_string()),
            Step::Reply("meaning".to_string()),
            Step::Reply("tests".to_string()),
        ]));
        let mut analyzer = analyzer(service, 0);
        let chunk = Chunk::new("x = 1".to_string(), Language::Other, None);

        let analysis = analyzer.analyze(&chunk, |_| {}).await;

        assert_eq!(analysis.failure_count(), 1);
        assert_eq!(
            analysis.correctness.report_text(),
            "No correctness analysis available."
        );
        match &analysis.correctness.result {
            OutcomeResult::Failed { failure_reason, .. } => {
                assert!(failure_reason.contains("overloaded"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(analysis.test_cases.report_text(), "tests");
    }

    #[tokio::test]
    async fn test_all_kinds_fail() {
        let service = Arc::new(ScriptedService::failing());
        let mut analyzer = analyzer(service, 1);
        let chunk = Chunk::new(String::new(), Language::Python, None);

        let analysis = analyzer.analyze(&chunk, |_| {}).await;

        assert_eq!(analysis.failure_count(), 4);
        for kind in AnalysisKind::ALL {
            assert_eq!(analysis.outcome(kind).report_text(), kind.fallback_message());
        }
    }
}
