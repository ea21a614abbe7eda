//! Pipeline orchestration.
//!
//! One run segments a submission, analyzes every chunk concurrently and
//! merges the per-chunk outcomes into a [`Report`]. Chunk-level failures
//! end up in the report as fallback text; only failures that prevent the
//! run as a whole are returned as errors.

use crate::analysis::{failed_outcomes, merge_kind, ChunkAnalyzer};
use crate::config::Config;
use crate::error::PipelineError;
use crate::llm::{AnalysisClient, ClientConfig, ServiceConnector};
use crate::models::{
    AnalysisKind, AnalysisMode, AnalysisOutcome, Chunk, Language, Report, ReportMetadata,
};
use crate::segmenter::{Segmenter, SegmenterConfig};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Smallest chunk size the deep profile shrinks to.
const DEEP_MIN_CHUNK_SIZE: usize = 1000;

/// Settings for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Chunks analyzed at the same time.
    pub concurrency: usize,
    pub segmenter: SegmenterConfig,
    pub client: ClientConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            segmenter: SegmenterConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            concurrency: config.general.concurrency,
            segmenter: SegmenterConfig::from(&config.segmenter),
            client: ClientConfig::from(&config.model),
        }
    }
}

impl PipelineConfig {
    /// Settings adjusted for an analysis mode.
    ///
    /// quick doubles the chunk size and allows at most one retry; deep
    /// halves the chunk size and adds two retries.
    pub fn for_mode(&self, mode: AnalysisMode) -> Self {
        let mut config = self.clone();
        let size = self.segmenter.max_chunk_size;

        match mode {
            AnalysisMode::Quick => {
                config.segmenter.max_chunk_size = size.saturating_mul(2);
                config.client.max_retries = self.client.max_retries.min(1);
            }
            AnalysisMode::Full => {}
            AnalysisMode::Deep => {
                config.segmenter.max_chunk_size = (size / 2).max(DEEP_MIN_CHUNK_SIZE.min(size));
                config.client.max_retries = self.client.max_retries.saturating_add(2);
            }
        }

        config
    }
}

/// Receives every finished (chunk, kind) outcome while a run is in progress.
pub trait ProgressObserver: Send + Sync {
    fn on_outcome(&self, chunk_index: usize, outcome: &AnalysisOutcome);
}

/// Segments, analyzes and merges submissions.
pub struct Pipeline {
    connector: Arc<dyn ServiceConnector>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(connector: Arc<dyn ServiceConnector>, config: PipelineConfig) -> Self {
        Self { connector, config }
    }

    /// Run the full pipeline over `code`.
    pub async fn run(
        &self,
        code: &str,
        language: Language,
        mode: AnalysisMode,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<Report, PipelineError> {
        let start = Instant::now();
        let config = self.config.for_mode(mode);

        let service = self
            .connector
            .connect()
            .map_err(|e| PipelineError::ClientInit(e.to_string()))?;

        let segmenter = Segmenter::new(config.segmenter.clone())?;
        let mut chunks = segmenter.segment(code, language);
        if chunks.is_empty() {
            warn!("Segmenter produced no chunks, analyzing the whole input");
            chunks.push(Chunk::new(code.to_string(), language, None));
        }

        let total = chunks.len();
        info!(
            "Analyzing {} chunks ({} mode, up to {} at a time)",
            total, mode, config.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));

        // Each worker gets its own client so no session is shared.
        let handles: Vec<_> = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let service = service.clone();
                let semaphore = semaphore.clone();
                let observer = observer.clone();
                let client_config = config.client.clone();

                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    debug!("Analyzing chunk {}/{}", index + 1, total);

                    let mut analyzer = ChunkAnalyzer::new(AnalysisClient::new(service, client_config));
                    let analysis = analyzer
                        .analyze(&chunk, |outcome| observer.on_outcome(index, outcome))
                        .await;

                    debug!(
                        "Chunk {}/{} finished with {} failed analyses",
                        index + 1,
                        total,
                        analysis.failure_count()
                    );
                    analysis
                })
            })
            .collect();

        // join_all keeps spawn order, which is chunk order.
        let mut analyses = Vec::with_capacity(total);
        for joined in join_all(handles).await {
            analyses.push(joined.map_err(|e| PipelineError::TaskJoin(e.to_string()))?);
        }

        let failed = failed_outcomes(&analyses);
        if failed > 0 {
            warn!("{} of {} analyses fell back to placeholder text", failed, total * 4);
        }
        info!("Merging results from {} chunks", total);

        Ok(Report {
            metadata: ReportMetadata {
                language,
                mode,
                model_used: service.model_name().to_string(),
                chunks_analyzed: analyses.len(),
                failed_outcomes: failed,
                duration_seconds: start.elapsed().as_secs_f64(),
            },
            semantic_analysis: merge_kind(&analyses, AnalysisKind::Semantic),
            correctness_analysis: merge_kind(&analyses, AnalysisKind::Correctness),
            edge_cases: merge_kind(&analyses, AnalysisKind::EdgeCases),
            test_cases: merge_kind(&analyses, AnalysisKind::TestCases),
        })
    }
}
