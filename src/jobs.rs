//! Job tracking.
//!
//! Every submission becomes a job that runs the pipeline in the
//! background. Jobs live in a [`JobStore`] keyed by id; each entry has its
//! own lock so updating one job never blocks reading another. Jobs are
//! kept for the lifetime of the process.

use crate::config::Config;
use crate::error::{JobError, PipelineError};
use crate::models::{
    AnalysisKind, AnalysisMode, AnalysisOutcome, JobResult, JobState, JobStatus, Language,
    ProgressStep, Report,
};
use crate::pipeline::{Pipeline, ProgressObserver};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Opaque job identifier (UUID v4).
pub type JobId = String;

/// Settings for the job tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Pipelines allowed to run at once; further jobs wait their turn.
    pub max_concurrent_jobs: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
        }
    }
}

impl From<&Config> for TrackerConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent_jobs: config.general.max_concurrent_jobs,
        }
    }
}

/// Mutable state of one job.
#[derive(Debug)]
struct Job {
    state: JobState,
    submitted_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    report: Option<Report>,
    error: Option<String>,
    /// Kinds that have produced at least one outcome.
    kinds_seen: BTreeSet<AnalysisKind>,
}

impl Job {
    fn new() -> Self {
        Self {
            state: JobState::Processing,
            submitted_at: Utc::now(),
            completed_at: None,
            report: None,
            error: None,
            kinds_seen: BTreeSet::new(),
        }
    }

    /// Furthest step whose kind has reported, or `Completed` once done.
    fn progress_step(&self) -> ProgressStep {
        if self.state == JobState::Completed {
            return ProgressStep::Completed;
        }
        self.kinds_seen
            .iter()
            .map(|kind| ProgressStep::for_kind(*kind))
            .max()
            .unwrap_or(ProgressStep::Submitting)
    }

    fn status(&self, id: &str) -> JobStatus {
        let step = self.progress_step();
        JobStatus {
            job_id: id.to_string(),
            state: self.state,
            progress_step: step,
            progress_percent: step.percent(),
            submitted_at: self.submitted_at,
            error: self.error.clone(),
        }
    }
}

fn lock(job: &Mutex<Job>) -> MutexGuard<'_, Job> {
    job.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Concurrency-safe map of jobs.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
}

impl JobStore {
    fn insert(&self, id: JobId, job: Arc<Mutex<Job>>) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, job);
    }

    fn get(&self, id: &str) -> Result<Arc<Mutex<Job>>, JobError> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Move a job from `expected` to `next`, applying `update` under the same lock.
    ///
    /// Returns `false` and changes nothing when the job is not in `expected`.
    fn compare_and_swap<F>(
        &self,
        id: &str,
        expected: JobState,
        next: JobState,
        update: F,
    ) -> Result<bool, JobError>
    where
        F: FnOnce(&mut Job),
    {
        let entry = self.get(id)?;
        let mut job = lock(&entry);
        if job.state != expected {
            return Ok(false);
        }
        job.state = next;
        update(&mut job);
        Ok(true)
    }

    /// Record the outcome of a job's pipeline run.
    fn finish(&self, id: &str, outcome: Result<Report, PipelineError>) -> Result<bool, JobError> {
        match outcome {
            Ok(report) => self.compare_and_swap(id, JobState::Processing, JobState::Completed, |job| {
                job.completed_at = Some(Utc::now());
                job.report = Some(report);
            }),
            Err(err) => self.compare_and_swap(id, JobState::Processing, JobState::Failed, |job| {
                job.completed_at = Some(Utc::now());
                job.error = Some(err.to_string());
            }),
        }
    }
}

/// Progress observer recording which kinds a job has produced.
struct JobProgress {
    job: Arc<Mutex<Job>>,
}

impl ProgressObserver for JobProgress {
    fn on_outcome(&self, _chunk_index: usize, outcome: &AnalysisOutcome) {
        lock(&self.job).kinds_seen.insert(outcome.analysis_kind);
    }
}

/// Accepts submissions and runs them in the background.
pub struct JobTracker {
    pipeline: Arc<Pipeline>,
    store: Arc<JobStore>,
    permits: Arc<Semaphore>,
}

impl JobTracker {
    pub fn new(pipeline: Arc<Pipeline>, config: TrackerConfig) -> Self {
        Self {
            pipeline,
            store: Arc::new(JobStore::default()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Submit code for analysis and return its job id immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, code: String, language: Language, mode: AnalysisMode) -> JobId {
        let id = Uuid::new_v4().to_string();
        let job = Arc::new(Mutex::new(Job::new()));
        // The entry exists before the background task starts.
        self.store.insert(id.clone(), job.clone());

        info!(
            "Submitted job {} ({} code, {} characters, {} mode)",
            id,
            language,
            code.chars().count(),
            mode
        );

        let pipeline = self.pipeline.clone();
        let store = self.store.clone();
        let permits = self.permits.clone();
        let job_id = id.clone();

        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            debug!("Job {} started", job_id);

            let observer = Arc::new(JobProgress { job });
            let outcome = pipeline.run(&code, language, mode, observer).await;

            match &outcome {
                Ok(report) => info!(
                    "Job {} completed: {} chunks, {} failed analyses",
                    job_id, report.metadata.chunks_analyzed, report.metadata.failed_outcomes
                ),
                Err(err) => error!("Job {} failed: {}", job_id, err),
            }

            if let Err(err) = store.finish(&job_id, outcome) {
                error!("Could not record outcome of job {}: {}", job_id, err);
            }
        });

        id
    }

    /// Current status of a job.
    pub fn status(&self, id: &str) -> Result<JobStatus, JobError> {
        let entry = self.store.get(id)?;
        let job = lock(&entry);
        Ok(job.status(id))
    }

    /// Report of a completed job.
    pub fn result(&self, id: &str) -> Result<JobResult, JobError> {
        let entry = self.store.get(id)?;
        let job = lock(&entry);

        match (&job.report, job.completed_at) {
            (Some(report), Some(completed_at)) if job.state == JobState::Completed => Ok(JobResult {
                job_id: id.to_string(),
                report: report.clone(),
                completed_at,
            }),
            _ => Err(JobError::NotReady {
                id: id.to_string(),
                state: job.state,
            }),
        }
    }

    /// Poll a job until it reaches a terminal state.
    ///
    /// `on_poll` sees every status observed along the way.
    pub async fn wait<F>(&self, id: &str, interval: Duration, mut on_poll: F) -> Result<JobStatus, JobError>
    where
        F: FnMut(&JobStatus),
    {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        loop {
            ticker.tick().await;
            let status = self.status(id)?;
            on_poll(&status);
            if status.state.is_terminal() {
                return Ok(status);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{BrokenConnector, ScriptedService, StaticConnector};
    use crate::llm::{ClientConfig, ServiceConnector};
    use crate::pipeline::PipelineConfig;
    use crate::segmenter::SegmenterConfig;

    const POLL: Duration = Duration::from_millis(10);

    fn tracker_with(connector: Arc<dyn ServiceConnector>, max_jobs: usize) -> JobTracker {
        let pipeline = Pipeline::new(
            connector,
            PipelineConfig {
                concurrency: 2,
                segmenter: SegmenterConfig::default(),
                client: ClientConfig {
                    max_retries: 1,
                    initial_retry_delay: Duration::from_millis(5),
                },
            },
        );
        JobTracker::new(
            Arc::new(pipeline),
            TrackerConfig {
                max_concurrent_jobs: max_jobs,
            },
        )
    }

    fn tracker(service: ScriptedService) -> JobTracker {
        tracker_with(Arc::new(StaticConnector(Arc::new(service))), 2)
    }

    #[tokio::test]
    async fn test_single_function_completes() {
        let tracker = tracker(ScriptedService::echo());
        let id = tracker.submit("def f(x): return x+1".to_string(), Language::Python, AnalysisMode::Full);

        let mut states = Vec::new();
        let status = tracker.wait(&id, POLL, |s| states.push(s.state)).await.unwrap();

        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.progress_step, ProgressStep::Completed);
        assert_eq!(status.progress_percent, 100);
        assert_eq!(states.last(), Some(&JobState::Completed));

        let result = tracker.result(&id).unwrap();
        assert_eq!(result.job_id, id);
        for kind in AnalysisKind::ALL {
            assert!(!result.report.section(kind).is_empty(), "{kind}");
        }
        assert!(result.completed_at >= status.submitted_at);
    }

    #[tokio::test]
    async fn test_empty_code_completes() {
        let tracker = tracker(ScriptedService::echo());
        let id = tracker.submit(String::new(), Language::Python, AnalysisMode::Full);

        let status = tracker.wait(&id, POLL, |_| {}).await.unwrap();
        assert_eq!(status.state, JobState::Completed);

        let report = tracker.result(&id).unwrap().report;
        assert_eq!(report.metadata.chunks_analyzed, 1);
        for kind in AnalysisKind::ALL {
            assert!(!report.section(kind).is_empty());
        }
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let tracker = tracker(ScriptedService::echo());

        assert_eq!(
            tracker.status("nope").unwrap_err(),
            JobError::NotFound("nope".to_string())
        );
        assert!(matches!(tracker.result("nope"), Err(JobError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_while_processing_is_not_ready() {
        let service = ScriptedService::echo().slow_on("def", Duration::from_secs(30));
        let tracker = tracker(service);
        let id = tracker.submit("def g(): pass".to_string(), Language::Python, AnalysisMode::Full);

        let status = tracker.status(&id).unwrap();
        assert_eq!(status.state, JobState::Processing);
        assert_eq!(status.progress_step, ProgressStep::Submitting);
        assert_eq!(status.progress_percent, 0);
        assert_eq!(
            tracker.result(&id).unwrap_err(),
            JobError::NotReady {
                id: id.clone(),
                state: JobState::Processing
            }
        );

        let status = tracker.wait(&id, Duration::from_secs(1), |_| {}).await.unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert!(tracker.result(&id).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_pending_while_processing() {
        let service = ScriptedService::echo().slow_on("def", Duration::from_secs(30));
        let tracker = tracker(service);
        let id = tracker.submit("def h(): pass".to_string(), Language::Python, AnalysisMode::Full);

        let mut polls = 0;
        let mut wait = tokio_test::task::spawn(tracker.wait(&id, Duration::from_secs(1), |_| polls += 1));
        tokio_test::assert_pending!(wait.poll());
        drop(wait);
        assert_eq!(polls, 1);
    }

    #[tokio::test]
    async fn test_client_init_failure_marks_job_failed() {
        let tracker = tracker_with(Arc::new(BrokenConnector), 2);
        let id = tracker.submit("x = 1".to_string(), Language::Other, AnalysisMode::Quick);

        let status = tracker.wait(&id, POLL, |_| {}).await.unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert!(status.error.unwrap().contains("no credentials"));
        assert_eq!(
            tracker.result(&id).unwrap_err(),
            JobError::NotReady {
                id: id.clone(),
                state: JobState::Failed
            }
        );
        // Failed jobs stay in the store.
        assert_eq!(tracker.status(&id).unwrap().state, JobState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_service_still_completes() {
        let tracker = tracker(ScriptedService::failing());
        let id = tracker.submit("def f(): pass".to_string(), Language::Python, AnalysisMode::Full);

        let status = tracker.wait(&id, POLL, |_| {}).await.unwrap();
        assert_eq!(status.state, JobState::Completed);
        let report = tracker.result(&id).unwrap().report;
        assert_eq!(report.metadata.failed_outcomes, 4);
        assert_eq!(report.semantic_analysis, "No semantic analysis available.");
    }

    #[tokio::test]
    async fn test_jobs_beyond_limit_queue_and_complete() {
        let connector = Arc::new(StaticConnector(Arc::new(ScriptedService::echo())));
        let tracker = tracker_with(connector, 1);

        let ids: Vec<_> = (0..3)
            .map(|i| tracker.submit(format!("def f{i}(): pass"), Language::Python, AnalysisMode::Full))
            .collect();
        assert_eq!(tracker.store().len(), 3);

        for id in &ids {
            let status = tracker.wait(id, POLL, |_| {}).await.unwrap();
            assert_eq!(status.state, JobState::Completed);
        }
        let unique: BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_progress_step_is_furthest_kind_seen() {
        let mut job = Job::new();
        assert_eq!(job.progress_step(), ProgressStep::Submitting);

        job.kinds_seen.insert(AnalysisKind::Semantic);
        assert_eq!(job.progress_step(), ProgressStep::Semantic);

        job.kinds_seen.insert(AnalysisKind::Correctness);
        assert_eq!(job.progress_step(), ProgressStep::Semantic);

        job.kinds_seen.insert(AnalysisKind::TestCases);
        assert_eq!(job.status("j").progress_percent, 100);

        job.state = JobState::Completed;
        assert_eq!(job.progress_step(), ProgressStep::Completed);
    }

    #[test]
    fn test_finish_only_from_processing() {
        let store = JobStore::default();
        store.insert("j".to_string(), Arc::new(Mutex::new(Job::new())));

        let first = store.finish("j", Err(PipelineError::ClientInit("down".to_string())));
        assert_eq!(first, Ok(true));

        let second = store.finish("j", Err(PipelineError::TaskJoin("late".to_string())));
        assert_eq!(second, Ok(false));
        assert_eq!(lock(&store.get("j").unwrap()).state, JobState::Failed);

        assert!(matches!(
            store.finish("missing", Err(PipelineError::TaskJoin("x".to_string()))),
            Err(JobError::NotFound(_))
        ));
    }
}
