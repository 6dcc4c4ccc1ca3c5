//! # Job Orchestration Module
//!
//! Owns the queue of image-processing jobs and sequences the pipeline stages
//! per job: enhancement, text recognition, number extraction. Jobs are
//! processed strictly one at a time, in submission order — the recognition
//! engine is a shared, resource-heavy capability and concurrent invocations
//! risk exhausting it, so sequential processing is a correctness requirement
//! here, not a simplification.
//!
//! Every state change (Pending→Processing, progress updates, the terminal
//! transition) is written to the registry as it happens, so an observer
//! polling [`Orchestrator::snapshots`] sees the batch advance incrementally.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use crate::config::PipelineConfig;
use crate::enhancement;
use crate::errors::{error_logging, PipelineError, PipelineResult};
use crate::extraction::NumberExtractor;
use crate::recognition::{self, TextRecognizer};
use crate::telemetry;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque unique job identifier, stable for the job's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(u64);

/// Lifecycle state of one job; transitions are forward-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One input image handed to the orchestrator
#[derive(Debug, Clone)]
pub struct ImageFile {
    /// Original file name, kept for display and export metadata only
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Read-only view of a job exposed to rendering and export collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub source_name: String,
    pub state: JobState,
    /// Progress in [0, 100]; 0 while Pending, non-decreasing while
    /// Processing, 100 when Completed, last-known value when Failed
    pub progress: u8,
    pub recognized_text: Option<String>,
    /// Normalized mobile numbers, unique within the job, first-seen order
    pub numbers: Vec<String>,
    pub failure_reason: Option<String>,
}

/// Internal job record; mutated only by the orchestrator's sequential loop
#[derive(Debug)]
struct Job {
    id: JobId,
    source_name: String,
    state: JobState,
    progress: u8,
    recognized_text: Option<String>,
    numbers: Vec<String>,
    failure_reason: Option<String>,
    /// Input bytes, taken when processing starts and dropped afterwards
    input: Option<Vec<u8>>,
}

impl Job {
    fn new(file: ImageFile) -> Self {
        Self {
            id: JobId(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)),
            source_name: file.name,
            state: JobState::Pending,
            progress: 0,
            recognized_text: None,
            numbers: Vec::new(),
            failure_reason: None,
            input: Some(file.bytes),
        }
    }

    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            source_name: self.source_name.clone(),
            state: self.state,
            progress: self.progress,
            recognized_text: self.recognized_text.clone(),
            numbers: self.numbers.clone(),
            failure_reason: self.failure_reason.clone(),
        }
    }
}

/// Sequences pipeline stages over a queue of jobs, one job at a time
pub struct Orchestrator {
    engine: Arc<dyn TextRecognizer>,
    extractor: NumberExtractor,
    config: PipelineConfig,
    jobs: Mutex<Vec<Job>>,
    /// Held for the whole processing loop so overlapping
    /// [`process_pending`](Self::process_pending) callers run one after the
    /// other instead of driving the engine concurrently.
    processing: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator around a recognition engine.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] when the configuration is invalid.
    pub fn new(engine: Arc<dyn TextRecognizer>, config: PipelineConfig) -> PipelineResult<Self> {
        if let Err(e) = config.validate() {
            error_logging::log_config_error(&e, "pipeline");
            return Err(e);
        }
        Ok(Self {
            engine,
            extractor: NumberExtractor::new(),
            config,
            jobs: Mutex::new(Vec::new()),
            processing: tokio::sync::Mutex::new(()),
        })
    }

    /// Enqueue input images, truncating silently to the configured batch limit.
    ///
    /// One Pending job per accepted file is created in input order and is
    /// visible through [`snapshots`](Self::snapshots) immediately, before any
    /// processing starts, so a caller can render placeholders.
    pub fn submit(&self, files: Vec<ImageFile>) -> Vec<JobId> {
        let accepted = files.len().min(self.config.max_images);
        if files.len() > accepted {
            warn!(
                "Batch of {} files exceeds limit of {}; ignoring {} excess file(s)",
                files.len(),
                self.config.max_images,
                files.len() - accepted
            );
        }

        let mut jobs = self.jobs.lock();
        let mut ids = Vec::with_capacity(accepted);
        for file in files.into_iter().take(accepted) {
            let job = Job::new(file);
            ids.push(job.id);
            jobs.push(job);
        }
        info!("Enqueued {} job(s)", ids.len());
        ids
    }

    /// Process every Pending job, strictly sequentially, in submission order.
    ///
    /// A later job never starts before the previous one reaches a terminal
    /// state. Concurrent callers are serialized: a second caller waits until
    /// the running loop finishes, then drains whatever is still Pending.
    /// Per-job failures are recorded on the job and never abort the batch;
    /// this method itself has no error path. Returns the number of jobs
    /// processed by this call.
    pub async fn process_pending(&self) -> usize {
        let _processing = self.processing.lock().await;
        let mut processed = 0;

        loop {
            // Claim the next Pending job and move it to Processing in one
            // registry operation, taking the input bytes with it.
            let claimed = {
                let mut jobs = self.jobs.lock();
                jobs.iter_mut()
                    .find(|job| job.state == JobState::Pending)
                    .map(|job| {
                        job.state = JobState::Processing;
                        job.progress = 0;
                        (job.id, job.source_name.clone(), job.input.take())
                    })
            };

            let Some((id, source_name, input)) = claimed else {
                break;
            };

            self.process_job(id, &source_name, input)
                .instrument(telemetry::pipeline_span("process_job"))
                .await;
            processed += 1;
        }

        info!("Batch processing finished: {} job(s) processed", processed);
        processed
    }

    async fn process_job(&self, id: JobId, source_name: &str, input: Option<Vec<u8>>) {
        let start_time = std::time::Instant::now();
        info!(job_id = ?id, source = %source_name, "Processing job");

        let result = match input {
            Some(bytes) => self.run_stages(id, bytes).await,
            // A job without input bytes can only mean the registry was
            // tampered with between claim and processing.
            None => Err(PipelineError::Environment(
                "job input is no longer available".to_string(),
            )),
        };

        let mut jobs = self.jobs.lock();
        let Some(job) = jobs.iter_mut().find(|job| job.id == id) else {
            warn!(job_id = ?id, "Job vanished from registry mid-flight; dropping result");
            return;
        };

        match result {
            Ok((text, numbers)) => {
                job.state = JobState::Completed;
                job.progress = 100;
                job.recognized_text = Some(text);
                job.numbers = numbers;
                info!(
                    job_id = ?id,
                    source = %source_name,
                    numbers = job.numbers.len(),
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "Job completed"
                );
            }
            Err(err) => {
                error_logging::log_stage_error(
                    &err,
                    stage_of(&err),
                    source_name,
                    Some(start_time.elapsed()),
                );
                job.state = JobState::Failed;
                job.failure_reason = Some(err.to_string());
                // progress keeps its last-known value
            }
        }
    }

    async fn run_stages(&self, id: JobId, bytes: Vec<u8>) -> PipelineResult<(String, Vec<String>)> {
        enhancement::validate_raster(&bytes, self.config.max_image_bytes)?;
        let enhanced = enhancement::enhance(&bytes)?;

        let text = recognition::recognize_text(
            Arc::clone(&self.engine),
            &enhanced,
            &self.config,
            |fraction| self.set_progress(id, fraction),
        )
        .await?;

        let numbers = self.extractor.extract(&text);
        Ok((text, numbers))
    }

    /// Record a progress fraction for a Processing job, scaled to [0, 100].
    ///
    /// Monotonicity is enforced here: an observer never sees progress
    /// decrease while a job stays in Processing.
    fn set_progress(&self, id: JobId, fraction: f32) {
        let scaled = (fraction.clamp(0.0, 1.0) * 100.0).round() as u8;
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs
            .iter_mut()
            .find(|job| job.id == id && job.state == JobState::Processing)
        {
            job.progress = job.progress.max(scaled);
        }
    }

    /// Snapshot of one job, if it is still tracked
    pub fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        self.jobs
            .lock()
            .iter()
            .find(|job| job.id == id)
            .map(Job::snapshot)
    }

    /// Snapshots of all tracked jobs, in submission order
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        self.jobs.lock().iter().map(Job::snapshot).collect()
    }

    /// Merge extracted numbers across all jobs, in job order, deduplicated
    /// first-seen. Convenience for a combined export; the per-job lists are
    /// untouched.
    pub fn combined_numbers(&self) -> Vec<String> {
        let jobs = self.jobs.lock();
        let mut seen = std::collections::HashSet::new();
        let mut combined = Vec::new();
        for job in jobs.iter() {
            for number in &job.numbers {
                if seen.insert(number.clone()) {
                    combined.push(number.clone());
                }
            }
        }
        combined
    }

    /// Drop all tracked jobs. Collaborator action, typically bound to a
    /// "clear queue" control; in-flight state for already-claimed jobs is
    /// discarded when processing tries to publish it.
    pub fn clear(&self) {
        let mut jobs = self.jobs.lock();
        let dropped = jobs.len();
        jobs.clear();
        info!("Cleared job queue ({} job(s) dropped)", dropped);
    }
}

/// Map an error back to the pipeline stage it belongs to, for logging
fn stage_of(err: &PipelineError) -> &'static str {
    match err {
        PipelineError::Decode(_) => "enhancement",
        PipelineError::Environment(_) => "enhancement",
        PipelineError::Recognition(_) => "recognition",
        PipelineError::Config(_) => "configuration",
    }
}
