//! End-to-end generation runs
//!
//! upload (if needed) → submit → poll → download → pick canonical mesh →
//! write `metadata.json`. Each stage only consumes the previous stage's
//! output. A remote FAIL is a normal outcome with a record; a timeout or any
//! transport error is an `Err` and leaves no record behind.

use crate::config::KilnConfig;
use crate::job::JobStatus;
use crate::materialize::{select_canonical_mesh, DownloadedFile};
use crate::poll::{poll_until_terminal, PollOutcome, PollPolicy};
use crate::provider::{JobProvider, JobSubmission, ViewImageUrl};
use crate::providers;
use crate::record::{RecordContext, RunRecord};
use crate::request::{GenerationInput, GenerationRequest};
use crate::upload::{create_uploader, AssetUploader};
use chrono::Local;
use kiln_core::{Clock, KilnError, Result, SystemClock};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Where a run writes and how it polls
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub policy: PollPolicy,
}

impl RunOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            policy: PollPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// What a finished run hands back to its caller
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub job_id: String,
    /// `Done` or `Fail`
    pub status: JobStatus,
    pub output_dir: PathBuf,
    pub files: Vec<DownloadedFile>,
    pub canonical: Option<PathBuf>,
    pub record_path: PathBuf,
    pub error_message: Option<String>,
    /// Time from submission to the end of the run
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Done
    }
}

/// Run one generation job to completion.
///
/// `uploader` is required when the request references local files.
pub fn generate_model(
    request: &GenerationRequest,
    options: &RunOptions,
    provider: &dyn JobProvider,
    uploader: Option<&dyn AssetUploader>,
    clock: &mut dyn Clock,
) -> Result<RunOutcome> {
    let input = request.input();
    let created_at = Local::now();
    info!(
        input_type = input.input_type(),
        views = request.views().len(),
        provider = provider.name(),
        "starting generation"
    );

    let submission = prepare_submission(request, uploader)?;
    let job = provider.submit(&submission)?;
    let submitted_at = clock.now();
    let ctx = RecordContext {
        job_id: job.id().to_string(),
        input_type: input.input_type().to_string(),
        input_value: input.input_value(),
        created_at,
    };

    let report = poll_until_terminal(provider, &job, &options.policy, &mut *clock)?;

    match report.outcome {
        PollOutcome::Done(result) => {
            let after_done = |e: KilnError, clock: &dyn Clock| {
                let elapsed = clock.now().saturating_sub(submitted_at);
                e.with_job_context(job.id(), elapsed.as_secs_f64(), JobStatus::Done.as_str())
            };
            let files = provider
                .download_result(&result, &options.output_dir)
                .map_err(|e| after_done(e, &*clock))?;
            let canonical = select_canonical_mesh(&files);
            let elapsed = clock.now().saturating_sub(submitted_at);
            info!(
                job_id = %job,
                files = files.len(),
                canonical = canonical.map(|f| f.name.as_str()).unwrap_or("none"),
                "result materialized"
            );

            let record = RunRecord::done(ctx, &files, canonical, elapsed.as_secs_f64());
            let record_path = record
                .write(&options.output_dir)
                .map_err(|e| after_done(e, &*clock))?;
            let canonical = canonical.map(|f| f.path.clone());

            Ok(RunOutcome {
                job_id: record.job_id,
                status: JobStatus::Done,
                output_dir: options.output_dir.clone(),
                files,
                canonical,
                record_path,
                error_message: None,
                elapsed,
            })
        }
        PollOutcome::Failed { message } => {
            let elapsed = clock.now().saturating_sub(submitted_at);
            tracing::warn!(job_id = %job, error = %message, "job failed");

            let record = RunRecord::failed(ctx, &message, elapsed.as_secs_f64());
            let record_path = record.write(&options.output_dir).map_err(|e| {
                e.with_job_context(job.id(), elapsed.as_secs_f64(), JobStatus::Fail.as_str())
            })?;

            Ok(RunOutcome {
                job_id: record.job_id,
                status: JobStatus::Fail,
                output_dir: options.output_dir.clone(),
                files: Vec::new(),
                canonical: None,
                record_path,
                error_message: Some(message),
                elapsed,
            })
        }
    }
}

/// Resolve every local file in the request to a URL
fn prepare_submission(
    request: &GenerationRequest,
    uploader: Option<&dyn AssetUploader>,
) -> Result<JobSubmission> {
    let mut submission = JobSubmission::default();

    let require_uploader = || {
        uploader.ok_or_else(|| {
            KilnError::Upload("local images need an uploader, none was configured".to_string())
        })
    };

    match request.input() {
        GenerationInput::Prompt(prompt) => submission.prompt = Some(prompt.clone()),
        GenerationInput::ImageUrl(url) => submission.image_url = Some(url.clone()),
        GenerationInput::Image(path) => {
            let url = require_uploader()?.upload_file(path)?;
            submission.image_url = Some(url);
        }
    }

    for view in request.views() {
        let image_url = require_uploader()?.upload_file(&view.path)?;
        submission.multi_view_images.push(ViewImageUrl {
            view: view.view,
            image_url,
        });
    }

    Ok(submission)
}

/// `base/YYYY-MM-DD_HH-MM-SS` for the current local time
pub fn timestamped_output_dir(base: &Path) -> PathBuf {
    base.join(Local::now().format(RUN_DIR_FORMAT).to_string())
}

/// Config-driven entry point: real provider, real uploader, wall clock
pub struct Generator {
    config: KilnConfig,
    provider: Box<dyn JobProvider>,
}

impl Generator {
    /// Build with the provider selected in `config`
    pub fn from_config(config: KilnConfig) -> Result<Self> {
        let provider = providers::create_provider(config.generation.provider, &config)?;
        Ok(Self { config, provider })
    }

    pub fn with_provider(config: KilnConfig, provider: Box<dyn JobProvider>) -> Self {
        Self { config, provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn generate(&self, request: &GenerationRequest, output_dir: &Path) -> Result<RunOutcome> {
        let uploader = if request.needs_upload() {
            Some(create_uploader(&self.config)?)
        } else {
            None
        };
        let options = RunOptions::new(output_dir).with_policy(PollPolicy::from_config(&self.config));
        let mut clock = SystemClock::new();
        generate_model(
            request,
            &options,
            self.provider.as_ref(),
            uploader.as_deref(),
            &mut clock,
        )
    }

    pub fn generate_from_prompt(&self, prompt: &str, output_dir: &Path) -> Result<RunOutcome> {
        self.generate(&GenerationRequest::from_prompt(prompt), output_dir)
    }

    pub fn generate_from_image(&self, image: &Path, output_dir: &Path) -> Result<RunOutcome> {
        self.generate(&GenerationRequest::from_image(image), output_dir)
    }

    pub fn generate_from_url(&self, image_url: &str, output_dir: &Path) -> Result<RunOutcome> {
        self.generate(&GenerationRequest::from_image_url(image_url), output_dir)
    }
}
