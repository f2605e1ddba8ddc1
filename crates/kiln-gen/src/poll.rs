//! Poll loop: drives a submitted job to a terminal status
//!
//! `SUBMITTED → POLLING → {DONE, FAIL, TIMED_OUT}`. Each round sleeps the
//! current interval, measures elapsed time, polls once and grows the interval
//! by `multiplier` up to `max_interval`. The loop runs while elapsed time
//! since submission is below the timeout.

use crate::config::KilnConfig;
use crate::job::{JobHandle, JobResult, JobStatus, PollState};
use crate::provider::JobProvider;
use kiln_core::{Clock, KilnError, Result};
use std::time::Duration;
use tracing::{debug, info};

pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Shortest sleep between polls, whatever the configured interval or cap
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Message recorded when the service fails a job without saying why
pub const UNKNOWN_FAILURE: &str = "Unknown error";

/// Timing parameters of the poll loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub timeout: Duration,
    pub multiplier: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(crate::config::DEFAULT_POLL_INTERVAL_SECS),
            max_interval: Duration::from_secs(crate::config::DEFAULT_MAX_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &KilnConfig) -> Self {
        Self {
            initial_interval: config.poll_interval(),
            max_interval: config.max_poll_interval(),
            timeout: config.timeout(),
            multiplier: BACKOFF_MULTIPLIER,
        }
    }

    /// Effective cap. A zero cap is raised to `MIN_POLL_INTERVAL`.
    pub fn cap(&self) -> Duration {
        self.max_interval.max(MIN_POLL_INTERVAL)
    }

    /// First sleep, between `MIN_POLL_INTERVAL` and the cap
    pub fn first_interval(&self) -> Duration {
        self.initial_interval.max(MIN_POLL_INTERVAL).min(self.cap())
    }

    /// Interval after `current`. Never shrinks, never exceeds the cap.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let cap = self.cap();
        let current = current.max(MIN_POLL_INTERVAL).min(cap);
        current.mul_f64(self.multiplier.max(1.0)).min(cap).max(current)
    }
}

/// How a job left the poll loop
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The job finished; the result carries the downloadable files
    Done(JobResult),
    /// The service reported a terminal failure
    Failed { message: String },
}

/// Result of a completed poll loop
#[derive(Debug, Clone, PartialEq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub state: PollState,
    /// Number of `poll` calls made
    pub polls: u32,
    /// Time from submission to the last poll
    pub elapsed: Duration,
}

/// Poll `job` until it is DONE or FAIL, or the timeout elapses.
///
/// Elapsed time is measured from the moment this function is entered, which
/// callers make coincide with a successful submit. A transport error from a
/// single poll aborts the loop.
pub fn poll_until_terminal<C: Clock + ?Sized>(
    provider: &dyn JobProvider,
    job: &JobHandle,
    policy: &PollPolicy,
    clock: &mut C,
) -> Result<PollReport> {
    let started = clock.now();
    let mut state = PollState::Submitted;
    let mut interval = policy.first_interval();
    let mut elapsed = Duration::ZERO;
    let mut polls = 0u32;
    let mut last_status: Option<JobStatus> = None;

    info!(
        job_id = %job,
        timeout_secs = policy.timeout.as_secs(),
        "polling for completion"
    );

    while elapsed < policy.timeout {
        clock.sleep(interval);
        elapsed = clock.now().saturating_sub(started);

        let result = provider.poll(job).map_err(|e| {
            e.with_job_context(job.id(), elapsed.as_secs_f64(), &status_label(last_status))
        })?;
        polls += 1;
        info!(
            job_id = %job,
            elapsed_secs = elapsed.as_secs(),
            status = %result.status,
            "poll"
        );

        match result.status {
            JobStatus::Done => {
                transition(&mut state, PollState::Done, job);
                return Ok(PollReport {
                    outcome: PollOutcome::Done(result),
                    state,
                    polls,
                    elapsed,
                });
            }
            JobStatus::Fail => {
                transition(&mut state, PollState::Fail, job);
                let message = result
                    .error_message
                    .unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
                return Ok(PollReport {
                    outcome: PollOutcome::Failed { message },
                    state,
                    polls,
                    elapsed,
                });
            }
            status => {
                if state != PollState::Polling {
                    transition(&mut state, PollState::Polling, job);
                }
                last_status = Some(status);
            }
        }

        interval = policy.next_interval(interval);
    }

    transition(&mut state, PollState::TimedOut, job);
    Err(KilnError::JobTimeout {
        job_id: job.id().to_string(),
        timeout_secs: policy.timeout.as_secs(),
        elapsed_secs: elapsed.as_secs_f64(),
        last_status: status_label(last_status),
    })
}

fn status_label(status: Option<JobStatus>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "SUBMITTED".to_string())
}

fn transition(state: &mut PollState, next: PollState, job: &JobHandle) {
    debug!(job_id = %job, from = ?*state, to = ?next, "poll state");
    *state = next;
}
