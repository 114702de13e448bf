use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::job_queries;
use crate::models::job::{Job, JobStatus};

/// Default interval before the second poll attempt; environments may pass
/// their own.
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(2000);

/// Upper bound on the delay between attempts.
const MAX_INTERVAL: Duration = Duration::from_millis(10_000);

/// Failures per job id before the circuit opens.
const CIRCUIT_THRESHOLD: u32 = 5;

/// Where the poller reads job rows from. The server implementation is
/// [`PgJobSource`]; tests inject fakes.
pub trait JobSource {
    fn fetch(&self, job_id: Uuid) -> impl std::future::Future<Output = Result<Job, String>> + Send;
}

/// Reads jobs straight from the job table.
pub struct PgJobSource {
    pool: PgPool,
}

impl PgJobSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl JobSource for PgJobSource {
    async fn fetch(&self, job_id: Uuid) -> Result<Job, String> {
        job_queries::get_job(&self.pool, job_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("job {job_id} not found"))
    }
}

/// Per-process poller bookkeeping: the in-flight set backing single-flight
/// and the per-job failure counters backing the circuit breaker. An
/// explicit struct rather than ambient statics, so tests construct
/// isolated instances. These maps are process-local optimizations, not
/// distributed locks.
#[derive(Default)]
pub struct PollerState {
    in_flight: Mutex<HashSet<Uuid>>,
    failures: Mutex<HashMap<Uuid, u32>>,
}

impl PollerState {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_begin(&self, job_id: Uuid) -> bool {
        self.in_flight.lock().unwrap().insert(job_id)
    }

    fn end(&self, job_id: Uuid) {
        self.in_flight.lock().unwrap().remove(&job_id);
    }

    pub fn failure_count(&self, job_id: Uuid) -> u32 {
        self.failures.lock().unwrap().get(&job_id).copied().unwrap_or(0)
    }

    fn record_failure(&self, job_id: Uuid) {
        *self.failures.lock().unwrap().entry(job_id).or_insert(0) += 1;
    }

    fn clear_failures(&self, job_id: Uuid) {
        self.failures.lock().unwrap().remove(&job_id);
    }
}

/// Releases the in-flight slot on every exit path.
struct InFlightGuard<'a> {
    state: &'a PollerState,
    job_id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.end(self.job_id);
    }
}

/// Next backoff delay: doubled, clamped to [`MAX_INTERVAL`].
fn next_interval(current: Duration) -> Duration {
    (current * 2).min(MAX_INTERVAL)
}

/// Client-side poll loop over the job store.
pub struct Poller<S: JobSource> {
    source: S,
    state: PollerState,
}

impl<S: JobSource> Poller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: PollerState::new(),
        }
    }

    /// Poll until the job reaches a terminal status, up to `max_attempts`
    /// reads spaced by exponential backoff. A `failed` job is still a
    /// successful read (the caller inspects `job.error`); exhaustion is the
    /// distinct `Timeout`, meaning "still processing, check back later".
    pub async fn poll(
        &self,
        job_id: Uuid,
        max_attempts: u32,
        initial_interval: Duration,
    ) -> Result<Job, PollError> {
        if !self.state.try_begin(job_id) {
            return Err(PollError::AlreadyPolling);
        }
        let _guard = InFlightGuard {
            state: &self.state,
            job_id,
        };

        if self.state.failure_count(job_id) >= CIRCUIT_THRESHOLD {
            return Err(PollError::CircuitOpen);
        }

        let mut interval = initial_interval;
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(interval).await;
                interval = next_interval(interval);
            }

            let job = match self.source.fetch(job_id).await {
                Ok(job) => job,
                Err(e) => {
                    // One failure per store error; retry belongs to a fresh
                    // poll() call, not this one.
                    self.state.record_failure(job_id);
                    return Err(PollError::Store(e));
                }
            };

            match job.status {
                JobStatus::Succeeded => {
                    self.state.clear_failures(job_id);
                    return Ok(job);
                }
                JobStatus::Failed => {
                    self.state.record_failure(job_id);
                    return Ok(job);
                }
                JobStatus::Queued | JobStatus::Running => {}
            }
        }

        Err(PollError::Timeout)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PollError {
    #[error("a poll for this job is already in flight")]
    AlreadyPolling,

    #[error("circuit open after repeated failures for this job")]
    CircuitOpen,

    #[error("job did not reach a terminal status within the allowed attempts")]
    Timeout,

    #[error("job store read failed: {0}")]
    Store(String),
}
