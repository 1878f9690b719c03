//! Job Scheduler - step checkpoints, cancellable delays and keyed serialization
//!
//! Jobs are plain async functions: their steps are sequential awaits. What the
//! scheduler adds is
//! - a checkpoint before each named step that aborts once the handler is destroyed,
//! - a delay primitive that wakes early on destruction,
//! - single-flight execution per key, so concurrent requests share one job.

use crate::application::cancel::CancelToken;
use crate::domain::{new_job_id, JobId, JobKind, JobStep};
use crate::error::{HandlerError, Result};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Per-job execution context
#[derive(Debug, Clone)]
pub struct JobContext {
    id: JobId,
    kind: JobKind,
    token: CancelToken,
}

impl JobContext {
    pub fn new(kind: JobKind, token: CancelToken) -> Self {
        Self {
            id: new_job_id(),
            kind,
            token,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Equivalent of "should continue?" evaluated immediately before a step
    pub fn checkpoint(&self, step: JobStep) -> Result<()> {
        if self.token.is_cancelled() {
            debug!(
                job_id = %self.id,
                kind = %self.kind,
                step = %step,
                "Handler gone, aborting job"
            );
            return Err(HandlerError::NoResourceHandler);
        }
        debug!(job_id = %self.id, kind = %self.kind, step = %step, "Running step");
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleep for `duration` unless the handler is destroyed first
    pub async fn delay(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.token.cancelled() => {
                debug!(job_id = %self.id, kind = %self.kind, "Delay interrupted by handler destruction");
                Err(HandlerError::NoResourceHandler)
            }
        }
    }
}

type SharedJob<T> = Shared<BoxFuture<'static, Result<T>>>;

struct InflightJob<T> {
    job: SharedJob<T>,
    // Set by the job's own task, so completion is visible even with no waiter left
    done: Arc<AtomicBool>,
}

/// Sets the done flag when the job task ends, including by panic
struct MarkDone(Arc<AtomicBool>);

impl Drop for MarkDone {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Keyed single-flight runner
///
/// A job submitted under a key while another job with the same key is still
/// running is not started; the caller joins the running one and receives the
/// same outcome.
pub struct JobScheduler<T> {
    label: String,
    token: CancelToken,
    inflight: Mutex<HashMap<String, InflightJob<T>>>,
}

impl<T> JobScheduler<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(label: impl Into<String>, token: CancelToken) -> Self {
        Self {
            label: label.into(),
            token,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Context for a new job bound to this scheduler's cancellation token
    pub fn context(&self, kind: JobKind) -> JobContext {
        JobContext::new(kind, self.token.clone())
    }

    /// Run the job built by `make_job` under `key`, or join the one already running
    ///
    /// The job runs on its own task: it completes even if every waiting
    /// caller is dropped.
    pub async fn run_serialized<F, Fut>(&self, key: &str, make_job: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().await;
            let running = inflight
                .get(key)
                .filter(|entry| !entry.done.load(Ordering::Acquire))
                .map(|entry| entry.job.clone());

            match running {
                Some(job) => {
                    debug!(handler = %self.label, key = %key, "Joining in-flight job");
                    job
                }
                None => {
                    debug!(handler = %self.label, key = %key, "Starting serialized job");
                    let done = Arc::new(AtomicBool::new(false));
                    let mark_done = MarkDone(Arc::clone(&done));
                    let fut = make_job();
                    let handle = tokio::spawn(async move {
                        let _mark_done = mark_done;
                        fut.await
                    });

                    let label = self.label.clone();
                    let job: SharedJob<T> = async move {
                        match handle.await {
                            Ok(result) => result,
                            Err(join_err) => {
                                error!(handler = %label, error = ?join_err, "Serialized job did not complete");
                                Err(HandlerError::Internal(format!(
                                    "serialized job did not complete: {join_err}"
                                )))
                            }
                        }
                    }
                    .boxed()
                    .shared();

                    inflight.insert(
                        key.to_string(),
                        InflightJob {
                            job: job.clone(),
                            done,
                        },
                    );
                    job
                }
            }
        };

        let result = shared.clone().await;

        // First waiter to finish retires the entry, unless a newer job replaced it
        let mut inflight = self.inflight.lock().await;
        if inflight
            .get(key)
            .is_some_and(|entry| entry.job.ptr_eq(&shared))
        {
            inflight.remove(key);
        }
        result
    }

    /// Number of keys with a job currently registered
    #[cfg(test)]
    pub(crate) async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
