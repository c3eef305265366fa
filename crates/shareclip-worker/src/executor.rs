//! Worker pool.
//!
//! A fixed number of workers each run one job at a time. A worker prefers
//! jobs from the recovery queue, then the oldest QUEUED job, and otherwise
//! sleeps on the dispatcher until the ingestion path signals new work.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use shareclip_media::Transcoder;
use shareclip_models::{Job, JobStatus};
use shareclip_queue::{Dispatcher, EventBus, JobStore, RecoveryQueue, StoreResult};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics;
use crate::pipeline::{JobOutcome, Pipeline};
use crate::retry::FailureTracker;

/// Consecutive store failures logged before suppression.
const MAX_LOGGED_STORE_FAILURES: u32 = 5;

/// Pool of transcode workers sharing one store, dispatcher and event bus.
pub struct WorkerPool {
    config: Arc<WorkerConfig>,
    store: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    recovery: Arc<RecoveryQueue>,
    transcoder: Arc<dyn Transcoder>,
    pipeline: Arc<Pipeline>,
    shutdown: watch::Receiver<bool>,
}

impl WorkerPool {
    /// Create a pool. Workers stop claiming once `shutdown` reads `true`.
    pub fn new(
        config: Arc<WorkerConfig>,
        store: Arc<dyn JobStore>,
        dispatcher: Arc<Dispatcher>,
        bus: Arc<EventBus>,
        transcoder: Arc<dyn Transcoder>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let recovery = Arc::new(RecoveryQueue::with_capacity(config.recovery_capacity));
        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&config),
            Arc::clone(&store),
            bus,
            Arc::clone(&transcoder),
        ));

        Self {
            config,
            store,
            dispatcher,
            recovery,
            transcoder,
            pipeline,
            shutdown,
        }
    }

    /// Queue every job left PROCESSING by a previous run.
    pub async fn recover(&self) -> WorkerResult<usize> {
        let interrupted = self.store.find_by_status(JobStatus::Processing).await?;
        let count = interrupted.len();

        for job in interrupted {
            debug!(job_id = %job.id, "Queued interrupted job for recovery");
            self.recovery.push(job.id);
        }

        if count > 0 {
            info!("Recovering {} interrupted job(s)", count);
            metrics::record_jobs_recovered(count);
        }
        Ok(count)
    }

    /// Prepare the transcoder, recover interrupted jobs and run the workers
    /// until shutdown.
    pub async fn run(self) -> WorkerResult<()> {
        self.transcoder.prepare().await?;
        self.recover().await?;

        let workers = self.config.encoder.workers;
        info!("Starting {} worker(s)", workers);

        let handles: Vec<_> = (0..workers)
            .map(|index| {
                let worker = Worker {
                    index,
                    store: Arc::clone(&self.store),
                    dispatcher: Arc::clone(&self.dispatcher),
                    recovery: Arc::clone(&self.recovery),
                    pipeline: Arc::clone(&self.pipeline),
                    retry_delay: self.config.store_retry_delay,
                    shutdown: self.shutdown.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        let all_workers = join_all(handles);
        tokio::pin!(all_workers);

        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = &mut all_workers => {
                info!("All workers exited");
                return Ok(());
            }
            _ = shutdown.wait_for(|stop| *stop) => {
                info!("Shutdown signal received, waiting for workers");
            }
        }

        match tokio::time::timeout(self.config.shutdown_timeout, all_workers).await {
            Ok(_) => info!("Worker pool stopped"),
            Err(_) => warn!(
                "Workers still busy after {:?}, abandoning them",
                self.config.shutdown_timeout
            ),
        }
        Ok(())
    }
}

/// State owned by one worker task.
struct Worker {
    index: usize,
    store: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    recovery: Arc<RecoveryQueue>,
    pipeline: Arc<Pipeline>,
    retry_delay: std::time::Duration,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        debug!(worker = self.index, "Worker started");
        let mut failures = FailureTracker::new("Job claim", MAX_LOGGED_STORE_FAILURES);
        // Set when the last dispatcher unit was already taken by `wait`
        let mut woken = false;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.next_job(woken).await {
                Ok(Some(job)) => {
                    failures.record_success();
                    woken = false;
                    let outcome = self.pipeline.run(&job, self.index).await;
                    debug!(worker = self.index, job_id = %job.id, ?outcome, "Job done");
                    if outcome == JobOutcome::Cancelled {
                        break;
                    }
                }
                Ok(None) => {
                    failures.record_success();
                    tokio::select! {
                        _ = self.dispatcher.wait() => woken = true,
                        changed = self.shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    failures.record_failure(&e);
                    woken = false;
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => {}
                        changed = self.shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        debug!(worker = self.index, "Worker stopped");
    }

    /// Find the next job and make sure it is PROCESSING.
    async fn next_job(&self, woken: bool) -> StoreResult<Option<Job>> {
        if let Some(job) = self.next_recovered().await? {
            metrics::record_job_claimed("recovery");
            return Ok(Some(job));
        }

        let claimed = self.store.claim_next_queued().await?;
        if claimed.is_some() {
            if !woken {
                self.dispatcher.consume();
            }
            metrics::record_job_claimed("queue");
        }
        Ok(claimed)
    }

    /// Pop recovery entries until one still needs processing.
    async fn next_recovered(&self) -> StoreResult<Option<Job>> {
        while let Some(id) = self.recovery.pop() {
            match self.store.find_by_id(&id).await {
                Ok(Some(job)) if job.status == JobStatus::Processing => return Ok(Some(job)),
                Ok(Some(job)) => {
                    debug!(job_id = %id, status = %job.status, "Skipping recovered job, no longer processing");
                }
                Ok(None) => debug!(job_id = %id, "Skipping recovered job, no longer exists"),
                Err(e) => {
                    self.recovery.push(id);
                    return Err(e);
                }
            }
        }
        Ok(None)
    }
}
