//! Entry points for the ingestion and connection collaborators.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use shareclip_models::{Job, JobId};
use shareclip_queue::{Dispatcher, EventBus, JobStore, StoreResult, Subscription, SubscriptionId};

use crate::metrics;

/// Handle shared with the HTTP layer.
///
/// Cheap to clone; every clone talks to the same store, dispatcher and bus
/// as the worker pool.
#[derive(Clone)]
pub struct TranscodeService {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    bus: Arc<EventBus>,
}

impl TranscodeService {
    pub fn new(store: Arc<dyn JobStore>, dispatcher: Arc<Dispatcher>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            dispatcher,
            bus,
        }
    }

    /// Record an uploaded file as a QUEUED job and wake a worker.
    ///
    /// The upload must already be at its input path.
    pub async fn enqueue(&self, id: &JobId, owner_id: &str) -> StoreResult<Job> {
        let job = self.store.enqueue(id, owner_id).await?;
        self.dispatcher.wake();
        metrics::record_job_enqueued();
        info!(job_id = %job.id, owner_id, "Job queued");
        Ok(job)
    }

    /// Open the live event channel for `user_id`, replacing any previous one.
    pub fn subscribe(&self, user_id: &str) -> Subscription {
        self.bus.subscribe(user_id)
    }

    /// Close subscription `id` unless a newer one has replaced it.
    pub fn unsubscribe(&self, user_id: &str, id: SubscriptionId) {
        self.bus.unsubscribe(user_id, id)
    }

    /// Wake a worker when QUEUED rows exist but no wake-up is pending.
    ///
    /// Rows inserted by another process never pass through [`Self::enqueue`].
    pub async fn wake_if_queued(&self) -> StoreResult<bool> {
        if self.dispatcher.pending() > 0 || self.store.next_queued().await?.is_none() {
            return Ok(false);
        }
        self.dispatcher.wake();
        Ok(true)
    }

    /// Call [`Self::wake_if_queued`] every `interval` until `shutdown` reads `true`.
    pub async fn poll_queue(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => match self.wake_if_queued().await {
                    Ok(true) => debug!("Found queued jobs, woke a worker"),
                    Ok(false) => {}
                    Err(e) => warn!("Queue poll failed: {}", e),
                },
                _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => break,
            }
        }
    }

    pub async fn job(&self, id: &JobId) -> StoreResult<Option<Job>> {
        self.store.find_by_id(id).await
    }

    /// Jobs uploaded by `owner_id`, newest first.
    pub async fn jobs_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Job>> {
        self.store.find_by_owner(owner_id).await
    }
}
