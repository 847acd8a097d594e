//! Shard Router
//!
//! Accepts a job, splits its text into words and fans one subtask per word out to
//! the worker pool. Each job gets its own aggregator; workers reply straight to it,
//! never back to the router, so the router holds no per-job state.

use super::aggregator::Aggregator;
use super::protocol::{AGGREGATOR_PATH, Job, Message, SubTask};
use super::ring::WorkerPool;
use crate::config::{ClusterConfig, EmptyJobPolicy};
use crate::error::ServiceFailure;
use crate::membership::tracker::TrackerHandle;
use crate::transport::fabric::{Mailbox, MessageFabric};
use crate::transport::types::Address;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Counters exposed by a running router.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    pub jobs_accepted: AtomicU64,
    pub jobs_rejected: AtomicU64,
    pub aggregators_created: AtomicU64,
    pub subtasks_dispatched: AtomicU64,
}

impl RouterMetrics {
    pub fn jobs_accepted(&self) -> u64 {
        self.jobs_accepted.load(Ordering::Relaxed)
    }

    pub fn jobs_rejected(&self) -> u64 {
        self.jobs_rejected.load(Ordering::Relaxed)
    }

    pub fn aggregators_created(&self) -> u64 {
        self.aggregators_created.load(Ordering::Relaxed)
    }

    pub fn subtasks_dispatched(&self) -> u64 {
        self.subtasks_dispatched.load(Ordering::Relaxed)
    }
}

pub struct ShardRouter {
    fabric: Arc<MessageFabric>,
    address: Address,
    pool: WorkerPool,
    /// Drives cluster-aware pools; `None` for a static pool.
    tracker: Option<TrackerHandle>,
    aggregation_timeout: Duration,
    empty_job_policy: EmptyJobPolicy,
    metrics: Arc<RouterMetrics>,
}

pub struct RouterHandle {
    pub address: Address,
    pub metrics: Arc<RouterMetrics>,
    task: tokio::task::JoinHandle<()>,
}

impl ShardRouter {
    pub fn spawn(
        fabric: Arc<MessageFabric>,
        address: Address,
        pool: WorkerPool,
        tracker: Option<TrackerHandle>,
        config: &ClusterConfig,
    ) -> anyhow::Result<RouterHandle> {
        let mailbox = fabric.register(address.clone())?;
        let metrics = Arc::new(RouterMetrics::default());

        let router = Self {
            fabric,
            address: address.clone(),
            pool,
            tracker,
            aggregation_timeout: config.aggregation_timeout,
            empty_job_policy: config.empty_job_policy,
            metrics: metrics.clone(),
        };

        let task = tokio::spawn(async move {
            router.run(mailbox).await;
        });

        Ok(RouterHandle {
            address,
            metrics,
            task,
        })
    }

    async fn run(mut self, mut mailbox: Mailbox) {
        tracing::info!("Shard router started at {}", self.address);

        while let Some(message) = mailbox.recv().await {
            match message {
                Message::Job { job, reply_to } => self.accept(job, reply_to),
                other => {
                    tracing::warn!(
                        "Router {} ignoring unexpected {} message",
                        self.address,
                        other.kind()
                    );
                }
            }
        }

        tracing::info!("Shard router at {} stopped", self.address);
    }

    fn accept(&mut self, job: Job, requester: Address) {
        let words = job.words();

        if words.is_empty() {
            self.metrics.jobs_rejected.fetch_add(1, Ordering::Relaxed);
            match self.empty_job_policy {
                EmptyJobPolicy::Ignore => {
                    tracing::warn!("Ignoring empty job from {}", requester);
                }
                EmptyJobPolicy::Reject => {
                    tracing::warn!("Rejecting empty job from {}", requester);
                    self.fabric
                        .send(&requester, Message::Reply(ServiceFailure::EmptyJob.into()));
                }
            }
            return;
        }

        if let Some(tracker) = &self.tracker {
            self.pool.sync_members(&tracker.members());
        }

        let aggregator = Address::new(self.address.node, AGGREGATOR_PATH).child(Uuid::new_v4());
        if let Err(e) = Aggregator::spawn(
            self.fabric.clone(),
            aggregator.clone(),
            words.len(),
            requester.clone(),
            self.aggregation_timeout,
        ) {
            tracing::error!("Failed to create aggregator for job from {}: {}", requester, e);
            return;
        }

        self.metrics.jobs_accepted.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .aggregators_created
            .fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            "Job from {} split into {} subtasks over {} workers",
            requester,
            words.len(),
            self.pool.routee_count()
        );

        for word in words {
            if self.pool.dispatch(&self.fabric, SubTask::for_word(word), &aggregator) {
                self.metrics
                    .subtasks_dispatched
                    .fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl RouterHandle {
    pub fn stop(&self, fabric: &MessageFabric) {
        fabric.unregister(&self.address);
        self.task.abort();
    }
}
