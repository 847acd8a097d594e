//! Leader Facade
//!
//! The single entry point for jobs on every node. It looks up the current leader in
//! the local membership tracker and forwards the job, untouched, to the leader's
//! shard router. The requester travels with the job so the eventual reply goes
//! straight back to the caller; the facade never sees it.
//!
//! With no leader in view the facade fails fast. A forwarded job that is lost in
//! transit is not detected here; the caller only learns of it through the
//! aggregation deadline or its own timeout.

use super::protocol::{Job, Message, ROUTER_PATH};
use crate::error::ServiceFailure;
use crate::membership::tracker::TrackerHandle;
use crate::transport::fabric::{Mailbox, MessageFabric};
use crate::transport::types::Address;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct LeaderFacade {
    fabric: Arc<MessageFabric>,
    address: Address,
    tracker: TrackerHandle,
    forwarded: Arc<AtomicU64>,
    unavailable: Arc<AtomicU64>,
}

pub struct FacadeHandle {
    pub address: Address,
    forwarded: Arc<AtomicU64>,
    unavailable: Arc<AtomicU64>,
    task: tokio::task::JoinHandle<()>,
}

impl LeaderFacade {
    pub fn spawn(
        fabric: Arc<MessageFabric>,
        address: Address,
        tracker: TrackerHandle,
    ) -> anyhow::Result<FacadeHandle> {
        let mailbox = fabric.register(address.clone())?;
        let forwarded = Arc::new(AtomicU64::new(0));
        let unavailable = Arc::new(AtomicU64::new(0));

        let facade = Self {
            fabric,
            address: address.clone(),
            tracker,
            forwarded: forwarded.clone(),
            unavailable: unavailable.clone(),
        };

        let task = tokio::spawn(async move {
            facade.run(mailbox).await;
        });

        Ok(FacadeHandle {
            address,
            forwarded,
            unavailable,
            task,
        })
    }

    async fn run(self, mut mailbox: Mailbox) {
        tracing::info!("Leader facade started at {}", self.address);

        while let Some(message) = mailbox.recv().await {
            match message {
                Message::Job { job, reply_to } => self.submit(job, reply_to),
                other => {
                    tracing::warn!(
                        "Facade {} ignoring unexpected {} message",
                        self.address,
                        other.kind()
                    );
                }
            }
        }
    }

    fn submit(&self, job: Job, requester: Address) {
        match self.tracker.current_leader() {
            None => {
                self.unavailable.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("No leader available, failing job from {}", requester);
                self.fabric.send(
                    &requester,
                    Message::Reply(ServiceFailure::NoLeaderAvailable.into()),
                );
            }
            Some(leader) => {
                self.forwarded.fetch_add(1, Ordering::Relaxed);
                let router = Address::new(leader.address, ROUTER_PATH);
                tracing::debug!("Forwarding job from {} to leader {}", requester, router);
                self.fabric.send(
                    &router,
                    Message::Job {
                        job,
                        reply_to: requester,
                    },
                );
            }
        }
    }
}

impl FacadeHandle {
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn unavailable(&self) -> u64 {
        self.unavailable.load(Ordering::Relaxed)
    }

    pub fn stop(&self, fabric: &MessageFabric) {
        fabric.unregister(&self.address);
        self.task.abort();
    }
}
