//! Client Driver
//!
//! Periodically submits a sample job and reports whatever comes back. The driver
//! tracks membership on its own so its set of candidate nodes stays current, and
//! it never retries: the next tick is the retry.

use crate::dispatch::protocol::{Job, JobReply, Message};
use crate::membership::tracker::TrackerHandle;
use crate::transport::fabric::{Mailbox, MessageFabric};
use crate::transport::types::Address;

use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Where each submission goes.
#[derive(Debug, Clone)]
pub enum ClientTarget {
    /// The facade of a uniformly random member of the tracker's view.
    RandomMember { facade_path: String },
    /// One stable facade address.
    Fixed(Address),
}

#[derive(Debug, Default)]
pub struct ClientStats {
    pub sent: AtomicU64,
    pub results: AtomicU64,
    pub failures: AtomicU64,
    pub skipped: AtomicU64,
}

pub struct ClientDriver {
    fabric: Arc<MessageFabric>,
    address: Address,
    tracker: TrackerHandle,
    target: ClientTarget,
    job: Job,
    interval: Duration,
    stats: Arc<ClientStats>,
    last_reply: watch::Sender<Option<JobReply>>,
}

pub struct ClientHandle {
    pub address: Address,
    pub stats: Arc<ClientStats>,
    last_reply: watch::Receiver<Option<JobReply>>,
    task: tokio::task::JoinHandle<()>,
}

impl ClientDriver {
    pub fn spawn(
        fabric: Arc<MessageFabric>,
        address: Address,
        tracker: TrackerHandle,
        target: ClientTarget,
        job: Job,
        interval: Duration,
    ) -> anyhow::Result<ClientHandle> {
        if interval.is_zero() {
            anyhow::bail!("client interval must be greater than zero");
        }
        let mailbox = fabric.register(address.clone())?;
        let stats = Arc::new(ClientStats::default());
        let (last_reply, last_reply_rx) = watch::channel(None);

        let driver = Self {
            fabric,
            address: address.clone(),
            tracker,
            target,
            job,
            interval,
            stats: stats.clone(),
            last_reply,
        };

        let task = tokio::spawn(async move {
            driver.run(mailbox).await;
        });

        Ok(ClientHandle {
            address,
            stats,
            last_reply: last_reply_rx,
            task,
        })
    }

    async fn run(self, mut mailbox: Mailbox) {
        tracing::info!(
            "Client driver {} submitting every {:?}",
            self.address,
            self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.submit(),
                message = mailbox.recv() => match message {
                    Some(Message::Reply(reply)) => self.report(reply),
                    Some(other) => {
                        tracing::warn!("Client ignoring unexpected {} message", other.kind());
                    }
                    None => break,
                },
            }
        }
    }

    /// Picks the destination for this tick, or `None` if there is nobody to ask.
    fn pick_target(&self) -> Option<Address> {
        match &self.target {
            ClientTarget::Fixed(address) => Some(address.clone()),
            ClientTarget::RandomMember { facade_path } => {
                let members = self.tracker.members();
                if members.is_empty() {
                    return None;
                }
                let idx = rand::thread_rng().gen_range(0..members.len());
                Some(Address::new(members[idx].address, facade_path.clone()))
            }
        }
    }

    fn submit(&self) {
        let Some(target) = self.pick_target() else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("No members in view yet, skipping submission");
            return;
        };

        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Submitting sample job to {}", target);
        self.fabric.send(
            &target,
            Message::Job {
                job: self.job.clone(),
                reply_to: self.address.clone(),
            },
        );
    }

    fn report(&self, reply: JobReply) {
        match &reply {
            JobReply::Result { mean_word_length } => {
                self.stats.results.fetch_add(1, Ordering::Relaxed);
                tracing::info!("Result: mean word length {:.3}", mean_word_length);
            }
            JobReply::Failure { reason } => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Failure: {}", reason);
            }
        }
        self.last_reply.send_replace(Some(reply));
    }
}

impl ClientHandle {
    pub fn last_reply(&self) -> Option<JobReply> {
        self.last_reply.borrow().clone()
    }

    /// Waits for the next reply the driver receives.
    pub async fn next_reply(&mut self) -> Option<JobReply> {
        self.last_reply.changed().await.ok()?;
        self.last_reply.borrow_and_update().clone()
    }

    pub fn sent(&self) -> u64 {
        self.stats.sent.load(Ordering::Relaxed)
    }

    pub fn stop(&self, fabric: &MessageFabric) {
        fabric.unregister(&self.address);
        self.task.abort();
    }
}
