//! Per-Job Result Aggregator
//!
//! One aggregator exists per in-flight job. It collects word lengths from the
//! workers and replies to the original requester exactly once:
//!
//! ```text
//!              all results in            deadline elapsed
//! Completed  <---------------- Collecting ----------------> TimedOut
//! (Result)                                                  (Failure)
//! ```
//!
//! After the terminal transition the aggregator unregisters its endpoint and its
//! task ends, which also drops the pending deadline timer. Late results are
//! dropped by the fabric with no effect.
//!
//! Completion is count-based. A duplicated worker reply is counted like any
//! other, so duplicates can complete a job early with a skewed mean.

use super::protocol::{JobReply, Message};
use crate::error::ServiceFailure;
use crate::transport::fabric::{Mailbox, MessageFabric};
use crate::transport::types::Address;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationState {
    Collecting,
    Completed,
    TimedOut,
}

/// The state owned by one aggregator for the lifetime of one job.
#[derive(Debug)]
pub struct PendingAggregation {
    expected: usize,
    results: Vec<usize>,
    requester: Address,
    state: AggregationState,
}

impl PendingAggregation {
    pub fn new(expected: usize, requester: Address) -> Self {
        Self {
            expected,
            results: Vec::with_capacity(expected),
            requester,
            state: AggregationState::Collecting,
        }
    }

    /// Records one shard result. Returns the reply once the last expected result
    /// arrives; results after a terminal transition are ignored.
    pub fn record(&mut self, length: usize) -> Option<JobReply> {
        if self.is_terminal() {
            return None;
        }

        self.results.push(length);
        if self.results.len() < self.expected {
            return None;
        }

        self.state = AggregationState::Completed;
        let sum: usize = self.results.iter().sum();
        Some(JobReply::Result {
            mean_word_length: sum as f64 / self.expected as f64,
        })
    }

    /// Handles the deadline. Returns a failure reply if still collecting.
    pub fn expire(&mut self) -> Option<JobReply> {
        if self.is_terminal() {
            return None;
        }

        self.state = AggregationState::TimedOut;
        Some(ServiceFailure::AggregationTimeout.into())
    }

    pub fn is_terminal(&self) -> bool {
        self.state != AggregationState::Collecting
    }

    pub fn state(&self) -> AggregationState {
        self.state
    }

    pub fn received(&self) -> usize {
        self.results.len()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn requester(&self) -> &Address {
        &self.requester
    }
}

pub struct Aggregator {
    fabric: Arc<MessageFabric>,
    address: Address,
    pending: PendingAggregation,
    deadline: Instant,
}

impl Aggregator {
    /// Registers a new aggregator at `address` and starts its deadline.
    ///
    /// The endpoint is registered before this returns, so subtasks may be
    /// dispatched with `address` as their reply target immediately.
    pub fn spawn(
        fabric: Arc<MessageFabric>,
        address: Address,
        expected: usize,
        requester: Address,
        timeout: Duration,
    ) -> anyhow::Result<tokio::task::JoinHandle<AggregationState>> {
        let mailbox = fabric.register(address.clone())?;

        let aggregator = Self {
            fabric,
            address,
            pending: PendingAggregation::new(expected, requester),
            deadline: Instant::now() + timeout,
        };

        Ok(tokio::spawn(aggregator.run(mailbox)))
    }

    async fn run(mut self, mut mailbox: Mailbox) -> AggregationState {
        tracing::debug!(
            "Aggregator {} collecting {} results for {}",
            self.address,
            self.pending.expected(),
            self.pending.requester()
        );

        let deadline = sleep_until(self.deadline);
        tokio::pin!(deadline);

        let reply = loop {
            tokio::select! {
                // Results already queued win over a deadline firing at the same time.
                biased;
                message = mailbox.recv() => match message {
                    Some(Message::SubTaskResult { length }) => {
                        if let Some(reply) = self.pending.record(length) {
                            break Some(reply);
                        }
                    }
                    Some(other) => {
                        tracing::warn!(
                            "Aggregator {} ignoring unexpected {} message",
                            self.address,
                            other.kind()
                        );
                    }
                    None => break None,
                },
                _ = &mut deadline => {
                    tracing::warn!(
                        "Aggregator {} timed out with {}/{} results",
                        self.address,
                        self.pending.received(),
                        self.pending.expected()
                    );
                    break self.pending.expire();
                }
            }
        };

        // Dispose before replying so nothing else is accepted.
        self.fabric.unregister(&self.address);
        drop(mailbox);

        if let Some(reply) = reply {
            tracing::debug!("Aggregator {} replying {:?}", self.address, reply);
            self.fabric
                .send(self.pending.requester(), Message::Reply(reply));
        }

        self.pending.state()
    }
}
