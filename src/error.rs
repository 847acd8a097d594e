//! Error Types
//!
//! Two families of failure exist in the cluster:
//! - **`ServiceFailure`**: conditions reported back to the client as a `Failure` reply.
//!   They are expected steady-state outcomes, never fatal, and never retried internally.
//! - **`TransportError`**: problems delivering a message through the messaging substrate.
//!   Delivery is best-effort, so senders log these and move on.

use crate::dispatch::protocol::JobReply;
use crate::transport::types::Address;
use thiserror::Error;

/// Failures surfaced to the original requester of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceFailure {
    /// The membership view held no eligible node when the job was submitted.
    #[error("service unavailable, try again later")]
    NoLeaderAvailable,

    /// Fewer shard results than expected arrived before the aggregation deadline.
    #[error("service unavailable, try again later")]
    AggregationTimeout,

    /// The job carried no words and the router is configured to reject it.
    #[error("service unavailable, try again later")]
    EmptyJob,
}

impl From<ServiceFailure> for JobReply {
    fn from(failure: ServiceFailure) -> Self {
        JobReply::Failure {
            reason: failure.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("endpoint {0} is already registered")]
    AddressInUse(Address),

    #[error("no endpoint registered at {0}")]
    UnknownEndpoint(Address),

    #[error("mailbox at {0} is closed")]
    MailboxClosed(Address),

    #[error("failed to encode message: {0}")]
    Codec(#[from] bincode::Error),
}
