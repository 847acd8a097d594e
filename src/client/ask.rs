//! Request/response over the fire-and-forget fabric.
//!
//! Registers a one-off reply endpoint, sends the job with that endpoint as its
//! requester, and waits for the single reply. The endpoint is removed afterwards
//! whether or not a reply arrived, so a reply that shows up late is dropped.

use crate::dispatch::protocol::{ASK_PATH, Job, JobReply, Message};
use crate::transport::fabric::MessageFabric;
use crate::transport::types::Address;

use anyhow::{Result, anyhow};
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// Sends `job` to `to` and waits for its reply on a temporary endpoint owned by
/// the asking node `from`.
pub async fn ask(
    fabric: &MessageFabric,
    from: SocketAddr,
    to: &Address,
    job: Job,
    timeout: Duration,
) -> Result<JobReply> {
    let reply_to = Address::new(from, ASK_PATH).child(Uuid::new_v4());
    let mut mailbox = fabric.register(reply_to.clone())?;

    fabric.send(
        to,
        Message::Job {
            job,
            reply_to: reply_to.clone(),
        },
    );

    let outcome = tokio::time::timeout(timeout, async {
        while let Some(message) = mailbox.recv().await {
            match message {
                Message::Reply(reply) => return Some(reply),
                other => tracing::warn!("Ask endpoint ignoring {} message", other.kind()),
            }
        }
        None
    })
    .await;

    fabric.unregister(&reply_to);

    match outcome {
        Ok(Some(reply)) => Ok(reply),
        Ok(None) => Err(anyhow!("reply endpoint {} closed", reply_to)),
        Err(_) => Err(anyhow!("no reply from {} within {:?}", to, timeout)),
    }
}
