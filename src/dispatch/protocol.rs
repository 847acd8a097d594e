//! Dispatch Protocol Definitions
//!
//! Defines the messages exchanged between the client, the leader facade, the shard
//! router, the workers and the per-job aggregators.
//!
//! Constants define the well-known endpoint paths every compute node registers.

use crate::transport::types::Address;
use serde::{Deserialize, Serialize};

/// Reason carried by every `Failure` reply.
pub const SERVICE_UNAVAILABLE: &str = "service unavailable, try again later";

/// Entry point on every node; forwards jobs to the current leader.
pub const FACADE_PATH: &str = "/user/statsFacade";
/// Shard router on every node; only the leader's instance receives jobs.
pub const ROUTER_PATH: &str = "/user/statsService";
/// Parent path of the local worker group (`/user/statsWorker/0`, `/1`, ...).
pub const WORKER_PATH: &str = "/user/statsWorker";
/// Parent path of transient per-job aggregators.
pub const AGGREGATOR_PATH: &str = "/temp/aggregator";
/// Parent path of transient reply endpoints created by `ask`.
pub const ASK_PATH: &str = "/temp/ask";

// --- HTTP Endpoints ---

/// Public endpoint for submitting a job.
pub const ENDPOINT_STATS: &str = "/stats";
/// Current role-filtered membership view of the node.
pub const ENDPOINT_CLUSTER_MEMBERS: &str = "/cluster/members";
/// Current leader as seen by the node.
pub const ENDPOINT_CLUSTER_LEADER: &str = "/cluster/leader";

/// A unit of work submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub text: String,
}

impl Job {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Splits the text on whitespace; each word becomes one subtask.
    pub fn words(&self) -> Vec<&str> {
        self.text.split_whitespace().collect()
    }
}

/// The single response a requester ever receives for a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum JobReply {
    Result { mean_word_length: f64 },
    Failure { reason: String },
}

impl JobReply {
    pub fn is_success(&self) -> bool {
        matches!(self, JobReply::Result { .. })
    }
}

/// One shard of a job. The shard key drives consistent-hash routing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubTask {
    pub shard_key: String,
    pub payload: String,
}

impl SubTask {
    pub fn for_word(word: &str) -> Self {
        Self {
            shard_key: word.to_string(),
            payload: word.to_string(),
        }
    }
}

/// Everything that travels through the messaging substrate.
///
/// - `Job`: client -> facade, facade -> leader's router. `reply_to` is the original requester.
/// - `SubTask`: router -> worker. `reply_to` is the job's aggregator.
/// - `SubTaskResult`: worker -> aggregator.
/// - `Reply`: aggregator/facade/router -> original requester.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Message {
    Job { job: Job, reply_to: Address },
    SubTask { task: SubTask, reply_to: Address },
    SubTaskResult { length: usize },
    Reply(JobReply),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Job { .. } => "Job",
            Message::SubTask { .. } => "SubTask",
            Message::SubTaskResult { .. } => "SubTaskResult",
            Message::Reply(_) => "Reply",
        }
    }
}
