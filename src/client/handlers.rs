//! HTTP front end.
//!
//! Lets clients outside the cluster submit jobs and inspect the membership view.
//! Jobs enter through the local node's leader facade like any other submission.

use super::ask::ask;
use crate::dispatch::protocol::{ENDPOINT_CLUSTER_LEADER, ENDPOINT_CLUSTER_MEMBERS, ENDPOINT_STATS};
use crate::dispatch::protocol::{Job, JobReply, SERVICE_UNAVAILABLE};
use crate::membership::tracker::TrackerHandle;
use crate::membership::types::Node;
use crate::transport::fabric::MessageFabric;
use crate::transport::types::Address;

use axum::{
    Extension, Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct HttpState {
    pub fabric: Arc<MessageFabric>,
    /// The node serving HTTP; replies are addressed to it.
    pub local: SocketAddr,
    /// Facade the HTTP submissions go through.
    pub facade: Address,
    pub tracker: TrackerHandle,
    /// How long a request waits for its reply before giving up.
    pub reply_timeout: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitStatsRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembersResponse {
    pub leader: Option<Node>,
    pub members: Vec<Node>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route(ENDPOINT_STATS, post(handle_submit_stats))
        .route(ENDPOINT_CLUSTER_MEMBERS, get(handle_get_members))
        .route(ENDPOINT_CLUSTER_LEADER, get(handle_get_leader))
        .layer(Extension(state))
}

pub async fn handle_submit_stats(
    Extension(state): Extension<HttpState>,
    Json(req): Json<SubmitStatsRequest>,
) -> (StatusCode, Json<JobReply>) {
    let job = Job::new(req.text);

    match ask(&state.fabric, state.local, &state.facade, job, state.reply_timeout).await {
        Ok(reply) if reply.is_success() => (StatusCode::OK, Json(reply)),
        Ok(reply) => (StatusCode::SERVICE_UNAVAILABLE, Json(reply)),
        Err(e) => {
            tracing::warn!("Stats request got no reply: {}", e);
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(JobReply::Failure {
                    reason: SERVICE_UNAVAILABLE.to_string(),
                }),
            )
        }
    }
}

pub async fn handle_get_members(
    Extension(state): Extension<HttpState>,
) -> (StatusCode, Json<MembersResponse>) {
    let members = state.tracker.members();

    (
        StatusCode::OK,
        Json(MembersResponse {
            leader: members.first().cloned(),
            members: members.as_ref().clone(),
        }),
    )
}

pub async fn handle_get_leader(
    Extension(state): Extension<HttpState>,
) -> (StatusCode, Json<Option<Node>>) {
    match state.tracker.current_leader() {
        Some(leader) => (StatusCode::OK, Json(Some(leader))),
        None => (StatusCode::SERVICE_UNAVAILABLE, Json(None)),
    }
}
