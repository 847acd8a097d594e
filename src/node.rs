//! Cluster Node
//!
//! Wires the components one cluster member runs:
//! - a membership tracker (one per process),
//! - a leader facade at the configured facade path,
//! - and, on nodes carrying the configured role, a shard router plus the local worker group.
//!
//! Endpoints are registered before the node announces itself on the membership bus,
//! so no peer can route to this node before it is ready to receive.

use crate::config::ClusterConfig;
use crate::dispatch::facade::{FacadeHandle, LeaderFacade};
use crate::dispatch::protocol::{ROUTER_PATH, WORKER_PATH};
use crate::dispatch::ring::{RouteeSource, WorkerPool};
use crate::dispatch::router::{RouterHandle, ShardRouter};
use crate::dispatch::worker::{Worker, WorkerHandle};
use crate::membership::bus::MembershipBus;
use crate::membership::tracker::{MembershipTracker, TrackerHandle};
use crate::membership::types::Node;
use crate::transport::fabric::MessageFabric;
use crate::transport::types::Address;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct ClusterNode {
    pub local: Node,
    pub tracker: TrackerHandle,
    pub facade: FacadeHandle,
    /// Present only on nodes carrying the compute role.
    pub router: Option<RouterHandle>,
    pub workers: Vec<WorkerHandle>,
    fabric: Arc<MessageFabric>,
    bus: Arc<MembershipBus>,
}

impl ClusterNode {
    pub async fn start(
        config: &ClusterConfig,
        bus: Arc<MembershipBus>,
        fabric: Arc<MessageFabric>,
        address: SocketAddr,
        roles: &[&str],
    ) -> Result<Self> {
        config.validate()?;
        let is_compute = roles.contains(&config.role.as_str());

        let tracker = MembershipTracker::start(bus.clone(), &config.role).await;

        let mut workers = Vec::new();
        let mut router = None;
        if is_compute {
            let parent = Address::new(address, WORKER_PATH);
            for i in 0..config.workers_per_node {
                workers.push(Worker::spawn(fabric.clone(), parent.child(i))?);
            }

            let pool = WorkerPool::new(RouteeSource::Cluster {
                worker_path: WORKER_PATH.to_string(),
                workers_per_node: config.workers_per_node,
            });
            router = Some(ShardRouter::spawn(
                fabric.clone(),
                Address::new(address, ROUTER_PATH),
                pool,
                Some(tracker.clone()),
                config,
            )?);
        }

        let facade = LeaderFacade::spawn(
            fabric.clone(),
            Address::new(address, config.facade_path.clone()),
            tracker.clone(),
        )?;

        let local = bus.join(address, roles.iter().copied()).await;

        tracing::info!(
            "Node {} up (age {}, {} workers, router: {})",
            address,
            local.age,
            workers.len(),
            router.is_some()
        );

        Ok(Self {
            local,
            tracker,
            facade,
            router,
            workers,
            fabric,
            bus,
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.local.address
    }

    pub fn facade_address(&self) -> &Address {
        &self.facade.address
    }

    /// Jobs this node's router has accepted; zero on non-compute nodes.
    pub fn jobs_accepted(&self) -> u64 {
        self.router
            .as_ref()
            .map(|router| router.metrics.jobs_accepted())
            .unwrap_or(0)
    }

    /// Leaves the cluster and stops every local component.
    pub async fn stop(self) {
        self.bus.leave(&self.local.address).await;

        self.facade.stop(&self.fabric);
        if let Some(router) = &self.router {
            router.stop(&self.fabric);
        }
        for worker in &self.workers {
            worker.stop(&self.fabric);
        }
        self.tracker.stop();

        tracing::info!("Node {} stopped", self.local.address);
    }
}
