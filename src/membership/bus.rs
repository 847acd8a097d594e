//! In-process membership publisher.
//!
//! Stands in for the cluster membership protocol: it assigns join order, keeps the
//! authoritative member list and fans membership events out to subscribers.
//! Subscribers always receive a `Snapshot` first, followed by every event
//! published after it, with nothing lost in between.

use super::types::{MembershipEvent, Node};

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

const EVENT_BUFFER: usize = 1024;

struct BusState {
    members: BTreeMap<SocketAddr, Node>,
    next_age: u64,
}

pub struct MembershipBus {
    state: Mutex<BusState>,
    events: broadcast::Sender<MembershipEvent>,
}

/// A live subscription: the member set at subscription time plus the stream
/// of events published afterwards. Dropping it unsubscribes.
pub struct Subscription {
    pub snapshot: MembershipEvent,
    pub events: broadcast::Receiver<MembershipEvent>,
}

impl MembershipBus {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(EVENT_BUFFER)
    }

    /// A bus that buffers at most `capacity` unread events per subscriber.
    /// Subscribers falling further behind must re-subscribe.
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self {
            state: Mutex::new(BusState {
                members: BTreeMap::new(),
                next_age: 1,
            }),
            events,
        })
    }

    /// Admits a node, assigning it the next age in join order.
    ///
    /// Joining twice from the same address returns the existing member unchanged.
    pub async fn join<I, S>(&self, address: SocketAddr, roles: I) -> Node
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.members.get(&address) {
            tracing::debug!("Node {} already a member (age {})", address, existing.age);
            return existing.clone();
        }

        let node = Node::new(address, roles, state.next_age);
        state.next_age += 1;
        state.members.insert(address, node.clone());

        tracing::info!(
            "Node {} joined with roles {:?} (age {})",
            address,
            node.roles,
            node.age
        );

        // No receivers is fine: nobody is tracking yet.
        let _ = self.events.send(MembershipEvent::NodeUp(node.clone()));
        node
    }

    /// Removes a node. Returns the removed member, if it was present.
    pub async fn leave(&self, address: &SocketAddr) -> Option<Node> {
        let mut state = self.state.lock().await;
        let node = state.members.remove(address)?;

        tracing::info!("Node {} removed (age {})", address, node.age);
        let _ = self.events.send(MembershipEvent::NodeRemoved(node.clone()));

        Some(node)
    }

    /// Subscribes to membership changes.
    ///
    /// The snapshot and the receiver are taken under the same lock as every
    /// publish, so no event can fall between them.
    pub async fn subscribe(&self) -> Subscription {
        let state = self.state.lock().await;
        let events = self.events.subscribe();
        let snapshot = MembershipEvent::Snapshot(state.members.values().cloned().collect());

        Subscription { snapshot, events }
    }

    pub async fn members(&self) -> Vec<Node> {
        let state = self.state.lock().await;
        state.members.values().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}
