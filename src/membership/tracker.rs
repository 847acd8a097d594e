//! Membership Tracker
//!
//! One tracker runs per process. It subscribes to the membership bus, owns the
//! role-filtered [`MembershipView`] exclusively, and after every change publishes an
//! immutable, age-ordered member list through a `watch` channel. Consumers read the
//! latest list without waiting on the tracker.

use super::bus::{MembershipBus, Subscription};
use super::types::{MembershipEvent, Node};
use super::view::MembershipView;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};

/// Members in ascending age order; the first entry is the leader.
pub type MemberList = Arc<Vec<Node>>;

enum TrackerCommand {
    Stop,
}

pub struct MembershipTracker {
    bus: Arc<MembershipBus>,
    view: MembershipView,
    subscription: Subscription,
    published: watch::Sender<MemberList>,
    commands: mpsc::UnboundedReceiver<TrackerCommand>,
    resyncs: Arc<AtomicU64>,
}

/// Cheap, cloneable read access to a running tracker.
#[derive(Clone)]
pub struct TrackerHandle {
    members: watch::Receiver<MemberList>,
    commands: mpsc::UnboundedSender<TrackerCommand>,
    resyncs: Arc<AtomicU64>,
}

impl MembershipTracker {
    /// Subscribes to `bus` and spawns the tracker loop.
    ///
    /// A stopped tracker cannot be resumed; starting a new one re-subscribes and
    /// rebuilds the view from a fresh snapshot.
    pub async fn start(bus: Arc<MembershipBus>, role: &str) -> TrackerHandle {
        let subscription = bus.subscribe().await;
        let (published, members) = watch::channel(Arc::new(Vec::new()));
        let (command_tx, commands) = mpsc::unbounded_channel();
        let resyncs = Arc::new(AtomicU64::new(0));

        let mut tracker = Self {
            bus,
            view: MembershipView::new(role),
            subscription,
            published,
            commands,
            resyncs: resyncs.clone(),
        };

        let snapshot = tracker.subscription.snapshot.clone();
        tracker.apply(snapshot);

        tracing::info!(
            "Membership tracker started for role '{}' ({} members)",
            role,
            tracker.view.len()
        );

        tokio::spawn(async move {
            tracker.run().await;
        });

        TrackerHandle {
            members,
            commands: command_tx,
            resyncs,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(TrackerCommand::Stop) | None => break,
                },
                event = self.subscription.events.recv() => match event {
                    Ok(event) => self.apply(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Membership tracker lagged by {} events, resubscribing",
                            skipped
                        );
                        self.resubscribe().await;
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("Membership bus closed");
                        break;
                    }
                },
            }
        }

        tracing::info!("Membership tracker for role '{}' unsubscribed", self.view.role());
    }

    async fn resubscribe(&mut self) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
        self.subscription = self.bus.subscribe().await;
        let snapshot = self.subscription.snapshot.clone();
        self.apply(snapshot);
    }

    fn apply(&mut self, event: MembershipEvent) {
        tracing::debug!("Applying membership event: {:?}", event);

        let previous_leader = self.view.leader().map(|node| node.address);
        if !self.view.apply(event) {
            return;
        }

        let current_leader = self.view.leader().map(|node| node.address);
        if previous_leader != current_leader {
            match current_leader {
                Some(address) => tracing::info!("Leader is now {}", address),
                None => tracing::warn!("No eligible leader for role '{}'", self.view.role()),
            }
        }

        self.published
            .send_replace(Arc::new(self.view.members().cloned().collect()));
    }
}

impl TrackerHandle {
    /// The oldest role-matching member, or `None`.
    pub fn current_leader(&self) -> Option<Node> {
        self.members.borrow().first().cloned()
    }

    pub fn members(&self) -> MemberList {
        self.members.borrow().clone()
    }

    pub fn contains(&self, address: &SocketAddr) -> bool {
        self.members
            .borrow()
            .iter()
            .any(|node| &node.address == address)
    }

    /// Waits until the published member list satisfies `predicate`.
    ///
    /// Returns false if the tracker stopped first.
    pub async fn wait_until<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&[Node]) -> bool,
    {
        let mut members = self.members.clone();
        members
            .wait_for(|list| predicate(list.as_slice()))
            .await
            .is_ok()
    }

    pub fn stop(&self) {
        let _ = self.commands.send(TrackerCommand::Stop);
    }

    /// Times the tracker fell behind the bus and rebuilt its view from a snapshot.
    pub fn resyncs(&self) -> u64 {
        self.resyncs.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}
