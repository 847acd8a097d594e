//! Role-filtered, age-ordered membership view.
//!
//! Nodes are kept in a `BTreeMap` keyed by `(age, address)`, so the oldest
//! member is always the first entry. A secondary index on address enforces
//! that an address appears at most once.

use super::types::{MembershipEvent, Node};

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

type AgeKey = (u64, SocketAddr);

#[derive(Debug, Clone)]
pub struct MembershipView {
    role: String,
    by_age: BTreeMap<AgeKey, Node>,
    by_address: HashMap<SocketAddr, AgeKey>,
}

impl MembershipView {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            by_age: BTreeMap::new(),
            by_address: HashMap::new(),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Applies one membership event. Returns true if the view changed.
    ///
    /// Every event is idempotent: re-delivering it leaves the view as it was.
    pub fn apply(&mut self, event: MembershipEvent) -> bool {
        match event {
            MembershipEvent::Snapshot(members) => self.replace(members),
            MembershipEvent::NodeUp(node) => self.insert(node),
            MembershipEvent::NodeRemoved(node) => self.remove(&node.address),
        }
    }

    fn replace(&mut self, members: Vec<Node>) -> bool {
        let before: Vec<AgeKey> = self.by_age.keys().copied().collect();

        self.by_age.clear();
        self.by_address.clear();
        for node in members {
            self.insert(node);
        }

        before.len() != self.by_age.len() || !before.iter().eq(self.by_age.keys())
    }

    fn insert(&mut self, node: Node) -> bool {
        if !node.has_role(&self.role) || self.by_address.contains_key(&node.address) {
            return false;
        }

        let key = (node.age, node.address);
        self.by_address.insert(node.address, key);
        self.by_age.insert(key, node);
        true
    }

    fn remove(&mut self, address: &SocketAddr) -> bool {
        match self.by_address.remove(address) {
            Some(key) => {
                self.by_age.remove(&key);
                true
            }
            None => false,
        }
    }

    /// The oldest member, or `None` if the view is empty.
    pub fn leader(&self) -> Option<&Node> {
        self.by_age.values().next()
    }

    /// Members in ascending age order.
    pub fn members(&self) -> impl Iterator<Item = &Node> {
        self.by_age.values()
    }

    pub fn contains(&self, address: &SocketAddr) -> bool {
        self.by_address.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.by_age.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_age.is_empty()
    }
}
