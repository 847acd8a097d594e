use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;

/// Represents a single member of the cluster.
///
/// `age` is the member's position in the cluster's join order: lower is older.
/// Ages are unique and a node never changes once observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Node {
    pub address: SocketAddr,
    pub roles: BTreeSet<String>,
    pub age: u64,
}

impl Node {
    pub fn new<I, S>(address: SocketAddr, roles: I, age: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            address,
            roles: roles.into_iter().map(Into::into).collect(),
            age,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns true if this node joined the cluster before `other`.
    ///
    /// Ties on age are broken by address so the ordering is total.
    pub fn is_older_than(&self, other: &Node) -> bool {
        (self.age, self.address) < (other.age, other.address)
    }
}

/// Membership changes delivered by the cluster membership protocol.
///
/// - `Snapshot`: the complete current member set, sent first on every subscription.
/// - `NodeUp`: a node finished joining.
/// - `NodeRemoved`: a node left or was removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MembershipEvent {
    Snapshot(Vec<Node>),
    NodeUp(Node),
    NodeRemoved(Node),
}
