use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Location of a single endpoint (mailbox) in the cluster.
///
/// `node` identifies the cluster member hosting the endpoint and `path`
/// names the component on that node, e.g. `/user/statsService`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub node: SocketAddr,
    pub path: String,
}

impl Address {
    pub fn new(node: SocketAddr, path: impl Into<String>) -> Self {
        Self {
            node,
            path: path.into(),
        }
    }

    /// Derives a child endpoint path, e.g. `/user/statsWorker` + `2`.
    pub fn child(&self, name: impl fmt::Display) -> Self {
        Self {
            node: self.node,
            path: format!("{}/{}", self.path.trim_end_matches('/'), name),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stats://{}{}", self.node, self.path)
    }
}
