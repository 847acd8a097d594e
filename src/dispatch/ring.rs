//! Consistent-Hash Worker Pool
//!
//! Routes each subtask to a worker chosen by hashing its shard key onto an
//! AnchorHash ring. Identical keys reach the identical worker as long as the
//! routee set is unchanged, which keeps each word's memoized length on one worker.

use super::protocol::{Message, SubTask};
use crate::membership::types::Node;
use crate::transport::fabric::MessageFabric;
use crate::transport::types::Address;

use anchorhash::{AnchorHash, Builder};
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasherDefault, DefaultHasher};

type DeterministicHasher = BuildHasherDefault<DefaultHasher>;

/// Where the pool's routees come from.
#[derive(Debug, Clone)]
pub enum RouteeSource {
    /// A fixed set of worker endpoints.
    Static(Vec<Address>),
    /// `workers_per_node` workers under `worker_path` on every tracked member.
    Cluster {
        worker_path: String,
        workers_per_node: usize,
    },
}

pub struct WorkerPool {
    source: RouteeSource,
    anchor: Option<AnchorHash<u64, String, DeterministicHasher>>,
    routees: HashMap<String, Address>,
    current: BTreeSet<Address>,
}

impl WorkerPool {
    pub fn new(source: RouteeSource) -> Self {
        let mut pool = Self {
            source,
            anchor: None,
            routees: HashMap::new(),
            current: BTreeSet::new(),
        };

        if let RouteeSource::Static(routees) = &pool.source {
            let routees = routees.clone();
            pool.rebuild(routees);
        }

        pool
    }

    /// Recomputes cluster routees from the given members.
    ///
    /// Static pools ignore membership. The ring is rebuilt only when the set of
    /// routees actually changed.
    pub fn sync_members(&mut self, members: &[Node]) {
        let routees: Vec<Address> = match &self.source {
            RouteeSource::Static(_) => return,
            RouteeSource::Cluster {
                worker_path,
                workers_per_node,
            } => members
                .iter()
                .flat_map(|node| {
                    let parent = Address::new(node.address, worker_path.clone());
                    (0..*workers_per_node).map(move |i| parent.child(i))
                })
                .collect(),
        };

        self.rebuild(routees);
    }

    fn rebuild(&mut self, routees: Vec<Address>) {
        let next: BTreeSet<Address> = routees.into_iter().collect();
        if next == self.current {
            return;
        }

        tracing::info!(
            "Worker pool changed: {} -> {} routees",
            self.current.len(),
            next.len()
        );

        self.current = next;
        self.routees = self
            .current
            .iter()
            .map(|address| (address.to_string(), address.clone()))
            .collect();

        if self.current.is_empty() {
            self.anchor = None;
            return;
        }

        // BTreeSet iteration is sorted, so every router builds the same ring.
        let resources: Vec<String> = self.current.iter().map(|a| a.to_string()).collect();
        let capacity = resources.len().max(16).min(u16::MAX as usize) as u16;
        self.anchor = Some(
            Builder::with_hasher(DeterministicHasher::default())
                .with_resources(resources)
                .build(capacity),
        );
    }

    /// The worker responsible for `shard_key`, if the pool has any routees.
    pub fn route(&self, shard_key: &str) -> Option<&Address> {
        let anchor = self.anchor.as_ref()?;
        let resource = anchor.get_resource(Self::hash_key(shard_key))?;
        self.routees.get(resource)
    }

    /// Sends `task` to the worker owning its shard key, with replies to `reply_to`.
    ///
    /// Returns false if the pool is empty and the subtask was dropped.
    pub fn dispatch(&self, fabric: &MessageFabric, task: SubTask, reply_to: &Address) -> bool {
        match self.route(&task.shard_key) {
            Some(worker) => {
                let worker = worker.clone();
                fabric.send(
                    &worker,
                    Message::SubTask {
                        task,
                        reply_to: reply_to.clone(),
                    },
                );
                true
            }
            None => {
                tracing::warn!("No routees for subtask '{}', dropping it", task.shard_key);
                false
            }
        }
    }

    pub fn routee_count(&self) -> usize {
        self.current.len()
    }

    pub fn routees(&self) -> impl Iterator<Item = &Address> {
        self.current.iter()
    }

    /// FNV-1a of the key. Bucket choice also depends on the ring's hasher, which
    /// is only fixed for a given build.
    #[inline]
    fn hash_key(key: &str) -> u64 {
        const FNV_OFFSET: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x100000001b3;

        let mut hash = FNV_OFFSET;
        for byte in key.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workers(count: usize) -> Vec<Address> {
        let node = "127.0.0.1:2551".parse().unwrap();
        let parent = Address::new(node, "/user/statsWorker");
        (0..count).map(|i| parent.child(i)).collect()
    }

    #[test]
    fn test_key_hash_is_fnv1a() {
        assert_eq!(WorkerPool::hash_key(""), 0xcbf29ce484222325);
        assert_eq!(WorkerPool::hash_key("a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_empty_pool_routes_nothing() {
        let pool = WorkerPool::new(RouteeSource::Static(vec![]));

        assert_eq!(pool.routee_count(), 0);
        assert!(pool.route("anything").is_none());
    }

    #[test]
    fn test_same_key_same_worker() {
        let pool = WorkerPool::new(RouteeSource::Static(workers(5)));

        let first = pool.route("aa").cloned();
        assert!(first.is_some());
        for _ in 0..10 {
            assert_eq!(pool.route("aa").cloned(), first);
        }
    }

    #[test]
    fn test_keys_spread_over_workers() {
        let pool = WorkerPool::new(RouteeSource::Static(workers(4)));

        let used: BTreeSet<Address> = (0..1000)
            .filter_map(|i| pool.route(&format!("word-{}", i)).cloned())
            .collect();

        assert!(used.len() > 1, "keys should not all land on one worker");
    }

    #[test]
    fn test_routee_order_does_not_matter() {
        let mut reversed = workers(3);
        reversed.reverse();

        let pool1 = WorkerPool::new(RouteeSource::Static(workers(3)));
        let pool2 = WorkerPool::new(RouteeSource::Static(reversed));

        for i in 0..200 {
            let key = format!("key-{}", i);
            assert_eq!(pool1.route(&key), pool2.route(&key));
        }
    }

    #[test]
    fn test_cluster_source_expands_members() {
        let mut pool = WorkerPool::new(RouteeSource::Cluster {
            worker_path: "/user/statsWorker".to_string(),
            workers_per_node: 2,
        });
        let members = vec![
            Node::new("127.0.0.1:2551".parse().unwrap(), ["compute"], 1),
            Node::new("127.0.0.1:2552".parse().unwrap(), ["compute"], 2),
        ];

        pool.sync_members(&members);

        assert_eq!(pool.routee_count(), 4);
        assert!(
            pool.routees()
                .any(|a| a.to_string() == "stats://127.0.0.1:2552/user/statsWorker/1")
        );

        pool.sync_members(&members[..1]);
        assert_eq!(pool.routee_count(), 2);
    }
}
