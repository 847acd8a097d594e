//! Word Length Worker
//!
//! Computes the length of a word and memoizes it. The function is pure, so cached
//! values never go stale and the cache is never invalidated. Growth is unbounded
//! for the lifetime of the worker.

use super::protocol::{Message, SubTask};
use crate::transport::fabric::{Mailbox, MessageFabric};
use crate::transport::types::Address;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-worker memo table. Owned by exactly one worker, never shared.
#[derive(Debug, Default)]
pub struct WordLengthCache {
    cache: HashMap<String, usize>,
    hits: u64,
    misses: u64,
}

impl WordLengthCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the length of `word` in characters, computing it on first sight.
    pub fn handle(&mut self, word: &str) -> usize {
        if let Some(&length) = self.cache.get(word) {
            self.hits += 1;
            return length;
        }

        let length = word.chars().count();
        self.cache.insert(word.to_string(), length);
        self.misses += 1;
        length
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// A worker endpoint: one mailbox, one cache, one task.
pub struct Worker {
    fabric: Arc<MessageFabric>,
    address: Address,
    cache: WordLengthCache,
    /// Published cache size, readable from outside the worker task.
    cache_size: Arc<AtomicUsize>,
}

impl Worker {
    /// Registers the worker at `address` and spawns its processing loop.
    pub fn spawn(
        fabric: Arc<MessageFabric>,
        address: Address,
    ) -> anyhow::Result<WorkerHandle> {
        let mailbox = fabric.register(address.clone())?;
        let cache_size = Arc::new(AtomicUsize::new(0));

        let worker = Self {
            fabric,
            address: address.clone(),
            cache: WordLengthCache::new(),
            cache_size: cache_size.clone(),
        };

        let task = tokio::spawn(async move {
            worker.run(mailbox).await;
        });

        Ok(WorkerHandle {
            address,
            cache_size,
            task,
        })
    }

    async fn run(mut self, mut mailbox: Mailbox) {
        tracing::debug!("Worker {} started", self.address);

        while let Some(message) = mailbox.recv().await {
            match message {
                Message::SubTask { task, reply_to } => self.handle_subtask(task, reply_to),
                other => {
                    tracing::warn!(
                        "Worker {} ignoring unexpected {} message",
                        self.address,
                        other.kind()
                    );
                }
            }
        }

        tracing::debug!(
            "Worker {} stopped ({} cached words, {} hits, {} misses)",
            self.address,
            self.cache.len(),
            self.cache.hits(),
            self.cache.misses()
        );
    }

    fn handle_subtask(&mut self, task: SubTask, reply_to: Address) {
        let length = self.cache.handle(&task.payload);
        self.cache_size.store(self.cache.len(), Ordering::Relaxed);

        tracing::trace!(
            "Worker {} computed '{}' -> {}",
            self.address,
            task.shard_key,
            length
        );

        self.fabric.send(&reply_to, Message::SubTaskResult { length });
    }
}

pub struct WorkerHandle {
    pub address: Address,
    cache_size: Arc<AtomicUsize>,
    task: tokio::task::JoinHandle<()>,
}

impl WorkerHandle {
    pub fn cache_size(&self) -> usize {
        self.cache_size.load(Ordering::Relaxed)
    }

    /// Stops the worker. Its cache is discarded with it.
    pub fn stop(&self, fabric: &MessageFabric) {
        fabric.unregister(&self.address);
        self.task.abort();
    }
}
