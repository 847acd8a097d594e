//! In-Process Message Fabric
//!
//! Maps endpoint addresses to unbounded mailboxes. Sending never blocks and never
//! waits for the receiver; undeliverable messages are counted and dropped.

use super::types::Address;
use crate::dispatch::protocol::Message;
use crate::error::TransportError;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Receiving half of an endpoint. Owned by exactly one component instance.
pub type Mailbox = mpsc::UnboundedReceiver<Message>;

pub struct MessageFabric {
    /// Registered endpoints. `DashMap` lets many tasks send concurrently.
    endpoints: DashMap<Address, mpsc::UnboundedSender<Message>>,

    /// When set, every message is encoded and decoded with bincode on the way
    /// through, so nothing that cannot cross a node boundary sneaks into the protocol.
    serialize_messages: bool,

    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl MessageFabric {
    pub fn new(serialize_messages: bool) -> Arc<Self> {
        Arc::new(Self {
            endpoints: DashMap::new(),
            serialize_messages,
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Registers a new endpoint and hands back its mailbox.
    ///
    /// Fails if a live endpoint already owns the address. An address whose
    /// previous owner has gone away (mailbox dropped) is reclaimed.
    pub fn register(&self, address: Address) -> Result<Mailbox, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();

        match self.endpoints.entry(address.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_closed() {
                    return Err(TransportError::AddressInUse(address));
                }
                occupied.insert(tx);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(tx);
            }
        }

        tracing::trace!("Registered endpoint {}", address);
        Ok(rx)
    }

    pub fn unregister(&self, address: &Address) {
        if self.endpoints.remove(address).is_some() {
            tracing::trace!("Unregistered endpoint {}", address);
        }
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.endpoints
            .get(address)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Number of live endpoints whose path starts with `prefix`.
    pub fn count_endpoints(&self, prefix: &str) -> usize {
        self.endpoints
            .iter()
            .filter(|entry| entry.key().path.starts_with(prefix) && !entry.value().is_closed())
            .count()
    }

    /// Delivers a message to `to`, reporting why it could not be delivered.
    pub fn try_send(&self, to: &Address, message: Message) -> Result<(), TransportError> {
        let message = if self.serialize_messages {
            let encoded = bincode::serialize(&message)?;
            bincode::deserialize::<Message>(&encoded)?
        } else {
            message
        };

        let sender = self
            .endpoints
            .get(to)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::UnknownEndpoint(to.clone()))?;

        sender
            .send(message)
            .map_err(|_| TransportError::MailboxClosed(to.clone()))?;

        self.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Fire-and-forget send. Failures are logged and counted, never returned.
    pub fn send(&self, to: &Address, message: Message) {
        let kind = message.kind();
        if let Err(e) = self.try_send(to, message) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Dropped {} message: {}", kind, e);
        }
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
