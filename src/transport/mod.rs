//! Messaging Substrate
//!
//! A best-effort, in-process stand-in for the cluster's message transport.
//! Every component instance owns a mailbox registered under an [`types::Address`]
//! and processes its messages one at a time, so state is never shared or locked.
//!
//! ## Delivery Semantics
//! - **Best-effort**: a message to an unregistered or closed endpoint is dropped and logged.
//! - **No ordering across senders**: each mailbox is FIFO per sender only.
//! - **No deduplication**: the substrate never tracks what it has delivered.
//! - **Reply addressing**: requests carry an explicit `reply_to` address instead of
//!   relying on an implicit "current sender".

pub mod fabric;
pub mod types;

#[cfg(test)]
mod tests;
