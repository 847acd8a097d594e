//! Distributed Word Statistics Cluster Library
//!
//! Cluster-aware job dispatch: a client submits a text, the job is routed to the
//! current leader (the oldest compute node), sharded word by word across a
//! consistent-hash worker pool, and the partial results are aggregated into a
//! mean word length within a fixed deadline.
//!
//! ## Architecture Modules
//! - **`membership`**: Role-filtered, age-ordered membership view and oldest-node leader selection.
//! - **`transport`**: Best-effort in-process messaging with explicit reply addressing.
//! - **`dispatch`**: Leader facade, shard router, workers and per-job aggregators.
//! - **`client`**: Periodic client driver, request/response helper and HTTP front end.
//! - **`node`**: Wiring of all components for one cluster member.
//! - **`config`** / **`error`**: Externally supplied settings and the failure taxonomy.
//!
//! Every component instance owns its state and handles its own mailbox one message
//! at a time; no locks guard component state.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod membership;
pub mod node;
pub mod transport;
