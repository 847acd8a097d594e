//! Job Dispatch Module
//!
//! Implements the leader-routed, sharded request pipeline:
//!
//! ```text
//! client -> LeaderFacade -> (leader's) ShardRouter -> N x Worker -> Aggregator -> client
//! ```
//!
//! ## Submodules
//! - **`protocol`**: Job/Result contract, the message enum and well-known endpoint paths.
//! - **`facade`**: Routes each job to the current leader, or fails fast without one.
//! - **`router`**: Splits a job into per-word subtasks and creates its aggregator.
//! - **`ring`**: Consistent-hash worker pool keyed on the subtask's shard key.
//! - **`worker`**: Computes and memoizes word lengths.
//! - **`aggregator`**: Collects shard results until completion or deadline.

pub mod aggregator;
pub mod facade;
pub mod protocol;
pub mod ring;
pub mod router;
pub mod worker;
