//! Membership Module
//!
//! Maintains each process's view of which cluster members are eligible to lead and
//! to host workers, and which of them is the leader.
//!
//! ## Core Mechanisms
//! - **Role filtering**: only members carrying the configured role enter the view.
//! - **Oldest-node leadership**: members are ordered by age (join order); the oldest leads.
//! - **Idempotent events**: `Snapshot` replaces the view, `NodeUp` ignores known addresses,
//!   `NodeRemoved` ignores unknown ones, so duplicated events are harmless.
//! - **Snapshot publishing**: the tracker owns its view alone and shares read-only copies.
//!
//! ## Submodules
//! - **`types`**: `Node` and `MembershipEvent`.
//! - **`view`**: The age-ordered, role-filtered view and its event handling.
//! - **`bus`**: In-process membership publisher standing in for the cluster protocol.
//! - **`tracker`**: The per-process tracker task and its handle.

pub mod bus;
pub mod tracker;
pub mod types;
pub mod view;
