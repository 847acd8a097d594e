//! Client Access Module
//!
//! Everything that submits jobs from outside the dispatch pipeline.
//!
//! - **`driver`**: Periodic sample-job submitter that follows membership on its own.
//! - **`ask`**: One request, one reply, with a timeout, on top of the fire-and-forget fabric.
//! - **`handlers`**: Axum HTTP handlers exposing job submission and the membership view.

pub mod ask;
pub mod driver;
pub mod handlers;
