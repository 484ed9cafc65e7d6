//! Asynchronous accrual pipeline.
//!
//! Newly accepted orders flow: handler → post queue → worker → upstream POST
//! → write channel → checker (batched) → store. An order accepted by the
//! upstream moves to PROCESSING and circulates on the check queue until a
//! poll reports PROCESSED or INVALID.
//!
//! All cross-component links are typed bounded channels with one direction
//! each; no component holds a reference to another. A single
//! `CancellationToken` is the shutdown broadcast. Upstream throttling is
//! reported once by the observing worker and fanned out by the coordinator
//! as sleep directives to the rest of the pool.

pub mod broker;
mod checker;
pub mod client;
mod coordinator;
mod poster;
pub mod queue;
pub mod store;
mod worker;

pub use client::{AccrualClient, UpstreamError};
pub use coordinator::{AccrualPipeline, PipelineHandle};
pub use queue::{MemoryQueue, OrderQueue};
pub use store::{AccrualStore, PgAccrualStore};
