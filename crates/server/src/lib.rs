//! Egress Server Library
//!
//! Exposes the event store, poll scheduler, policy cache, and API router
//! for in-process testing alongside the `egress-server` binary.

pub mod api;
pub mod config;
pub mod policy_cache;
pub mod scheduler;
pub mod store;

pub use api::{events_api_router, ApiState};
pub use config::ServerConfig;
pub use policy_cache::PolicyCache;
pub use scheduler::PollScheduler;
pub use store::{EventStore, LOCAL_SOURCE};
