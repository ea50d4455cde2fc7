//! Egress connection sampler
//!
//! Takes point-in-time snapshots of established outbound TCP connections
//! with process attribution, and ships them to an egress-server either
//! in-process (the server's poll scheduler) or over HTTP (the push agent
//! binary).

pub mod host;
pub mod resolver;
pub mod sampler;

pub use host::HostCtx;
pub use sampler::sample;
