//! Fleet control plane: health monitoring, telemetry, placement, failover,
//! discovery, and the remote execution layer they share.
//!
//! Each service is an explicitly constructed value with its own `start`/
//! `shutdown` lifecycle; [`service::FleetServices`] wires them together.

pub mod balancer;
pub mod discovery;
pub mod error;
pub mod failover;
pub mod health;
pub mod remote;
pub mod resources;
pub mod service;

pub use error::{Error, Result};
pub use service::FleetServices;
