pub mod failover_event;
pub mod node;
pub mod resource_sample;
pub mod server;

pub use failover_event::{FailoverEvent, FailoverOutcome};
pub use node::{NewNode, Node, NodeCapabilities, NodeStatus, SshCredentials, TransportKind};
pub use resource_sample::{
    CpuTelemetry, DiskMount, DiskTelemetry, MemoryTelemetry, NetworkTelemetry, ResourceSample,
    ResourceSnapshot, SystemTelemetry,
};
pub use server::{Server, ServerCounts, ServerStatus};
