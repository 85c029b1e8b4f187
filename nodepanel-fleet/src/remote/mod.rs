//! Remote execution channel: HTTP agent API and the SSH seam

pub mod agent;
pub mod manager;
pub mod ssh;

pub use agent::{AgentClient, AgentHealth, AgentServer};
pub use manager::{BulkReport, NodeManager, NodeOperation};
pub use ssh::{SshChannel, SshProbe, UnconfiguredSshChannel};
