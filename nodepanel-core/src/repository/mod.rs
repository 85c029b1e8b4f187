pub mod failover_event;
pub mod node;
pub mod resource_sample;
pub mod server;

pub use failover_event::FailoverEventRepository;
pub use node::NodeRepository;
pub use resource_sample::ResourceSampleRepository;
pub use server::ServerRepository;
