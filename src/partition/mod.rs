mod context;
mod isr;
mod leader_set;
mod partition;
mod registry;
mod replica;

pub use isr::IsrChangePublisher;
pub use isr::IsrPublishError;
pub use partition::Partition;
pub use partition::PartitionError;
pub use replica::Replica;

pub(crate) use context::PartitionContext;
pub(crate) use leader_set::LeaderSet;
pub(crate) use registry::PartitionRegistry;
