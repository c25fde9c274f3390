//! Configuration and construction of a `ReplicaManager`.
mod options;
mod wiring;

pub use options::ReplicaManagerOptions;
pub use wiring::try_create_replica_manager;
pub use wiring::ReplicaManagerConfig;
pub use wiring::ReplicaManagerCreationError;
pub use wiring::ReplicaManagerDependencies;

pub(crate) use options::ReplicaManagerOptionsValidated;
