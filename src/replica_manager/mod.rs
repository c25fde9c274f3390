mod metrics;
mod replica_manager;

pub use metrics::ReplicaMetrics;
pub use replica_manager::ReplicaManager;
pub use replica_manager::ReplicaManagerError;
pub use replica_manager::HIGH_WATERMARK_CHECKPOINT_JOB;
pub use replica_manager::ISR_EXPIRATION_JOB;
pub use replica_manager::UNKNOWN_REPLICATION_FACTOR;
