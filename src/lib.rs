mod api;
mod checkpoint;
mod cluster;
mod commitlog;
mod fetcher;
mod partition;
mod replica_manager;
mod scheduler;
#[cfg(test)]
mod test_utils;

pub use api::try_create_replica_manager;
pub use api::ReplicaManagerConfig;
pub use api::ReplicaManagerCreationError;
pub use api::ReplicaManagerDependencies;
pub use api::ReplicaManagerOptions;
pub use checkpoint::CheckpointError;
pub use checkpoint::HighWatermarkCheckpoint;
pub use checkpoint::HIGH_WATERMARK_CHECKPOINT_FILE;
pub use cluster::BrokerEndpoint;
pub use cluster::BrokerId;
pub use cluster::ErrorCode;
pub use cluster::LeaderAndIsr;
pub use cluster::LeaderAndIsrBatch;
pub use cluster::LeaderAndIsrResponse;
pub use cluster::TopicPartition;
pub use commitlog::InMemoryLog;
pub use commitlog::InMemoryLogFactory;
pub use commitlog::Log;
pub use commitlog::LogFactory;
pub use fetcher::FetcherManager;
pub use partition::IsrChangePublisher;
pub use partition::IsrPublishError;
pub use partition::Partition;
pub use partition::PartitionError;
pub use partition::Replica;
pub use replica_manager::ReplicaManager;
pub use replica_manager::ReplicaManagerError;
pub use replica_manager::ReplicaMetrics;
pub use replica_manager::HIGH_WATERMARK_CHECKPOINT_JOB;
pub use replica_manager::ISR_EXPIRATION_JOB;
pub use replica_manager::UNKNOWN_REPLICATION_FACTOR;
pub use scheduler::mocked_clock;
pub use scheduler::Clock;
pub use scheduler::MockClock;
pub use scheduler::MockClockController;
pub use scheduler::RealClock;
pub use scheduler::ScheduledJob;
pub use scheduler::Scheduler;
pub use scheduler::TimerScheduler;

