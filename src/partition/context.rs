use crate::checkpoint::HighWatermarkCheckpoint;
use crate::cluster::BrokerId;
use crate::commitlog::LogFactory;
use crate::fetcher::FetcherManager;
use crate::partition::IsrChangePublisher;
use crate::replica_manager::ReplicaMetrics;
use crate::scheduler::Clock;
use std::sync::Arc;

/// Everything a `Partition` needs from the broker hosting it. Shared by all partitions.
pub(crate) struct PartitionContext {
    pub logger: slog::Logger,
    pub local_broker_id: BrokerId,
    pub clock: Arc<dyn Clock>,
    pub log_factory: Arc<dyn LogFactory>,
    pub fetcher_manager: Arc<dyn FetcherManager>,
    pub isr_publisher: Arc<dyn IsrChangePublisher>,
    pub checkpoint: Arc<HighWatermarkCheckpoint>,
    pub metrics: Arc<ReplicaMetrics>,
}
