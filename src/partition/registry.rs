use crate::cluster::TopicPartition;
use crate::partition::context::PartitionContext;
use crate::partition::Partition;
use dashmap::DashMap;
use std::sync::Arc;

/// Every partition the local broker hosts, keyed by topic and partition number.
pub(crate) struct PartitionRegistry {
    partitions: DashMap<TopicPartition, Arc<Partition>>,
    context: Arc<PartitionContext>,
}

impl PartitionRegistry {
    pub fn new(context: Arc<PartitionContext>) -> Self {
        PartitionRegistry {
            partitions: DashMap::new(),
            context,
        }
    }

    /// Racing callers for the same key all get the instance that was inserted first.
    pub fn get_or_create(&self, topic: &str, partition_id: i32, replication_factor: i32) -> Arc<Partition> {
        let topic_partition = TopicPartition::new(topic, partition_id);
        if let Some(existing) = self.partitions.get(&topic_partition) {
            return Arc::clone(existing.value());
        }

        // The shard stays write-locked until `entry` is dropped, so the insert is the only check.
        let entry = self
            .partitions
            .entry(topic_partition.clone())
            .or_insert_with(|| Arc::new(Partition::new(topic_partition, replication_factor, self.context.clone())));
        Arc::clone(entry.value())
    }

    pub fn get(&self, topic: &str, partition_id: i32) -> Option<Arc<Partition>> {
        self.partitions
            .get(&TopicPartition::new(topic, partition_id))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, topic: &str, partition_id: i32) -> Option<Arc<Partition>> {
        self.partitions
            .remove(&TopicPartition::new(topic, partition_id))
            .map(|(_, partition)| partition)
    }

    pub fn all(&self) -> Vec<Arc<Partition>> {
        self.partitions.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}
