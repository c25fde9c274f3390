use crate::cluster::{BrokerEndpoint, TopicPartition};

/// FetcherManager owns the fetch threads that pull data from leaders on behalf of local follower
/// replicas. The replica manager only decides which partition is fetched from where.
pub trait FetcherManager: Send + Sync {
    /// Starts fetching `topic_partition` from `leader`, beginning at `initial_offset`. Replaces any
    /// existing fetcher for the partition.
    fn add_fetcher(&self, topic_partition: &TopicPartition, initial_offset: u64, leader: &BrokerEndpoint);

    /// Stops fetching `topic_partition`. No-op if it is not being fetched.
    fn remove_fetcher(&self, topic_partition: &TopicPartition);

    fn shutdown(&self);
}
