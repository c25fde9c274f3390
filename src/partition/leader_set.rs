use crate::cluster::TopicPartition;
use crate::partition::Partition;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// LeaderSet holds the partitions the local broker currently leads. Callers that need to look
/// inside partitions take a `snapshot()` first, so this lock is never held across a partition lock.
pub(crate) struct LeaderSet {
    leaders: Mutex<HashMap<TopicPartition, Arc<Partition>>>,
}

impl LeaderSet {
    pub fn new() -> Self {
        LeaderSet {
            leaders: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, partition: Arc<Partition>) {
        self.leaders
            .lock()
            .expect("LeaderSet.add() mutex guard poison")
            .insert(partition.topic_partition().clone(), partition);
    }

    /// Returns true if the partition was in the set.
    pub fn remove(&self, topic_partition: &TopicPartition) -> bool {
        self.leaders
            .lock()
            .expect("LeaderSet.remove() mutex guard poison")
            .remove(topic_partition)
            .is_some()
    }

    pub fn contains(&self, topic_partition: &TopicPartition) -> bool {
        self.leaders
            .lock()
            .expect("LeaderSet.contains() mutex guard poison")
            .contains_key(topic_partition)
    }

    pub fn len(&self) -> usize {
        self.leaders.lock().expect("LeaderSet.len() mutex guard poison").len()
    }

    pub fn snapshot(&self) -> Vec<Arc<Partition>> {
        self.leaders
            .lock()
            .expect("LeaderSet.snapshot() mutex guard poison")
            .values()
            .cloned()
            .collect()
    }

    pub fn count_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&Partition) -> bool,
    {
        self.snapshot().iter().filter(|partition| predicate(partition.as_ref())).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{leader_and_isr, TestHarness};

    #[test]
    fn membership() {
        let harness = TestHarness::new(1);
        let orders = Arc::new(harness.partition("orders", 0, 2));
        let payments = Arc::new(harness.partition("payments", 0, 2));
        let leader_set = LeaderSet::new();

        leader_set.add(orders.clone());
        leader_set.add(orders.clone());
        leader_set.add(payments.clone());
        assert_eq!(2, leader_set.len());
        assert!(leader_set.contains(orders.topic_partition()));

        assert!(leader_set.remove(orders.topic_partition()));
        assert!(!leader_set.remove(orders.topic_partition()));
        assert!(!leader_set.contains(orders.topic_partition()));

        let snapshot = leader_set.snapshot();
        assert_eq!(1, snapshot.len());
        assert!(Arc::ptr_eq(&payments, &snapshot[0]));
    }

    #[test]
    fn count_under_replicated() {
        let harness = TestHarness::new(1);
        let full = Arc::new(harness.partition("orders", 0, 2));
        full.make_leader(&leader_and_isr(1, 0, &[1, 2], &[1, 2])).unwrap();
        let short = Arc::new(harness.partition("orders", 1, 2));
        short.make_leader(&leader_and_isr(1, 0, &[1], &[1, 2])).unwrap();

        let leader_set = LeaderSet::new();
        leader_set.add(full);
        leader_set.add(short);

        assert_eq!(1, leader_set.count_where(Partition::is_under_replicated));
        assert_eq!(2, leader_set.count_where(|partition| partition.is_leader_local()));
    }
}
