use crate::api::{try_create_replica_manager, ReplicaManagerConfig, ReplicaManagerDependencies};
use crate::checkpoint::HighWatermarkCheckpoint;
use crate::cluster::{BrokerEndpoint, BrokerId, LeaderAndIsr, TopicPartition};
use crate::commitlog::InMemoryLogFactory;
use crate::fetcher::FetcherManager;
use crate::partition::{IsrChangePublisher, IsrPublishError, Partition, PartitionContext};
use crate::replica_manager::{ReplicaManager, ReplicaMetrics};
use crate::scheduler::{mocked_clock, MockClock, MockClockController, ScheduledJob, Scheduler};
use crate::ReplicaManagerOptions;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

pub fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

pub fn broker_ids(ids: &[i32]) -> BTreeSet<BrokerId> {
    ids.iter().copied().map(BrokerId::new).collect()
}

pub fn endpoint(id: i32) -> BrokerEndpoint {
    BrokerEndpoint {
        id: BrokerId::new(id),
        host: format!("broker-{}", id),
        port: 9092,
    }
}

/// Replication factor is the number of assigned replicas.
pub fn leader_and_isr(leader: i32, leader_epoch: i32, isr: &[i32], replicas: &[i32]) -> LeaderAndIsr {
    LeaderAndIsr {
        leader: BrokerId::new(leader),
        leader_epoch,
        isr: isr.iter().copied().map(BrokerId::new).collect(),
        isr_version: 0,
        replicas: replicas.iter().copied().map(BrokerId::new).collect(),
        replication_factor: replicas.len() as i32,
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FetcherEvent {
    Added {
        topic_partition: TopicPartition,
        initial_offset: u64,
        leader: BrokerId,
    },
    Removed(TopicPartition),
    Shutdown,
}

#[derive(Default)]
pub struct RecordingFetcherManager {
    events: Mutex<Vec<FetcherEvent>>,
}

impl RecordingFetcherManager {
    pub fn events(&self) -> Vec<FetcherEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    fn record(&self, event: FetcherEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl FetcherManager for RecordingFetcherManager {
    fn add_fetcher(&self, topic_partition: &TopicPartition, initial_offset: u64, leader: &BrokerEndpoint) {
        self.record(FetcherEvent::Added {
            topic_partition: topic_partition.clone(),
            initial_offset,
            leader: leader.id,
        });
    }

    fn remove_fetcher(&self, topic_partition: &TopicPartition) {
        self.record(FetcherEvent::Removed(topic_partition.clone()));
    }

    fn shutdown(&self) {
        self.record(FetcherEvent::Shutdown);
    }
}

/// Accepts every update and bumps the version, unless told to reject.
#[derive(Default)]
pub struct RecordingIsrPublisher {
    published: Mutex<Vec<(TopicPartition, LeaderAndIsr)>>,
    rejecting: AtomicBool,
}

impl RecordingIsrPublisher {
    pub fn published(&self) -> Vec<(TopicPartition, LeaderAndIsr)> {
        self.published.lock().unwrap().clone()
    }

    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }
}

impl IsrChangePublisher for RecordingIsrPublisher {
    fn publish_isr(
        &self,
        topic_partition: &TopicPartition,
        leader_and_isr: &LeaderAndIsr,
    ) -> Result<i32, IsrPublishError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(IsrPublishError::Unavailable("rejected by test".to_string()));
        }

        self.published
            .lock()
            .unwrap()
            .push((topic_partition.clone(), leader_and_isr.clone()));
        Ok(leader_and_isr.isr_version + 1)
    }
}

/// Keeps scheduled jobs so tests can fire them by hand.
#[derive(Default)]
pub struct RecordingScheduler {
    jobs: Mutex<Vec<(String, ScheduledJob, Duration)>>,
}

impl RecordingScheduler {
    pub fn job_names(&self) -> Vec<String> {
        self.jobs.lock().unwrap().iter().map(|(name, _, _)| name.clone()).collect()
    }

    pub fn period(&self, name: &str) -> Option<Duration> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|(job_name, _, _)| job_name == name)
            .map(|(_, _, period)| *period)
    }

    /// Runs the named job once on the calling thread. Returns false if no such job exists.
    pub fn run(&self, name: &str) -> bool {
        let job = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|(job_name, _, _)| job_name == name)
            .map(|(_, job, _)| job.clone());

        match job {
            Some(job) => {
                (*job)();
                true
            }
            None => false,
        }
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, name: &str, job: ScheduledJob, _delay: Duration, period: Duration) {
        self.jobs.lock().unwrap().push((name.to_string(), job, period));
    }
}

/// A local broker with in-memory logs, recording collaborators, a mock clock, and a temporary
/// log directory.
pub struct TestHarness {
    pub local_broker_id: BrokerId,
    pub context: Arc<PartitionContext>,
    pub logs: Arc<InMemoryLogFactory>,
    pub fetchers: Arc<RecordingFetcherManager>,
    pub isr_publisher: Arc<RecordingIsrPublisher>,
    pub scheduler: Arc<RecordingScheduler>,
    pub clock: MockClockController,
    mock_clock: MockClock,
    pub log_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new(local_broker_id: i32) -> Self {
        let log_dir = tempfile::tempdir().unwrap();
        let (mock_clock, clock) = mocked_clock();
        let logs = Arc::new(InMemoryLogFactory::new());
        let fetchers = Arc::new(RecordingFetcherManager::default());
        let isr_publisher = Arc::new(RecordingIsrPublisher::default());

        let context = Arc::new(PartitionContext {
            logger: test_logger(),
            local_broker_id: BrokerId::new(local_broker_id),
            clock: Arc::new(mock_clock.clone()),
            log_factory: logs.clone(),
            fetcher_manager: fetchers.clone(),
            isr_publisher: isr_publisher.clone(),
            checkpoint: Arc::new(HighWatermarkCheckpoint::new(log_dir.path())),
            metrics: Arc::new(ReplicaMetrics::new()),
        });

        TestHarness {
            local_broker_id: BrokerId::new(local_broker_id),
            context,
            logs,
            fetchers,
            isr_publisher,
            scheduler: Arc::new(RecordingScheduler::default()),
            clock,
            mock_clock,
            log_dir,
        }
    }

    pub fn partition(&self, topic: &str, partition_id: i32, replication_factor: i32) -> Partition {
        Partition::new(
            TopicPartition::new(topic, partition_id),
            replication_factor,
            self.context.clone(),
        )
    }

    /// A replica manager sharing this harness' collaborators and log directory.
    pub fn replica_manager(&self) -> Arc<ReplicaManager> {
        try_create_replica_manager(
            ReplicaManagerConfig {
                broker_id: self.local_broker_id.as_i32(),
                log_dir: self.log_dir.path().to_path_buf(),
                info_logger: test_logger(),
                options: ReplicaManagerOptions::default(),
            },
            ReplicaManagerDependencies {
                scheduler: self.scheduler.clone(),
                fetcher_manager: self.fetchers.clone(),
                log_factory: self.logs.clone(),
                isr_publisher: self.isr_publisher.clone(),
                clock: Arc::new(self.mock_clock.clone()),
            },
        )
        .unwrap()
    }
}
