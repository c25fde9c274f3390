use crate::api::ReplicaManagerOptionsValidated;
use crate::checkpoint::{is_checkpointable_topic, CheckpointError};
use crate::cluster::{
    BrokerEndpoint, BrokerId, ErrorCode, LeaderAndIsr, LeaderAndIsrBatch, LeaderAndIsrResponse, TopicPartition,
};
use crate::partition::{LeaderSet, Partition, PartitionContext, PartitionError, PartitionRegistry, Replica};
use crate::replica_manager::ReplicaMetrics;
use crate::scheduler::Scheduler;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;

/// Returned by `get_replication_factor_for_partition()` for partitions this broker doesn't host.
pub const UNKNOWN_REPLICATION_FACTOR: i32 = -1;

pub const ISR_EXPIRATION_JOB: &str = "isr-expiration";
pub const HIGH_WATERMARK_CHECKPOINT_JOB: &str = "highwatermark-checkpoint";

#[derive(Debug, thiserror::Error)]
pub enum ReplicaManagerError {
    #[error("Replica {replica_id} of partition {topic_partition} is not available")]
    ReplicaNotAvailable {
        topic_partition: TopicPartition,
        replica_id: BrokerId,
    },
    #[error("Partition {0} is not hosted on this broker")]
    UnknownTopicOrPartition(TopicPartition),
    #[error("This broker is not the leader of partition {0}")]
    LeaderNotAvailable(TopicPartition),
}

/// ReplicaManager is the local broker's entry point for replication: it applies the controller's
/// leadership decisions, answers replica lookups, and runs the background ISR expiration and high
/// watermark checkpoint jobs.
pub struct ReplicaManager {
    logger: slog::Logger,
    local_broker_id: BrokerId,
    options: ReplicaManagerOptionsValidated,
    context: Arc<PartitionContext>,
    registry: PartitionRegistry,
    leader_set: LeaderSet,
    scheduler: Arc<dyn Scheduler>,
    high_watermark_checkpoint_started: AtomicBool,
    controller_epoch: AtomicI32,
    // Serializes leadership changes and stop-replica requests against each other.
    state_change_lock: Mutex<()>,
}

// Outcome of applying one entry of a leadership batch.
enum Transition {
    Leading {
        partition: Arc<Partition>,
        newly_elected: bool,
    },
    Following {
        topic_partition: TopicPartition,
        was_leader: bool,
    },
}

impl ReplicaManager {
    pub(crate) fn new(
        logger: slog::Logger,
        context: Arc<PartitionContext>,
        scheduler: Arc<dyn Scheduler>,
        options: ReplicaManagerOptionsValidated,
    ) -> Self {
        ReplicaManager {
            logger,
            local_broker_id: context.local_broker_id,
            options,
            registry: PartitionRegistry::new(context.clone()),
            context,
            leader_set: LeaderSet::new(),
            scheduler,
            high_watermark_checkpoint_started: AtomicBool::new(false),
            controller_epoch: AtomicI32::new(0),
            state_change_lock: Mutex::new(()),
        }
    }

    pub fn local_broker_id(&self) -> BrokerId {
        self.local_broker_id
    }

    /// Highest controller epoch accepted so far.
    pub fn controller_epoch(&self) -> i32 {
        self.controller_epoch.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &ReplicaMetrics {
        &self.context.metrics
    }

    /// Starts the ISR expiration job, which runs right away and then once per max lag time.
    pub fn startup(self: &Arc<Self>) {
        let replica_manager = Arc::downgrade(self);
        self.scheduler.schedule(
            ISR_EXPIRATION_JOB,
            Arc::new(move || {
                if let Some(replica_manager) = replica_manager.upgrade() {
                    replica_manager.maybe_shrink_isr();
                }
            }),
            Duration::from_millis(0),
            self.options.replica_lag_time_max,
        );
    }

    /// Starts the high watermark checkpoint job. Only the first call has any effect.
    pub fn start_high_watermarks_checkpoint_thread(self: &Arc<Self>) {
        if self
            .high_watermark_checkpoint_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let replica_manager = Arc::downgrade(self);
        self.scheduler.schedule(
            HIGH_WATERMARK_CHECKPOINT_JOB,
            Arc::new(move || {
                if let Some(replica_manager) = replica_manager.upgrade() {
                    if let Err(e) = replica_manager.checkpoint_high_watermarks() {
                        slog::error!(replica_manager.logger, "Failed to checkpoint high watermarks: {}", e);
                    }
                }
            }),
            Duration::from_millis(0),
            self.options.replica_high_watermark_checkpoint_interval,
        );
    }

    pub fn get_or_create_partition(&self, topic: &str, partition_id: i32, replication_factor: i32) -> Arc<Partition> {
        self.registry.get_or_create(topic, partition_id, replication_factor)
    }

    pub fn get_partition(&self, topic: &str, partition_id: i32) -> Option<Arc<Partition>> {
        self.registry.get(topic, partition_id)
    }

    pub fn get_replica(&self, topic: &str, partition_id: i32, replica_id: BrokerId) -> Option<Replica> {
        self.get_partition(topic, partition_id)
            .and_then(|partition| partition.replica(replica_id))
    }

    pub fn get_local_replica(&self, topic: &str, partition_id: i32) -> Option<Replica> {
        self.get_partition(topic, partition_id)
            .and_then(|partition| partition.local_replica())
    }

    pub fn get_replica_or_error(&self, topic: &str, partition_id: i32) -> Result<Replica, ReplicaManagerError> {
        self.get_local_replica(topic, partition_id)
            .ok_or_else(|| ReplicaManagerError::ReplicaNotAvailable {
                topic_partition: TopicPartition::new(topic, partition_id),
                replica_id: self.local_broker_id,
            })
    }

    pub fn get_leader_replica_if_local(&self, topic: &str, partition_id: i32) -> Result<Replica, ReplicaManagerError> {
        let partition = self
            .get_partition(topic, partition_id)
            .ok_or_else(|| ReplicaManagerError::UnknownTopicOrPartition(TopicPartition::new(topic, partition_id)))?;

        partition
            .leader_replica_if_local()
            .ok_or_else(|| ReplicaManagerError::LeaderNotAvailable(partition.topic_partition().clone()))
    }

    pub fn get_replication_factor_for_partition(&self, topic: &str, partition_id: i32) -> i32 {
        match self.get_partition(topic, partition_id) {
            Some(partition) => partition.replication_factor(),
            None => UNKNOWN_REPLICATION_FACTOR,
        }
    }

    pub fn is_leader(&self, topic: &str, partition_id: i32) -> bool {
        self.leader_set.contains(&TopicPartition::new(topic, partition_id))
    }

    pub fn leader_partition_count(&self) -> usize {
        self.leader_set.len()
    }

    pub fn under_replicated_partition_count(&self) -> usize {
        self.leader_set.count_where(Partition::is_under_replicated)
    }

    /// Applies a batch of leadership decisions from the controller. A failure on one partition is
    /// reported in that partition's slot of the response and does not affect the others.
    pub fn become_leader_or_follower(self: &Arc<Self>, batch: &LeaderAndIsrBatch) -> LeaderAndIsrResponse {
        let response = {
            let _guard = self
                .state_change_lock
                .lock()
                .expect("ReplicaManager.become_leader_or_follower() mutex guard poison");

            let current_controller_epoch = self.controller_epoch.load(Ordering::Acquire);
            if batch.controller_epoch < current_controller_epoch {
                slog::warn!(
                    self.logger,
                    "Ignoring leadership batch from controller {} with stale epoch {}, current epoch is {}",
                    batch.controller_id,
                    batch.controller_epoch,
                    current_controller_epoch
                );
                return LeaderAndIsrResponse::rejected(ErrorCode::StaleControllerEpoch);
            }
            self.controller_epoch.store(batch.controller_epoch, Ordering::Release);

            slog::info!(
                self.logger,
                "Handling leadership batch for {} partition(s) from controller {} at epoch {}",
                batch.partition_states.len(),
                batch.controller_id,
                batch.controller_epoch
            );

            let results: Vec<(TopicPartition, Result<Transition, PartitionError>)> = batch
                .partition_states
                .iter()
                .map(|(topic_partition, leader_and_isr)| {
                    let result = self.apply_leader_and_isr(topic_partition, leader_and_isr, &batch.live_brokers);
                    (topic_partition.clone(), result)
                })
                .collect();

            let partition_errors = results.into_iter().fold(
                HashMap::with_capacity(batch.partition_states.len()),
                |mut partition_errors, (topic_partition, result)| {
                    let error_code = match result {
                        Ok(transition) => {
                            self.update_leader_set(transition);
                            ErrorCode::None
                        }
                        Err(e) => {
                            slog::warn!(self.logger, "Failed to apply leadership change for {}: {}", topic_partition, e);
                            ErrorCode::from(&e)
                        }
                    };
                    partition_errors.insert(topic_partition, error_code);
                    partition_errors
                },
            );

            self.refresh_leader_gauges();
            LeaderAndIsrResponse {
                error_code: ErrorCode::None,
                partition_errors,
            }
        };

        self.start_high_watermarks_checkpoint_thread();
        response
    }

    /// Records how far `replica_id` has fetched. Reports for partitions this broker doesn't know
    /// yet are dropped; the assignment creating them just hasn't arrived.
    pub fn record_follower_position(&self, topic: &str, partition_id: i32, replica_id: BrokerId, offset: u64) {
        let partition = match self.get_partition(topic, partition_id) {
            Some(partition) => partition,
            None => {
                slog::debug!(
                    self.logger,
                    "Dropping fetch position {} of replica {} for unknown partition [{},{}]",
                    offset,
                    replica_id,
                    topic,
                    partition_id
                );
                return;
            }
        };

        if let Err(e) = partition.update_leader_hw_and_maybe_expand_isr(replica_id, offset) {
            slog::warn!(
                self.logger,
                "Can't record fetch position {} of replica {} for {}: {}",
                offset,
                replica_id,
                partition.topic_partition(),
                e
            );
        }
    }

    /// Applies the high watermark the leader returned in a fetch response to the local follower
    /// replica.
    pub fn update_follower_high_watermark(&self, topic: &str, partition_id: i32, leader_high_watermark: u64) {
        match self.get_partition(topic, partition_id) {
            Some(partition) => partition.update_follower_high_watermark(leader_high_watermark),
            None => slog::debug!(
                self.logger,
                "Dropping leader high watermark {} for unknown partition [{},{}]",
                leader_high_watermark,
                topic,
                partition_id
            ),
        }
    }

    /// Stops serving a partition. Stopping a partition with no local replica is not an error.
    pub fn stop_replica(&self, topic: &str, partition_id: i32, delete_partition: bool) -> ErrorCode {
        let _guard = self
            .state_change_lock
            .lock()
            .expect("ReplicaManager.stop_replica() mutex guard poison");

        let topic_partition = TopicPartition::new(topic, partition_id);
        if self.get_local_replica(topic, partition_id).is_none() {
            slog::debug!(self.logger, "No local replica of {} to stop", topic_partition);
            return ErrorCode::None;
        }

        self.context.fetcher_manager.remove_fetcher(&topic_partition);
        if self.leader_set.remove(&topic_partition) {
            self.refresh_leader_gauges();
        }
        self.registry.remove(topic, partition_id);

        if delete_partition {
            // Log deletion belongs to the storage layer; the log is left on disk.
            slog::info!(self.logger, "Stopped {}, its log is not deleted", topic_partition);
        } else {
            slog::info!(self.logger, "Stopped {}", topic_partition);
        }

        ErrorCode::None
    }

    /// Writes the local high watermark of every hosted partition to the checkpoint file,
    /// replacing its previous content.
    pub fn checkpoint_high_watermarks(&self) -> Result<(), CheckpointError> {
        let partitions = self.registry.all();
        let mut high_watermarks = HashMap::with_capacity(partitions.len());

        for partition in partitions {
            if !is_checkpointable_topic(partition.topic_partition().topic()) {
                slog::warn!(
                    self.logger,
                    "Not checkpointing {}, its topic name can't be stored",
                    partition.topic_partition()
                );
                continue;
            }
            let high_watermark = match partition.local_replica().and_then(|replica| replica.high_watermark()) {
                Some(high_watermark) => high_watermark,
                None => {
                    slog::warn!(
                        self.logger,
                        "No local replica of {} while checkpointing high watermarks, recording 0",
                        partition.topic_partition()
                    );
                    0
                }
            };
            high_watermarks.insert(partition.topic_partition().clone(), high_watermark);
        }

        self.context.checkpoint.write(&high_watermarks)?;
        slog::debug!(self.logger, "Checkpointed {} high watermark(s)", high_watermarks.len());
        Ok(())
    }

    /// Stops fetching and writes a final checkpoint. Call once no more requests are admitted.
    pub fn shutdown(&self) {
        slog::info!(self.logger, "Shutting down");
        self.context.fetcher_manager.shutdown();
        if let Err(e) = self.checkpoint_high_watermarks() {
            slog::error!(self.logger, "Failed to write final high watermark checkpoint: {}", e);
        }
        slog::info!(self.logger, "Shut down completed");
    }

    fn apply_leader_and_isr(
        &self,
        topic_partition: &TopicPartition,
        leader_and_isr: &LeaderAndIsr,
        live_brokers: &[BrokerEndpoint],
    ) -> Result<Transition, PartitionError> {
        let partition = self.get_or_create_partition(
            topic_partition.topic(),
            topic_partition.partition(),
            leader_and_isr.replication_factor,
        );

        if leader_and_isr.leader == self.local_broker_id {
            let newly_elected = partition.make_leader(leader_and_isr)?;
            Ok(Transition::Leading {
                partition,
                newly_elected,
            })
        } else {
            let was_leader = partition.make_follower(leader_and_isr, live_brokers)?;
            Ok(Transition::Following {
                topic_partition: topic_partition.clone(),
                was_leader,
            })
        }
    }

    // Insert and remove are idempotent, so the set follows the latest assignment even if a
    // previous transition was interrupted.
    fn update_leader_set(&self, transition: Transition) {
        match transition {
            Transition::Leading {
                partition,
                newly_elected,
            } => {
                if newly_elected {
                    slog::info!(self.logger, "Became leader of {}", partition.topic_partition());
                }
                self.leader_set.add(partition);
            }
            Transition::Following {
                topic_partition,
                was_leader,
            } => {
                self.leader_set.remove(&topic_partition);
                if was_leader {
                    slog::info!(self.logger, "Stopped leading {}", topic_partition);
                }
            }
        }
    }

    fn refresh_leader_gauges(&self) {
        self.context
            .metrics
            .record_leader_gauges(self.leader_set.len(), self.under_replicated_partition_count());
    }

    fn maybe_shrink_isr(&self) {
        let leaders = self.leader_set.snapshot();
        slog::trace!(self.logger, "Evaluating ISR of {} led partition(s)", leaders.len());

        for partition in &leaders {
            partition.maybe_shrink_isr(self.options.replica_lag_time_max, self.options.replica_lag_max_messages);
        }

        let under_replicated = leaders.iter().filter(|partition| partition.is_under_replicated()).count();
        self.context.metrics.record_leader_gauges(leaders.len(), under_replicated);
    }
}
