use crate::cluster::{BrokerEndpoint, BrokerId, LeaderAndIsr, TopicPartition};
use crate::partition::context::PartitionContext;
use crate::partition::replica::Replica;
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("Stale leader epoch {requested_epoch}, current epoch is {current_epoch}")]
    StaleLeaderEpoch { current_epoch: i32, requested_epoch: i32 },
    #[error("Broker {replica_id} is not an assigned replica")]
    NotAssignedReplica { replica_id: BrokerId },
    #[error("Failed to open local log: {0}")]
    LogInitialization(#[source] io::Error),
    #[error("Failed to truncate local log: {0}")]
    LogTruncation(#[source] io::Error),
}

/// Partition is the local broker's view of one partition: who leads it, which replicas are in
/// sync, and how far each replica has fetched.
///
/// All state sits behind one mutex so a reader never sees a leader change without its matching
/// ISR. The lock is never held while calling back into the replica manager.
pub struct Partition {
    topic_partition: TopicPartition,
    logger: slog::Logger,
    context: Arc<PartitionContext>,
    state: Mutex<PartitionState>,
}

struct PartitionState {
    leader: Option<BrokerId>,
    leader_epoch: i32,
    isr_version: i32,
    isr: BTreeSet<BrokerId>,
    replicas: HashMap<BrokerId, Replica>,
    replication_factor: i32,
}

impl Partition {
    pub(crate) fn new(topic_partition: TopicPartition, replication_factor: i32, context: Arc<PartitionContext>) -> Self {
        let logger = context.logger.new(slog::o!(
            "Topic" => topic_partition.topic().to_string(),
            "Partition" => topic_partition.partition()
        ));

        Partition {
            topic_partition,
            logger,
            context,
            state: Mutex::new(PartitionState {
                leader: None,
                leader_epoch: -1,
                isr_version: 0,
                isr: BTreeSet::new(),
                replicas: HashMap::new(),
                replication_factor,
            }),
        }
    }

    pub fn topic_partition(&self) -> &TopicPartition {
        &self.topic_partition
    }

    pub fn replication_factor(&self) -> i32 {
        self.lock_state().replication_factor
    }

    pub fn leader_epoch(&self) -> i32 {
        self.lock_state().leader_epoch
    }

    pub fn leader_replica_id(&self) -> Option<BrokerId> {
        self.lock_state().leader
    }

    pub fn in_sync_replicas(&self) -> BTreeSet<BrokerId> {
        self.lock_state().isr.clone()
    }

    pub fn is_leader_local(&self) -> bool {
        self.lock_state().is_leader(self.context.local_broker_id)
    }

    pub fn replica(&self, replica_id: BrokerId) -> Option<Replica> {
        self.lock_state().replicas.get(&replica_id).cloned()
    }

    pub fn local_replica(&self) -> Option<Replica> {
        self.lock_state().local_replica(self.context.local_broker_id).cloned()
    }

    pub fn leader_replica_if_local(&self) -> Option<Replica> {
        let local_id = self.context.local_broker_id;
        let state = self.lock_state();
        if state.is_leader(local_id) {
            state.local_replica(local_id).cloned()
        } else {
            None
        }
    }

    /// Only a leader knows its ISR, so followers never report as under-replicated.
    pub fn is_under_replicated(&self) -> bool {
        let state = self.lock_state();
        state.is_leader(self.context.local_broker_id) && (state.isr.len() as i32) < state.replication_factor
    }

    /// Applies an assignment naming the local broker as leader. Returns true if the local broker
    /// was not already leading.
    pub(crate) fn make_leader(&self, leader_and_isr: &LeaderAndIsr) -> Result<bool, PartitionError> {
        let local_id = self.context.local_broker_id;
        let now = self.context.clock.now();
        let mut state = self.lock_state();

        state.check_leader_epoch(leader_and_isr.leader_epoch)?;
        self.ensure_local_replica(&mut state)?;

        let was_leader = state.is_leader(local_id);
        state.apply(leader_and_isr, local_id, now);

        // Offsets reported to an earlier leader may have been truncated since. Followers start
        // from unknown progress with a full lag window.
        for replica in state.replicas.values_mut().filter(|replica| !replica.is_local()) {
            replica.reset_progress(now);
        }
        self.maybe_increment_high_watermark(&mut state);

        self.context.fetcher_manager.remove_fetcher(&self.topic_partition);

        slog::info!(
            self.logger,
            "Leading at epoch {} with ISR {:?}, high watermark {:?}",
            leader_and_isr.leader_epoch,
            state.isr,
            state.local_replica(local_id).and_then(Replica::high_watermark)
        );
        Ok(!was_leader)
    }

    /// Applies an assignment naming another broker as leader, and points the fetcher at it.
    /// Returns true if the local broker was leading until now.
    pub(crate) fn make_follower(
        &self,
        leader_and_isr: &LeaderAndIsr,
        live_brokers: &[BrokerEndpoint],
    ) -> Result<bool, PartitionError> {
        let local_id = self.context.local_broker_id;
        let now = self.context.clock.now();
        let mut state = self.lock_state();

        state.check_leader_epoch(leader_and_isr.leader_epoch)?;
        self.ensure_local_replica(&mut state)?;

        let was_leader = state.is_leader(local_id);
        let leadership_changed =
            state.leader != Some(leader_and_isr.leader) || leader_and_isr.leader_epoch > state.leader_epoch;

        if !leadership_changed {
            // Same leader and epoch: the fetcher keeps its position.
            state.apply(leader_and_isr, local_id, now);
            slog::debug!(
                self.logger,
                "Already following {} at epoch {}",
                leader_and_isr.leader,
                leader_and_isr.leader_epoch
            );
            return Ok(was_leader);
        }

        // Anything past the high watermark may not exist on the new leader.
        let (log, high_watermark) = match state.local_replica(local_id) {
            Some(replica) => (replica.log().cloned(), replica.high_watermark().unwrap_or(0)),
            None => (None, 0),
        };
        let log = match log {
            Some(log) => log,
            None => {
                return Err(PartitionError::LogInitialization(io::Error::new(
                    io::ErrorKind::NotFound,
                    "local replica has no log",
                )))
            }
        };
        log.truncate_to(high_watermark).map_err(PartitionError::LogTruncation)?;

        self.context.fetcher_manager.remove_fetcher(&self.topic_partition);
        state.apply(leader_and_isr, local_id, now);

        match live_brokers.iter().find(|broker| broker.id == leader_and_isr.leader) {
            Some(leader) => {
                let fetch_offset = log.log_end_offset();
                self.context
                    .fetcher_manager
                    .add_fetcher(&self.topic_partition, fetch_offset, leader);
                slog::info!(
                    self.logger,
                    "Following {} at epoch {}, fetching from offset {}",
                    leader.id,
                    leader_and_isr.leader_epoch,
                    fetch_offset
                );
            }
            None => {
                slog::warn!(
                    self.logger,
                    "Leader {} at epoch {} is not a live broker, not fetching",
                    leader_and_isr.leader,
                    leader_and_isr.leader_epoch
                );
            }
        }

        Ok(was_leader)
    }

    /// Drops followers that stopped fetching for longer than `max_lag_time`, or that trail the
    /// leader by more than `max_lag_messages`. Only the leader evaluates its ISR.
    pub(crate) fn maybe_shrink_isr(&self, max_lag_time: Duration, max_lag_messages: u64) {
        let local_id = self.context.local_broker_id;
        let now = self.context.clock.now();
        let mut state = self.lock_state();

        if !state.is_leader(local_id) {
            return;
        }

        let leader_log_end_offset = match state.local_replica(local_id) {
            Some(replica) => replica.log_end_offset(),
            None => return,
        };

        let out_of_sync: BTreeSet<BrokerId> = state
            .isr
            .iter()
            .filter(|id| **id != local_id)
            .filter(|id| match state.replicas.get(*id) {
                Some(replica) => {
                    now.saturating_duration_since(replica.last_fetch_time()) > max_lag_time
                        || leader_log_end_offset.saturating_sub(replica.log_end_offset()) > max_lag_messages
                }
                None => true,
            })
            .copied()
            .collect();

        if out_of_sync.is_empty() {
            return;
        }

        let new_isr: BTreeSet<BrokerId> = state.isr.difference(&out_of_sync).copied().collect();
        slog::info!(
            self.logger,
            "Shrinking ISR from {:?} to {:?}, out of sync: {:?}",
            state.isr,
            new_isr,
            out_of_sync
        );

        if self.publish_isr(&mut state, new_isr) {
            self.context.metrics.mark_isr_shrink();
            self.maybe_increment_high_watermark(&mut state);
        }
    }

    /// Records a follower's fetch position. On the leader this may add the follower back into the
    /// ISR, and moves the high watermark to the smallest log end offset in the ISR.
    pub(crate) fn update_leader_hw_and_maybe_expand_isr(
        &self,
        replica_id: BrokerId,
        offset: u64,
    ) -> Result<(), PartitionError> {
        let local_id = self.context.local_broker_id;
        let now = self.context.clock.now();
        let mut state = self.lock_state();

        match state.replicas.get_mut(&replica_id) {
            Some(replica) => replica.record_fetch(offset, now),
            None => return Err(PartitionError::NotAssignedReplica { replica_id }),
        }

        if !state.is_leader(local_id) {
            return Ok(());
        }

        let high_watermark = state
            .local_replica(local_id)
            .and_then(Replica::high_watermark)
            .unwrap_or(0);

        if !state.isr.contains(&replica_id) && offset >= high_watermark {
            let mut new_isr = state.isr.clone();
            new_isr.insert(replica_id);
            slog::info!(self.logger, "Expanding ISR from {:?} to {:?}", state.isr, new_isr);

            if self.publish_isr(&mut state, new_isr) {
                self.context.metrics.mark_isr_expand();
            }
        }

        self.maybe_increment_high_watermark(&mut state);
        Ok(())
    }

    /// Moves a follower's high watermark to the leader's, capped at what has been fetched locally.
    /// Ignored while the local broker leads; the leader derives its own from the ISR.
    pub(crate) fn update_follower_high_watermark(&self, leader_high_watermark: u64) {
        let local_id = self.context.local_broker_id;
        let mut state = self.lock_state();

        if state.is_leader(local_id) {
            return;
        }

        if let Some(local) = state.replicas.get_mut(&local_id) {
            let old_high_watermark = local.high_watermark().unwrap_or(0);
            let new_high_watermark = leader_high_watermark.min(local.log_end_offset());
            if new_high_watermark > old_high_watermark {
                local.set_high_watermark(new_high_watermark);
                slog::trace!(
                    self.logger,
                    "Follower high watermark moved from {} to {}",
                    old_high_watermark,
                    new_high_watermark
                );
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PartitionState> {
        self.state.lock().expect("Partition state mutex guard poison")
    }

    fn ensure_local_replica(&self, state: &mut PartitionState) -> Result<(), PartitionError> {
        let local_id = self.context.local_broker_id;
        if state.local_replica(local_id).is_some() {
            return Ok(());
        }

        let log = self
            .context
            .log_factory
            .get_or_create_log(&self.topic_partition)
            .map_err(PartitionError::LogInitialization)?;
        let replica = Replica::new_local(local_id, log, self.checkpointed_high_watermark(), self.context.clock.now());
        slog::debug!(
            self.logger,
            "Created local replica with log end offset {} and high watermark {:?}",
            replica.log_end_offset(),
            replica.high_watermark()
        );
        state.replicas.insert(local_id, replica);

        Ok(())
    }

    fn checkpointed_high_watermark(&self) -> u64 {
        match self.context.checkpoint.read() {
            Ok(high_watermarks) => high_watermarks.get(&self.topic_partition).copied().unwrap_or(0),
            Err(e) => {
                slog::warn!(self.logger, "Can't read high watermark checkpoint, starting from 0: {}", e);
                0
            }
        }
    }

    // Returns true if the new ISR was accepted and applied.
    fn publish_isr(&self, state: &mut PartitionState, new_isr: BTreeSet<BrokerId>) -> bool {
        let mut replicas: Vec<BrokerId> = state.replicas.keys().copied().collect();
        replicas.sort();

        let leader_and_isr = LeaderAndIsr {
            leader: self.context.local_broker_id,
            leader_epoch: state.leader_epoch,
            isr: new_isr.iter().copied().collect(),
            isr_version: state.isr_version,
            replicas,
            replication_factor: state.replication_factor,
        };

        match self
            .context
            .isr_publisher
            .publish_isr(&self.topic_partition, &leader_and_isr)
        {
            Ok(new_version) => {
                state.isr = new_isr;
                state.isr_version = new_version;
                true
            }
            Err(e) => {
                slog::error!(self.logger, "Failed to publish ISR {:?}, keeping {:?}: {}", new_isr, state.isr, e);
                false
            }
        }
    }

    fn maybe_increment_high_watermark(&self, state: &mut PartitionState) {
        let local_id = self.context.local_broker_id;
        let new_high_watermark = match state
            .isr
            .iter()
            .chain(std::iter::once(&local_id))
            .filter_map(|id| state.replicas.get(id))
            .map(Replica::log_end_offset)
            .min()
        {
            Some(offset) => offset,
            None => return,
        };

        if let Some(local) = state.replicas.get_mut(&local_id) {
            let old_high_watermark = local.high_watermark().unwrap_or(0);
            if new_high_watermark > old_high_watermark {
                local.set_high_watermark(new_high_watermark);
                slog::debug!(
                    self.logger,
                    "High watermark moved from {} to {}",
                    old_high_watermark,
                    new_high_watermark
                );
            }
        }
    }
}

impl PartitionState {
    fn is_leader(&self, local_id: BrokerId) -> bool {
        self.leader == Some(local_id)
    }

    fn local_replica(&self, local_id: BrokerId) -> Option<&Replica> {
        self.replicas.get(&local_id).filter(|replica| replica.is_local())
    }

    fn check_leader_epoch(&self, requested_epoch: i32) -> Result<(), PartitionError> {
        if requested_epoch < self.leader_epoch {
            return Err(PartitionError::StaleLeaderEpoch {
                current_epoch: self.leader_epoch,
                requested_epoch,
            });
        }
        Ok(())
    }

    // Replicas that stay assigned keep their fetch progress.
    fn apply(&mut self, leader_and_isr: &LeaderAndIsr, local_id: BrokerId, now: Instant) {
        let mut assigned: BTreeSet<BrokerId> = leader_and_isr
            .replicas
            .iter()
            .chain(leader_and_isr.isr.iter())
            .copied()
            .collect();
        assigned.insert(leader_and_isr.leader);
        assigned.insert(local_id);

        self.replicas.retain(|id, _| assigned.contains(id));
        for id in assigned {
            self.replicas.entry(id).or_insert_with(|| Replica::new_remote(id, now));
        }

        self.leader = Some(leader_and_isr.leader);
        self.leader_epoch = leader_and_isr.leader_epoch;
        self.isr_version = leader_and_isr.isr_version;
        self.isr = leader_and_isr.isr.iter().copied().collect();
        self.replication_factor = leader_and_isr.replication_factor;
    }
}
