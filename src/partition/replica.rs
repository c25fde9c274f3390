use crate::cluster::BrokerId;
use crate::commitlog::Log;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// Replica is one broker's copy of a partition, as seen from the local broker. Values handed out
/// by lookups are snapshots; the live copy is owned by its `Partition`.
#[derive(Clone)]
pub struct Replica {
    broker_id: BrokerId,
    // Only meaningful for remote replicas. The local replica reads it from its log.
    reported_log_end_offset: u64,
    last_fetch_time: Instant,
    local: Option<LocalLog>,
}

#[derive(Clone)]
struct LocalLog {
    log: Arc<dyn Log>,
    high_watermark: u64,
}

impl Replica {
    pub(super) fn new_local(broker_id: BrokerId, log: Arc<dyn Log>, high_watermark: u64, now: Instant) -> Self {
        let high_watermark = high_watermark.min(log.log_end_offset());
        Replica {
            broker_id,
            reported_log_end_offset: 0,
            last_fetch_time: now,
            local: Some(LocalLog { log, high_watermark }),
        }
    }

    pub(super) fn new_remote(broker_id: BrokerId, now: Instant) -> Self {
        Replica {
            broker_id,
            reported_log_end_offset: 0,
            last_fetch_time: now,
            local: None,
        }
    }

    pub fn broker_id(&self) -> BrokerId {
        self.broker_id
    }

    pub fn is_local(&self) -> bool {
        self.local.is_some()
    }

    pub fn log_end_offset(&self) -> u64 {
        match &self.local {
            Some(local) => local.log.log_end_offset(),
            None => self.reported_log_end_offset,
        }
    }

    /// `None` for remote replicas; only the local replica tracks a high watermark.
    pub fn high_watermark(&self) -> Option<u64> {
        self.local.as_ref().map(|local| local.high_watermark)
    }

    pub fn last_fetch_time(&self) -> Instant {
        self.last_fetch_time
    }

    pub(super) fn log(&self) -> Option<&Arc<dyn Log>> {
        self.local.as_ref().map(|local| &local.log)
    }

    pub(super) fn record_fetch(&mut self, log_end_offset: u64, now: Instant) {
        if self.local.is_none() {
            self.reported_log_end_offset = log_end_offset;
        }
        self.last_fetch_time = now;
    }

    /// Forgets what a remote replica reported under a previous leader. Its progress is unknown
    /// until it fetches again.
    pub(super) fn reset_progress(&mut self, now: Instant) {
        if self.local.is_none() {
            self.reported_log_end_offset = 0;
        }
        self.last_fetch_time = now;
    }

    /// Caller guarantees `high_watermark <= log_end_offset()`.
    pub(super) fn set_high_watermark(&mut self, high_watermark: u64) {
        if let Some(local) = self.local.as_mut() {
            local.high_watermark = high_watermark;
        }
    }
}

impl fmt::Debug for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replica")
            .field("broker_id", &self.broker_id)
            .field("is_local", &self.is_local())
            .field("log_end_offset", &self.log_end_offset())
            .field("high_watermark", &self.high_watermark())
            .finish()
    }
}
