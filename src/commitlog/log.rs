use crate::cluster::TopicPartition;
use std::io;
use std::sync::Arc;

/// Log is the local broker's handle on one partition's message log. The storage engine behind it
/// is not our concern; replication only needs to know where the log ends and how to cut it back.
///
/// Offsets start from 0. The log end offset is the offset the next appended message will get.
pub trait Log: Send + Sync {
    fn log_end_offset(&self) -> u64;

    /// Discards every message at `offset` and later. No-op if the log already ends at or before
    /// `offset`.
    fn truncate_to(&self, offset: u64) -> Result<(), io::Error>;
}

/// LogFactory opens (or creates) the local log for a partition. Calling it twice for the same
/// partition must return the same underlying log.
pub trait LogFactory: Send + Sync {
    fn get_or_create_log(&self, topic_partition: &TopicPartition) -> Result<Arc<dyn Log>, io::Error>;
}
