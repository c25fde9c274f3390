use crate::cluster::TopicPartition;
use crate::commitlog::{Log, LogFactory};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

// Replication only tracks offsets, so this is enough to drive it without a storage engine. Real
// brokers plug their segment store in through `LogFactory`.
pub struct InMemoryLog {
    entries: Mutex<Vec<Vec<u8>>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        InMemoryLog {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// append() appends a message, then returns the offset that was just used.
    pub fn append(&self, entry: Vec<u8>) -> u64 {
        let mut entries = self.entries.lock().expect("InMemoryLog.append() mutex guard poison");
        entries.push(entry);
        (entries.len() - 1) as u64
    }

    pub fn read(&self, offset: u64) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .expect("InMemoryLog.read() mutex guard poison")
            .get(offset as usize)
            .cloned()
    }
}

impl Log for InMemoryLog {
    fn log_end_offset(&self) -> u64 {
        self.entries
            .lock()
            .expect("InMemoryLog.log_end_offset() mutex guard poison")
            .len() as u64
    }

    fn truncate_to(&self, offset: u64) -> Result<(), io::Error> {
        self.entries
            .lock()
            .expect("InMemoryLog.truncate_to() mutex guard poison")
            .truncate(offset as usize);
        Ok(())
    }
}

pub struct InMemoryLogFactory {
    logs: Mutex<HashMap<TopicPartition, Arc<InMemoryLog>>>,
}

impl InMemoryLogFactory {
    pub fn new() -> Self {
        InMemoryLogFactory {
            logs: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the log previously handed out for `topic_partition`, so callers can append to it.
    pub fn log(&self, topic_partition: &TopicPartition) -> Option<Arc<InMemoryLog>> {
        self.logs
            .lock()
            .expect("InMemoryLogFactory.log() mutex guard poison")
            .get(topic_partition)
            .cloned()
    }

    pub fn log_or_create(&self, topic_partition: &TopicPartition) -> Arc<InMemoryLog> {
        self.logs
            .lock()
            .expect("InMemoryLogFactory.log_or_create() mutex guard poison")
            .entry(topic_partition.clone())
            .or_insert_with(|| Arc::new(InMemoryLog::new()))
            .clone()
    }
}

impl LogFactory for InMemoryLogFactory {
    fn get_or_create_log(&self, topic_partition: &TopicPartition) -> Result<Arc<dyn Log>, io::Error> {
        let log: Arc<dyn Log> = self.log_or_create(topic_partition);
        Ok(log)
    }
}
