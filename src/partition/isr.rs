use crate::cluster::{LeaderAndIsr, TopicPartition};

/// IsrChangePublisher persists a leader's ISR change where the controller can see it. Updates are
/// conditional on `leader_and_isr.isr_version` still being the stored version; on success the new
/// version is returned.
pub trait IsrChangePublisher: Send + Sync {
    fn publish_isr(
        &self,
        topic_partition: &TopicPartition,
        leader_and_isr: &LeaderAndIsr,
    ) -> Result<i32, IsrPublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum IsrPublishError {
    #[error("ISR version conflict, stored version is {stored_version}")]
    VersionConflict { stored_version: i32 },
    #[error("ISR store unavailable: {0}")]
    Unavailable(String),
}
