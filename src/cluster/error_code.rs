use crate::partition::PartitionError;
use crate::replica_manager::ReplicaManagerError;

/// Per-partition error codes relayed back to the controller. The numeric values are part of the
/// inter-broker contract and must not change.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ErrorCode {
    None,
    Unknown,
    UnknownTopicOrPartition,
    LeaderNotAvailable,
    ReplicaNotAvailable,
    StaleControllerEpoch,
    StaleLeaderEpoch,
}

impl ErrorCode {
    pub fn code(&self) -> i16 {
        match self {
            ErrorCode::None => 0,
            ErrorCode::Unknown => -1,
            ErrorCode::UnknownTopicOrPartition => 3,
            ErrorCode::LeaderNotAvailable => 5,
            ErrorCode::ReplicaNotAvailable => 9,
            ErrorCode::StaleControllerEpoch => 11,
            ErrorCode::StaleLeaderEpoch => 13,
        }
    }

    pub fn is_error(&self) -> bool {
        *self != ErrorCode::None
    }
}

impl From<&PartitionError> for ErrorCode {
    fn from(error: &PartitionError) -> Self {
        match error {
            PartitionError::StaleLeaderEpoch { .. } => ErrorCode::StaleLeaderEpoch,
            PartitionError::NotAssignedReplica { .. } => ErrorCode::ReplicaNotAvailable,
            PartitionError::LogInitialization(_) | PartitionError::LogTruncation(_) => ErrorCode::Unknown,
        }
    }
}

impl From<&ReplicaManagerError> for ErrorCode {
    fn from(error: &ReplicaManagerError) -> Self {
        match error {
            ReplicaManagerError::ReplicaNotAvailable { .. } => ErrorCode::ReplicaNotAvailable,
            ReplicaManagerError::UnknownTopicOrPartition(_) => ErrorCode::UnknownTopicOrPartition,
            ReplicaManagerError::LeaderNotAvailable(_) => ErrorCode::LeaderNotAvailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{BrokerId, TopicPartition};
    use std::io;

    #[test]
    fn codes_are_stable() {
        assert_eq!(0, ErrorCode::None.code());
        assert_eq!(-1, ErrorCode::Unknown.code());
        assert_eq!(3, ErrorCode::UnknownTopicOrPartition.code());
        assert_eq!(5, ErrorCode::LeaderNotAvailable.code());
        assert_eq!(9, ErrorCode::ReplicaNotAvailable.code());
        assert_eq!(11, ErrorCode::StaleControllerEpoch.code());
        assert_eq!(13, ErrorCode::StaleLeaderEpoch.code());
        assert!(!ErrorCode::None.is_error());
    }

    #[test]
    fn partition_errors_map_to_codes() {
        let stale = PartitionError::StaleLeaderEpoch {
            current_epoch: 4,
            requested_epoch: 3,
        };
        assert_eq!(ErrorCode::StaleLeaderEpoch, ErrorCode::from(&stale));

        let io_failure = PartitionError::LogInitialization(io::Error::new(io::ErrorKind::Other, "disk gone"));
        assert_eq!(ErrorCode::Unknown, ErrorCode::from(&io_failure));

        let missing = ReplicaManagerError::ReplicaNotAvailable {
            topic_partition: TopicPartition::new("t", 0),
            replica_id: BrokerId::new(1),
        };
        assert_eq!(ErrorCode::ReplicaNotAvailable, ErrorCode::from(&missing));
    }
}
