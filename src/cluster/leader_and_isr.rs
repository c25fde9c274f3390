use crate::cluster::{BrokerEndpoint, BrokerId, ErrorCode, TopicPartition};
use std::collections::HashMap;

/// LeaderAndIsr is the controller's decision about one partition: who leads it, who is in sync,
/// and which brokers are assigned a replica of it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaderAndIsr {
    pub leader: BrokerId,
    pub leader_epoch: i32,
    pub isr: Vec<BrokerId>,
    // Version of the persisted ISR, used for conditional updates when the leader shrinks/expands it.
    pub isr_version: i32,
    pub replicas: Vec<BrokerId>,
    pub replication_factor: i32,
}

/// A batch of leadership assignments sent by the controller.
#[derive(Clone, Debug)]
pub struct LeaderAndIsrBatch {
    pub controller_id: BrokerId,
    pub controller_epoch: i32,
    pub partition_states: HashMap<TopicPartition, LeaderAndIsr>,
    pub live_brokers: Vec<BrokerEndpoint>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeaderAndIsrResponse {
    pub error_code: ErrorCode,
    pub partition_errors: HashMap<TopicPartition, ErrorCode>,
}

impl LeaderAndIsrResponse {
    pub(crate) fn rejected(error_code: ErrorCode) -> Self {
        LeaderAndIsrResponse {
            error_code,
            partition_errors: HashMap::new(),
        }
    }
}
