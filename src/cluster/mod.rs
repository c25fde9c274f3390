mod error_code;
mod ids;
mod leader_and_isr;

pub use error_code::ErrorCode;
pub use ids::BrokerEndpoint;
pub use ids::BrokerId;
pub use ids::TopicPartition;
pub use leader_and_isr::LeaderAndIsr;
pub use leader_and_isr::LeaderAndIsrBatch;
pub use leader_and_isr::LeaderAndIsrResponse;
