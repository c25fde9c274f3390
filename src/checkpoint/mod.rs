mod high_watermark;

pub(crate) use high_watermark::is_checkpointable_topic;
pub use high_watermark::CheckpointError;
pub use high_watermark::HighWatermarkCheckpoint;
pub use high_watermark::HIGH_WATERMARK_CHECKPOINT_FILE;
