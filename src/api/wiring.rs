use crate::api::options::ReplicaManagerOptionsValidated;
use crate::checkpoint::HighWatermarkCheckpoint;
use crate::cluster::BrokerId;
use crate::commitlog::LogFactory;
use crate::fetcher::FetcherManager;
use crate::partition::{IsrChangePublisher, PartitionContext};
use crate::replica_manager::{ReplicaManager, ReplicaMetrics};
use crate::scheduler::{Clock, Scheduler};
use crate::ReplicaManagerOptions;
use std::convert::TryFrom;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub struct ReplicaManagerConfig {
    pub broker_id: i32,
    // Where the high watermark checkpoint file lives. Created if missing.
    pub log_dir: PathBuf,
    pub info_logger: slog::Logger,
    pub options: ReplicaManagerOptions,
}

/// The broker components the replica manager drives but does not own.
pub struct ReplicaManagerDependencies {
    pub scheduler: Arc<dyn Scheduler>,
    pub fetcher_manager: Arc<dyn FetcherManager>,
    pub log_factory: Arc<dyn LogFactory>,
    pub isr_publisher: Arc<dyn IsrChangePublisher>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicaManagerCreationError {
    #[error("Illegal options for configuring replica manager: {0}")]
    IllegalOptions(String),
    #[error("Log directory initialization failure")]
    LogDirectory(#[source] io::Error),
    #[error("Broker id must not be negative, got {0}")]
    InvalidBrokerId(i32),
}

pub fn try_create_replica_manager(
    config: ReplicaManagerConfig,
    dependencies: ReplicaManagerDependencies,
) -> Result<Arc<ReplicaManager>, ReplicaManagerCreationError> {
    if config.broker_id < 0 {
        return Err(ReplicaManagerCreationError::InvalidBrokerId(config.broker_id));
    }
    let broker_id = BrokerId::new(config.broker_id);

    let options = ReplicaManagerOptionsValidated::try_from(config.options)
        .map_err(|e| ReplicaManagerCreationError::IllegalOptions(e.to_string()))?;

    fs::create_dir_all(&config.log_dir).map_err(ReplicaManagerCreationError::LogDirectory)?;

    let root_logger = config.info_logger.new(slog::o!("BrokerId" => config.broker_id));

    let context = Arc::new(PartitionContext {
        logger: root_logger.clone(),
        local_broker_id: broker_id,
        clock: dependencies.clock,
        log_factory: dependencies.log_factory,
        fetcher_manager: dependencies.fetcher_manager,
        isr_publisher: dependencies.isr_publisher,
        checkpoint: Arc::new(HighWatermarkCheckpoint::new(&config.log_dir)),
        metrics: Arc::new(ReplicaMetrics::new()),
    });

    slog::info!(
        root_logger,
        "Created replica manager with log dir {:?} and {:?}",
        config.log_dir,
        options
    );

    Ok(Arc::new(ReplicaManager::new(
        root_logger,
        context,
        dependencies.scheduler,
        options,
    )))
}
