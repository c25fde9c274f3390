use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Default)]
pub struct ReplicaManagerOptions {
    // A follower that has not fetched for this long drops out of the ISR. Also the period of the
    // ISR expiration job.
    pub replica_lag_time_max: Option<Duration>,
    // A follower more than this many messages behind the leader drops out of the ISR.
    pub replica_lag_max_messages: Option<u64>,
    pub replica_high_watermark_checkpoint_interval: Option<Duration>,
}

#[derive(Clone, Debug)]
pub(crate) struct ReplicaManagerOptionsValidated {
    pub replica_lag_time_max: Duration,
    pub replica_lag_max_messages: u64,
    pub replica_high_watermark_checkpoint_interval: Duration,
}

impl ReplicaManagerOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.replica_lag_time_max == Duration::from_millis(0) {
            return Err("Replica max lag time must be greater than zero");
        }
        if self.replica_high_watermark_checkpoint_interval == Duration::from_millis(0) {
            return Err("High watermark checkpoint interval must be greater than zero");
        }

        Ok(())
    }
}

impl TryFrom<ReplicaManagerOptions> for ReplicaManagerOptionsValidated {
    type Error = &'static str;

    fn try_from(options: ReplicaManagerOptions) -> Result<Self, Self::Error> {
        let values = ReplicaManagerOptionsValidated {
            replica_lag_time_max: options.replica_lag_time_max.unwrap_or(Duration::from_secs(10)),
            replica_lag_max_messages: options.replica_lag_max_messages.unwrap_or(4000),
            replica_high_watermark_checkpoint_interval: options
                .replica_high_watermark_checkpoint_interval
                .unwrap_or(Duration::from_secs(5)),
        };

        values.validate()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ReplicaManagerOptionsValidated::try_from(ReplicaManagerOptions::default()).unwrap();
        assert_eq!(Duration::from_secs(10), options.replica_lag_time_max);
        assert_eq!(4000, options.replica_lag_max_messages);
        assert_eq!(Duration::from_secs(5), options.replica_high_watermark_checkpoint_interval);
    }

    #[test]
    fn zero_durations_are_rejected() {
        let options = ReplicaManagerOptions {
            replica_lag_time_max: Some(Duration::from_millis(0)),
            ..Default::default()
        };
        assert!(ReplicaManagerOptionsValidated::try_from(options).is_err());

        let options = ReplicaManagerOptions {
            replica_high_watermark_checkpoint_interval: Some(Duration::from_millis(0)),
            ..Default::default()
        };
        assert!(ReplicaManagerOptionsValidated::try_from(options).is_err());
    }

    #[test]
    fn zero_lag_messages_is_allowed() {
        let options = ReplicaManagerOptions {
            replica_lag_max_messages: Some(0),
            ..Default::default()
        };
        let options = ReplicaManagerOptionsValidated::try_from(options).unwrap();
        assert_eq!(0, options.replica_lag_max_messages);
    }
}
