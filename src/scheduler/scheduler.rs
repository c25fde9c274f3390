use crate::scheduler::time::{Clock, RealClock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::time::{Duration, Instant};

pub type ScheduledJob = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler runs named recurring jobs. Firings of the same job never overlap.
pub trait Scheduler: Send + Sync {
    /// Runs `job` once `delay` has passed, then every `period` at a fixed rate.
    fn schedule(&self, name: &str, job: ScheduledJob, delay: Duration, period: Duration);
}

/// TimerScheduler drives each job from its own tokio task. Jobs are synchronous and may block
/// (e.g. file IO), so each firing runs on the blocking pool and the timer waits for it to finish
/// before arming the next one.
pub struct TimerScheduler {
    logger: slog::Logger,
    runtime: Handle,
    clock: Arc<dyn Clock>,
    running_jobs: Mutex<Vec<JobGuard>>,
}

impl TimerScheduler {
    pub fn new(logger: slog::Logger, runtime: Handle) -> Self {
        Self::with_clock(logger, runtime, Arc::new(RealClock))
    }

    pub fn with_clock(logger: slog::Logger, runtime: Handle, clock: Arc<dyn Clock>) -> Self {
        TimerScheduler {
            logger,
            runtime,
            clock,
            running_jobs: Mutex::new(Vec::new()),
        }
    }

    /// Stops every scheduled job. A firing that is already in progress runs to completion.
    pub fn shutdown(&self) {
        let stopped: Vec<JobGuard> = self
            .running_jobs
            .lock()
            .expect("TimerScheduler.shutdown() mutex guard poison")
            .drain(..)
            .collect();
        slog::info!(self.logger, "Stopping {} scheduled job(s)", stopped.len());
    }
}

impl Scheduler for TimerScheduler {
    fn schedule(&self, name: &str, job: ScheduledJob, delay: Duration, period: Duration) {
        let (guard, cancelled) = JobGuard::new();
        let task = TimerTask {
            logger: self.logger.new(slog::o!("Job" => name.to_string())),
            job,
            clock: self.clock.clone(),
            first_run: self.clock.now() + delay,
            period,
            cancelled,
        };

        slog::info!(
            self.logger,
            "Scheduling job '{}' with delay {:?} and period {:?}",
            name,
            delay,
            period
        );
        self.runtime.spawn(task.run());
        self.running_jobs
            .lock()
            .expect("TimerScheduler.schedule() mutex guard poison")
            .push(guard);
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Flips the shared flag when dropped. The timer task checks it each time it wakes.
struct JobGuard {
    cancelled: Arc<AtomicBool>,
}

impl JobGuard {
    fn new() -> (Self, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            JobGuard {
                cancelled: cancelled.clone(),
            },
            cancelled,
        )
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

struct TimerTask {
    logger: slog::Logger,
    job: ScheduledJob,
    clock: Arc<dyn Clock>,
    first_run: Instant,
    period: Duration,
    cancelled: Arc<AtomicBool>,
}

impl TimerTask {
    async fn run(self) {
        let mut next_run = self.first_run;
        loop {
            self.clock.sleep_until(next_run).await;
            if self.cancelled.load(Ordering::Acquire) {
                slog::debug!(self.logger, "Job cancelled");
                return;
            }

            let job = self.job.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || (*job)()).await {
                slog::error!(self.logger, "Scheduled job failed: {:?}", e);
            }

            // Fixed rate, but a run that overshot its slot does not cause a burst of catch-up runs.
            next_run += self.period;
            let now = self.clock.now();
            if next_run < now {
                next_run = now;
            }
        }
    }
}
