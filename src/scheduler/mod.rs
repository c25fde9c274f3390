mod scheduler;
mod time;

pub use scheduler::ScheduledJob;
pub use scheduler::Scheduler;
pub use scheduler::TimerScheduler;
pub use time::mocked_clock;
pub use time::Clock;
pub use time::MockClock;
pub use time::MockClockController;
pub use time::RealClock;
