use tokio::sync::watch;
use tokio::time::{Duration, Instant};

/// Clock is the source of time for lag tracking and scheduled jobs, so both can be driven by a
/// mock in tests.
#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep_until(&self, deadline: Instant);
}

#[derive(Copy, Clone, Default)]
pub struct RealClock;

#[async_trait::async_trait]
impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

pub fn mocked_clock() -> (MockClock, MockClockController) {
    let now = Instant::now();
    let (tx, rx) = watch::channel(now);
    let clock = MockClock { current_time: rx };
    let controller = MockClockController {
        current_time: tx,
        time_of_instantiation: now,
    };

    (clock, controller)
}

/// MockClock only moves when its `MockClockController` advances it.
#[derive(Clone)]
pub struct MockClock {
    current_time: watch::Receiver<Instant>,
}

#[async_trait::async_trait]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current_time.borrow()
    }

    async fn sleep_until(&self, deadline: Instant) {
        let mut current_time = self.current_time.clone();
        loop {
            if *current_time.borrow_and_update() >= deadline {
                return;
            }

            if current_time.changed().await.is_err() {
                // Controller is gone, time will never advance again.
                std::future::pending::<()>().await;
            }
        }
    }
}

pub struct MockClockController {
    current_time: watch::Sender<Instant>,
    time_of_instantiation: Instant,
}

impl MockClockController {
    pub fn current_time(&self) -> Instant {
        *self.current_time.borrow()
    }

    pub fn elapsed_time(&self) -> Duration {
        self.current_time() - self.time_of_instantiation
    }

    /// Advancing by large steps can be surprising: `sleep_until()` only promises to return once
    /// `now` is at or past its deadline, so a sleeper woken by a 5 minute jump observes a `now`
    /// roughly 5 minutes past what it asked for. Advance in steps smaller than what you want to
    /// observe.
    pub fn advance(&self, duration: Duration) {
        let new_now = self.current_time() + duration;
        self.current_time.send_replace(new_now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn mock_clock() {
        let tick_duration = Duration::from_millis(500);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let (mock_clock, controller) = mocked_clock();
        let test_start_time = controller.current_time();

        tokio::spawn(async move {
            let mut next_wake = test_start_time;
            loop {
                next_wake += tick_duration;
                mock_clock.sleep_until(next_wake).await;
                if tx.send(()).is_err() {
                    return;
                }
            }
        });

        // Half-tick offset avoids off-by-one confusion.
        controller.advance(tick_duration / 2);
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .expect_err("Expected timeout");

        controller.advance(tick_duration);
        rx.recv().await.unwrap();
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .expect_err("Expected timeout");

        // Advance multiple ticks at once
        controller.advance(tick_duration * 3);
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .expect_err("Expected timeout");

        assert_eq!(controller.elapsed_time(), tick_duration * 9 / 2);
    }
}
