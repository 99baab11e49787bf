use crate::runtime::{default_spawner, AsyncSpawner, TaskHandle};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Repeating timer that never stacks: starting it again replaces the
/// previous schedule, and stopping or dropping it cancels the pending tick.
///
/// The tick closure owns whatever it needs; the timer keeps no reference to
/// the object that started it.
pub struct FrameTimer {
    spawner: Arc<dyn AsyncSpawner>,
    task: Option<TaskHandle>,
}

impl FrameTimer {
    pub fn new(spawner: Arc<dyn AsyncSpawner>) -> Self {
        Self { spawner, task: None }
    }

    /// First tick fires one `period` from now
    pub fn start<F>(&mut self, period: Duration, mut on_tick: F)
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        self.stop();
        self.task = Some(self.spawner.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if on_tick().is_break() {
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(default_spawner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let mut timer = FrameTimer::default();
        timer.start(Duration::from_millis(400), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        });

        tokio::time::sleep(Duration::from_millis(399)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(1250)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 4);

        timer.stop();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_does_not_stack() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut timer = FrameTimer::default();
        for _ in 0..3 {
            let counter = ticks.clone();
            timer.start(Duration::from_millis(100), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            });
        }

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_ends_timer() {
        let mut timer = FrameTimer::default();
        timer.start(Duration::from_millis(100), || ControlFlow::Break(()));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!timer.is_running());
    }
}
