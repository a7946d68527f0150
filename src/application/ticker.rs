use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerFlow {
    Continue,
    /// Keep ticking, but count the next period from now.
    Rearm,
    Stop,
}

/// Owns the periodic tick task. Dropping the guard aborts the task, so the
/// tick source can never outlive whoever holds it.
#[derive(Debug)]
pub struct TickerGuard {
    handle: JoinHandle<()>,
}

impl TickerGuard {
    /// The first tick fires one full `period` after spawning.
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickerFlow> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match on_tick().await {
                    TickerFlow::Continue => {}
                    TickerFlow::Rearm => interval.reset(),
                    TickerFlow::Stop => break,
                }
            }
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
