use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

/// Countdown backing ADD mode. Ticks report the remaining whole seconds;
/// reaching zero runs the expiry continuation once. Dropping the handle does
/// not stop the countdown, only [`SessionTimer::cancel`] does.
pub struct SessionTimer {
    id: u64,
    handle: JoinHandle<()>,
}

impl SessionTimer {
    pub fn start<T, E, Fut>(
        id: u64,
        total: Duration,
        tick: Duration,
        mut on_tick: T,
        on_expire: E,
    ) -> Self
    where
        T: FnMut(u64) + Send + 'static,
        E: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut remaining = total;
            if !tick.is_zero() {
                on_tick(remaining.as_secs());
                let mut ticker = interval_at(Instant::now() + tick, tick);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                while !remaining.is_zero() {
                    // A total that is not a whole number of ticks ends on a
                    // short final step.
                    if remaining < tick {
                        tokio::time::sleep(remaining).await;
                        remaining = Duration::ZERO;
                    } else {
                        ticker.tick().await;
                        remaining -= tick;
                    }
                    if !remaining.is_zero() {
                        on_tick(remaining.as_secs());
                    }
                }
            } else {
                tokio::time::sleep(total).await;
            }
            on_expire(id).await;
        });

        Self { id, handle }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        self.handle.abort();
    }
}
