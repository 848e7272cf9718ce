//! Press-and-hold repetition for the quantity buttons.
//!
//! Holding a button applies one step immediately, then after [`HoldTiming::delay`]
//! keeps stepping every [`HoldTiming::interval`] until released. The timer task
//! is aborted on release and when the repeater is dropped, so no tick can
//! arrive after either.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::trace;

/// Timer settings for a held button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldTiming {
    /// Pause between the first step and the repeating ones.
    pub delay: Duration,
    /// Pause between repeating steps.
    pub interval: Duration,
}

impl Default for HoldTiming {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            interval: Duration::from_millis(100),
        }
    }
}

/// A held button. Receive steps from the channel returned by [`Self::press`].
#[derive(Debug)]
pub struct HoldRepeater {
    task: JoinHandle<()>,
}

impl HoldRepeater {
    /// Start repeating. Must be called inside a tokio runtime.
    ///
    /// Each received value is the 1-based step number. Steps the receiver
    /// has not picked up yet are not queued twice: a slow consumer sees
    /// fewer steps, never a burst.
    #[must_use]
    pub fn press(timing: HoldTiming) -> (Self, mpsc::Receiver<u32>) {
        let (tx, rx) = mpsc::channel(1);
        let task = tokio::spawn(async move {
            let mut step = 1;
            if tx.send(step).await.is_err() {
                return;
            }

            time::sleep(timing.delay).await;
            let mut ticker = time::interval(timing.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                step += 1;
                match tx.try_send(step) {
                    Ok(()) => trace!(step, "Hold step"),
                    Err(mpsc::error::TrySendError::Full(_)) => {}
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                }
            }
        });
        (Self { task }, rx)
    }

    /// Stop repeating.
    pub fn release(self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for HoldRepeater {
    fn drop(&mut self) {
        self.task.abort();
    }
}
