use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A periodic callback on the runtime, stopped through its cancellation handle.
///
/// The callback returns `false` to end the task from the inside (for example once the receiver
/// it feeds has gone away). Dropping the task cancels it.
pub struct RecurringTask {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RecurringTask {
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut(Instant) -> bool + Send + 'static,
    {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            // The first tick of `interval` completes immediately; start one period in.
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    at = ticker.tick() => {
                        if !on_tick(at) {
                            break;
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        Self {
            cancel_token,
            handle: Some(handle),
        }
    }

    pub fn cancellation_handle(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Cancel and wait for the task to exit.
    pub async fn stop(mut self) -> Result<()> {
        self.cancel_token.cancel();
        match self.handle.take() {
            Some(handle) => handle.await.context("recurring task failed to join"),
            None => Ok(()),
        }
    }
}

impl Drop for RecurringTask {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
