//! Cancellable periodic ticker backing live mode.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::MAX_TICK_SECS;
use crate::error::{AutosocError, ConfigError};

/// Handle to a running ticker task.
///
/// The first tick fires one `period` after spawning. Ticks that fall behind
/// are skipped rather than replayed, and a tick never overlaps another.
#[derive(Debug)]
pub struct LiveTicker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    period: Duration,
}

impl LiveTicker {
    /// Spawn a ticker calling `on_tick` every `period` until stopped or until
    /// `on_tick` breaks. `period` must be between one second and
    /// [`MAX_TICK_SECS`].
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Result<Self, AutosocError>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        if period < Duration::from_secs(1) {
            return Err(ConfigError::ZeroTickPeriod.into());
        }
        if period > Duration::from_secs(MAX_TICK_SECS) {
            return Err(ConfigError::TickPeriodTooLong {
                secs: period.as_secs(),
                max: MAX_TICK_SECS,
            }
            .into());
        }
        let runtime = Handle::try_current().map_err(|_| AutosocError::NoRuntime)?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_ms = period.as_millis() as u64, "Live ticker started");

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        debug!("Live ticker cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if on_tick().is_break() {
                            debug!("Live ticker target dropped");
                            break;
                        }
                    }
                }
            }
            info!("Live ticker stopped");
        });

        Ok(Self {
            cancel,
            handle,
            period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Signal the task to stop. No tick starts after this returns.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}
