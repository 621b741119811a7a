//! Injectable sleeping
//!
//! Every suspension point (rate-limit waits, retry backoff, inter-batch
//! pacing) goes through a [`Sleeper`] so tests can observe the requested
//! durations without waiting, and through [`Pause`] so a shutdown request
//! interrupts the wait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::shutdown::SharedShutdown;

/// Suspends the current task for a duration
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleep for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A [`Sleeper`] paired with an optional cancellation token
#[derive(Clone)]
pub struct Pause {
    sleeper: Arc<dyn Sleeper>,
    shutdown: Option<SharedShutdown>,
}

impl Pause {
    /// Build from explicit parts
    pub fn new(sleeper: Arc<dyn Sleeper>, shutdown: Option<SharedShutdown>) -> Self {
        Self { sleeper, shutdown }
    }

    /// Replace the sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Attach a cancellation token
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    /// Sleep for `duration` unless cancelled first
    ///
    /// Returns `false` if cancellation was requested before or during the wait.
    pub async fn wait(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    _ = self.sleeper.sleep(duration) => true,
                    _ = shutdown.wait_for_shutdown() => {
                        debug!(
                            wait_ms = duration.as_millis() as u64,
                            "Wait interrupted by shutdown"
                        );
                        false
                    }
                }
            }
            None => {
                self.sleeper.sleep(duration).await;
                true
            }
        }
    }
}

impl Default for Pause {
    fn default() -> Self {
        Self::new(Arc::new(TokioSleeper), crate::shutdown::get_global_shutdown())
    }
}

impl std::fmt::Debug for Pause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pause")
            .field("cancellable", &self.shutdown.is_some())
            .finish()
    }
}
