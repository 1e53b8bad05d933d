//! Single-shot execution deadline.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default execution-time ceiling.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A deferred check that fires once after a fixed duration.
///
/// The guard only signals; the session owning the process decides whether
/// a kill is still needed when it observes the signal. Disarming or
/// dropping the guard cancels the timer task.
#[derive(Debug)]
pub struct TimeoutGuard {
    fired: CancellationToken,
    timer: Option<JoinHandle<()>>,
    duration: Duration,
}

impl TimeoutGuard {
    /// Arm a guard that fires after `duration`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(duration: Duration) -> Self {
        let fired = CancellationToken::new();
        let signal = fired.clone();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            debug!(timeout_ms = duration.as_millis() as u64, "timeout guard fired");
            signal.cancel();
        });

        Self {
            fired,
            timer: Some(timer),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Completes when the deadline passes.
    pub async fn fired(&self) {
        self.fired.cancelled().await;
    }

    pub fn has_fired(&self) -> bool {
        self.fired.is_cancelled()
    }

    /// Cancel the timer without firing. Returns whether it had already fired.
    pub fn disarm(mut self) -> bool {
        self.stop_timer();
        self.has_fired()
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
