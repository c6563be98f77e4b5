use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::bridge::BridgeError;
use crate::bridge::CaptureBridge;
use crate::bridge::PaneTarget;
use crate::config::PollTuning;
use crate::hub::BroadcastHub;
use crate::hub::PublishOutcome;
use crate::runtime::BridgeRuntime;
use crate::state::PaneId;

/// Sampling interval state machine: resets to the base on change, doubles
/// toward the ceiling once the no-change streak reaches the threshold. The
/// streak only resets on an actual change.
#[derive(Debug, Clone)]
pub struct AdaptiveInterval {
    base: Duration,
    max: Duration,
    threshold: u32,
    current: Duration,
    streak: u32,
}

impl AdaptiveInterval {
    pub fn new(base: Duration, max: Duration, threshold: u32) -> Self {
        Self {
            base,
            max,
            threshold,
            current: base,
            streak: 0,
        }
    }

    pub fn from_tuning(tuning: &PollTuning) -> Self {
        Self::new(
            Duration::from_millis(tuning.base_interval_ms),
            Duration::from_millis(tuning.max_interval_ms),
            tuning.no_change_threshold,
        )
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn on_change(&mut self) {
        self.streak = 0;
        self.current = self.base;
    }

    pub fn on_no_change(&mut self) {
        self.streak += 1;
        if self.streak >= self.threshold {
            self.current = self.current.saturating_mul(2).min(self.max);
        }
    }
}

/// Handle to a running pane poller.
pub struct PollerHandle {
    revive: watch::Sender<()>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Resume a poller suspended by a missing pane. A signal delivered while
    /// the poller is still ticking is discarded when it later suspends; only
    /// a revive issued during suspension resumes it.
    pub fn revive(&self) {
        let _ = self.revive.send(());
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Per-pane capture loop. Each tick runs the blocking capture on the worker
/// pool, hands the result to the channel hub, and adapts its own interval.
/// At most one capture per pane is ever outstanding because the next tick is
/// scheduled only after the previous capture completes.
pub struct PanePoller {
    pane: PaneId,
    target: PaneTarget,
    capture_lines: u32,
    hub: Arc<BroadcastHub>,
    bridge: Arc<dyn CaptureBridge>,
    runtime: BridgeRuntime,
    interval: AdaptiveInterval,
}

impl PanePoller {
    pub fn new(
        pane: PaneId,
        target: PaneTarget,
        capture_lines: u32,
        hub: Arc<BroadcastHub>,
        bridge: Arc<dyn CaptureBridge>,
        runtime: BridgeRuntime,
        interval: AdaptiveInterval,
    ) -> Self {
        Self {
            pane,
            target,
            capture_lines,
            hub,
            bridge,
            runtime,
            interval,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> PollerHandle {
        let (revive_tx, revive_rx) = watch::channel(());
        let task = tokio::spawn(self.run(cancel, revive_rx));
        PollerHandle {
            revive: revive_tx,
            task,
        }
    }

    async fn run(mut self, cancel: CancellationToken, mut revive: watch::Receiver<()>) {
        info!(channel = %self.hub.channel(), pane = %self.pane, "poller started");
        loop {
            match self.tick().await {
                Ok(outcome) => match outcome {
                    PublishOutcome::Published => self.interval.on_change(),
                    PublishOutcome::Unchanged => self.interval.on_no_change(),
                },
                Err(BridgeError::PaneNotFound { .. }) => {
                    warn!(
                        channel = %self.hub.channel(),
                        pane = %self.pane,
                        "pane gone, poller suspended"
                    );
                    self.hub
                        .broadcast_error(&format!("pane {} is unavailable", self.pane))
                        .await;
                    // Discard any revive signaled while this poller was
                    // still healthy; only a revive issued from here on
                    // resumes it.
                    revive.borrow_and_update();
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        changed = revive.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            info!(channel = %self.hub.channel(), pane = %self.pane, "poller revived");
                            self.interval.on_change();
                            continue;
                        }
                    }
                }
                Err(err) => {
                    // Transient failure: keep ticking, the next capture may
                    // succeed.
                    warn!(
                        channel = %self.hub.channel(),
                        pane = %self.pane,
                        error = %err,
                        "capture failed"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval.current()) => {}
            }
        }
        debug!(channel = %self.hub.channel(), pane = %self.pane, "poller stopped");
    }

    async fn tick(&self) -> Result<PublishOutcome, BridgeError> {
        let bridge = Arc::clone(&self.bridge);
        let target = self.target.clone();
        let lines = self.capture_lines;
        let text = self
            .runtime
            .run(move || bridge.capture(&target, lines))
            .await?;
        Ok(self.hub.publish_capture(&self.pane, text).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_interval() -> AdaptiveInterval {
        AdaptiveInterval::new(
            Duration::from_millis(1000),
            Duration::from_millis(3000),
            2,
        )
    }

    #[test]
    fn starts_at_base_interval() {
        assert_eq!(sample_interval().current(), Duration::from_millis(1000));
    }

    #[test]
    fn no_change_streak_backs_off_toward_the_ceiling() {
        let mut interval = sample_interval();

        interval.on_no_change();
        assert_eq!(interval.current(), Duration::from_millis(1000));

        interval.on_no_change();
        assert_eq!(interval.current(), Duration::from_millis(2000));

        interval.on_no_change();
        assert_eq!(interval.current(), Duration::from_millis(3000));

        interval.on_no_change();
        assert_eq!(interval.current(), Duration::from_millis(3000));
    }

    #[test]
    fn change_resets_interval_and_streak() {
        let mut interval = sample_interval();
        interval.on_no_change();
        interval.on_no_change();
        interval.on_no_change();
        assert_eq!(interval.current(), Duration::from_millis(3000));

        interval.on_change();
        assert_eq!(interval.current(), Duration::from_millis(1000));

        // The streak restarted: one quiet tick stays below the threshold.
        interval.on_no_change();
        assert_eq!(interval.current(), Duration::from_millis(1000));
    }

    #[test]
    fn interval_never_drops_below_base() {
        let mut interval = sample_interval();
        for _ in 0..10 {
            interval.on_no_change();
        }
        interval.on_change();
        assert_eq!(interval.current(), Duration::from_millis(1000));
    }
}
