use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::bridge::CaptureBridge;
use crate::bridge::PaneTarget;
use crate::config::Settings;
use crate::hub::BroadcastHub;
use crate::poller::AdaptiveInterval;
use crate::poller::PanePoller;
use crate::poller::PollerHandle;
use crate::runtime::BridgeRuntime;
use crate::state::ChannelKind;
use crate::state::PaneId;

/// Pane id of the single console pane.
pub const COMMANDER_PANE: &str = "commander";

struct Channel {
    hub: Arc<BroadcastHub>,
    pollers: Vec<PollerHandle>,
}

/// Process-wide owner of both channels. Built once at startup, torn down at
/// shutdown; there is no ambient global state. The console channel polls the
/// commander pane; the monitor channel runs one independent poller per
/// discovered fleet pane, all publishing into one shared hub.
pub struct ChannelRegistry {
    console: Channel,
    monitor: Channel,
    cancel: CancellationToken,
}

impl ChannelRegistry {
    pub async fn start(
        settings: &Settings,
        bridge: Arc<dyn CaptureBridge>,
        runtime: BridgeRuntime,
    ) -> Self {
        let cancel = CancellationToken::new();

        let console_hub = Arc::new(BroadcastHub::new(ChannelKind::Console));
        let console_poller = PanePoller::new(
            PaneId::new(COMMANDER_PANE),
            PaneTarget::new(settings.tmux.commander_session.clone(), 0),
            settings.tmux.capture_lines,
            Arc::clone(&console_hub),
            Arc::clone(&bridge),
            runtime.clone(),
            AdaptiveInterval::from_tuning(&settings.channels.console),
        )
        .spawn(cancel.child_token());
        let console = Channel {
            hub: console_hub,
            pollers: vec![console_poller],
        };

        let monitor_hub = Arc::new(BroadcastHub::new(ChannelKind::Monitor));
        let fleet_session = settings.tmux.fleet_session.clone();
        let discovered = {
            let bridge = Arc::clone(&bridge);
            let session = fleet_session.clone();
            runtime.run(move || bridge.list_fleet_panes(&session)).await
        };
        let panes = match discovered {
            Ok(panes) => panes,
            Err(err) => {
                warn!(
                    session = %fleet_session,
                    error = %err,
                    "fleet pane discovery failed, monitor channel starts empty"
                );
                Vec::new()
            }
        };
        info!(
            session = %fleet_session,
            panes = panes.len(),
            "monitor channel starting"
        );
        let pollers = panes
            .into_iter()
            .map(|pane| {
                PanePoller::new(
                    PaneId::new(pane.agent_id),
                    PaneTarget::new(fleet_session.clone(), pane.index),
                    settings.tmux.capture_lines,
                    Arc::clone(&monitor_hub),
                    Arc::clone(&bridge),
                    runtime.clone(),
                    AdaptiveInterval::from_tuning(&settings.channels.monitor),
                )
                .spawn(cancel.child_token())
            })
            .collect();
        let monitor = Channel {
            hub: monitor_hub,
            pollers,
        };

        Self {
            console,
            monitor,
            cancel,
        }
    }

    pub fn hub(&self, channel: ChannelKind) -> &Arc<BroadcastHub> {
        match channel {
            ChannelKind::Console => &self.console.hub,
            ChannelKind::Monitor => &self.monitor.hub,
        }
    }

    /// Resume every poller of a channel that suspended on a missing pane.
    pub fn revive(&self, channel: ChannelKind) {
        let pollers = match channel {
            ChannelKind::Console => &self.console.pollers,
            ChannelKind::Monitor => &self.monitor.pollers,
        };
        for poller in pollers {
            poller.revive();
        }
        info!(channel = %channel, "pollers revived");
    }

    /// Drop a channel's accumulated pane state so every pane republishes a
    /// fresh snapshot on its next tick.
    pub async fn clear(&self, channel: ChannelKind) {
        self.hub(channel).clear().await;
    }

    /// Stop every poller. Subscriber connections are closed by their own
    /// handlers; this only tears down the polling side.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for poller in self
            .console
            .pollers
            .into_iter()
            .chain(self.monitor.pollers)
        {
            poller.join().await;
        }
        info!("channel registry stopped");
    }
}
