use std::collections::BTreeMap;
use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;

use crate::delta;
use crate::delta::DeltaPayload;
use crate::fingerprint::detect_change;
use crate::state::ChannelKind;
use crate::state::PaneId;
use crate::state::PaneState;
use crate::wire::Frame;

/// Suggested capacity for a subscriber's frame queue. A subscriber that
/// falls further behind than this misses frames and is healed with a fresh
/// snapshot on the next publish.
pub const SUBSCRIBER_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Content changed; the channel version advanced and frames went out.
    Published,
    /// Fingerprint matched the stored state; nothing was sent.
    Unchanged,
}

struct SubscriberEntry {
    tx: mpsc::Sender<Frame>,
    /// Version of the last frame this subscriber actually received. A patch
    /// is only sent when this equals the patch's base version.
    last_sent: u64,
}

struct HubInner {
    version: u64,
    panes: BTreeMap<PaneId, PaneState>,
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    next_subscriber: u64,
}

/// Per-channel subscriber registry and pane state. All sends for a channel
/// are serialized under the hub lock; only this channel's pollers and
/// connection handlers touch the inner state.
pub struct BroadcastHub {
    channel: ChannelKind,
    inner: Mutex<HubInner>,
}

impl BroadcastHub {
    pub fn new(channel: ChannelKind) -> Self {
        Self {
            channel,
            inner: Mutex::new(HubInner {
                version: 0,
                panes: BTreeMap::new(),
                subscribers: HashMap::new(),
                next_subscriber: 0,
            }),
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    /// Register a subscriber and immediately deliver a full snapshot of every
    /// pane at the channel's current version, so the first record a
    /// subscriber sees is never a dangling patch.
    pub async fn join(&self, tx: mpsc::Sender<Frame>) -> SubscriberId {
        let mut inner = self.inner.lock().await;
        let id = SubscriberId(inner.next_subscriber);
        inner.next_subscriber += 1;

        let version = inner.version;
        for state in inner.panes.values() {
            let frame = Frame::Snapshot {
                channel: self.channel,
                pane: state.pane.clone(),
                version,
                content: state.text.clone(),
            };
            if tx.try_send(frame).is_err() {
                break;
            }
        }

        inner
            .subscribers
            .insert(id, SubscriberEntry { tx, last_sent: version });
        info!(
            channel = %self.channel,
            subscribers = inner.subscribers.len(),
            "subscriber joined"
        );
        id
    }

    /// Remove a subscriber. Idempotent: a second call for the same id is a
    /// no-op.
    pub async fn leave(&self, id: SubscriberId) {
        let mut inner = self.inner.lock().await;
        if inner.subscribers.remove(&id).is_some() {
            info!(
                channel = %self.channel,
                subscribers = inner.subscribers.len(),
                "subscriber left"
            );
        }
    }

    /// Commit a fresh capture for `pane` and fan the change out.
    ///
    /// Unchanged content is dropped without touching the version. On change
    /// the version advances by one, subscribers in sync with the base get the
    /// minimal record, and any subscriber whose last-delivered version is
    /// stale gets a fresh snapshot instead.
    pub async fn publish_capture(&self, pane: &PaneId, text: String) -> PublishOutcome {
        let mut inner = self.inner.lock().await;

        let payload = {
            let prev = inner.panes.get(pane);
            let (changed, _) = detect_change(prev.map(|state| &state.fingerprint), &text);
            if !changed {
                return PublishOutcome::Unchanged;
            }
            delta::encode(prev.map(|state| state.text.as_str()), &text)
        };
        let base = inner.version;
        let version = base + 1;
        inner.version = version;
        inner
            .panes
            .insert(pane.clone(), PaneState::new(pane.clone(), text.clone()));

        let mut dropped = Vec::new();
        for (id, entry) in &mut inner.subscribers {
            let frame = if entry.last_sent == base {
                match &payload {
                    DeltaPayload::Snapshot { content } => Frame::Snapshot {
                        channel: self.channel,
                        pane: pane.clone(),
                        version,
                        content: content.clone(),
                    },
                    DeltaPayload::Patch { ops } => Frame::Patch {
                        channel: self.channel,
                        pane: pane.clone(),
                        base_version: base,
                        version,
                        ops: ops.clone(),
                    },
                }
            } else {
                // Missed at least one record; reconcile with a snapshot.
                Frame::Snapshot {
                    channel: self.channel,
                    pane: pane.clone(),
                    version,
                    content: text.clone(),
                }
            };

            match entry.tx.try_send(frame) {
                Ok(()) => entry.last_sent = version,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Slow consumer: leave last_sent stale so the next
                    // publish self-heals it with a snapshot.
                    debug!(channel = %self.channel, ?id, "subscriber queue full, frame skipped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dropped.push(*id),
            }
        }
        for id in dropped {
            inner.subscribers.remove(&id);
            debug!(channel = %self.channel, ?id, "subscriber transport closed");
        }

        PublishOutcome::Published
    }

    /// Deliver an error frame to every subscriber, e.g. when the underlying
    /// pane is gone.
    pub async fn broadcast_error(&self, reason: &str) {
        let mut inner = self.inner.lock().await;
        let frame = Frame::Error {
            channel: self.channel,
            reason: reason.to_string(),
        };
        let mut dropped = Vec::new();
        for (id, entry) in &inner.subscribers {
            if let Err(mpsc::error::TrySendError::Closed(_)) = entry.tx.try_send(frame.clone()) {
                dropped.push(*id);
            }
        }
        for id in dropped {
            inner.subscribers.remove(&id);
        }
    }

    /// Drop all accumulated pane state. Every pane republishes a full
    /// snapshot on its next tick; the version counter keeps advancing.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.panes.clear();
        info!(channel = %self.channel, "channel state cleared");
    }

    pub async fn version(&self) -> u64 {
        self.inner.lock().await.version
    }

    pub async fn subscriber_count(&self) -> usize {
        self.inner.lock().await.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unchanged_capture_does_not_advance_version() {
        let hub = BroadcastHub::new(ChannelKind::Console);
        let pane = PaneId::new("commander");

        assert_eq!(
            hub.publish_capture(&pane, "ready".to_string()).await,
            PublishOutcome::Published
        );
        assert_eq!(
            hub.publish_capture(&pane, "ready".to_string()).await,
            PublishOutcome::Unchanged
        );
        assert_eq!(hub.version().await, 1);
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let hub = BroadcastHub::new(ChannelKind::Console);
        let (tx, _rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = hub.join(tx).await;

        hub.leave(id).await;
        hub.leave(id).await;
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn closed_subscriber_is_dropped_on_publish() {
        let hub = BroadcastHub::new(ChannelKind::Console);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let _id = hub.join(tx).await;
        drop(rx);

        hub.publish_capture(&PaneId::new("commander"), "output".to_string())
            .await;
        assert_eq!(hub.subscriber_count().await, 0);
    }
}
