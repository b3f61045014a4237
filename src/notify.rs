use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

const CHANNEL_CAPACITY: usize = 256;

/// Outbound notification collaborator, invoked once per successful booking
/// create/update/cancel. Fire-and-forget: implementations must swallow
/// delivery failures — a lost notification never affects the booking that
/// triggered it.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, owner_id: Ulid, message: String);
}

/// In-process broadcast hub with one channel per booking owner.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<String>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to an owner's notifications. Creates the channel if needed.
    pub fn subscribe(&self, owner_id: Ulid) -> broadcast::Receiver<String> {
        let sender = self
            .channels
            .entry(owner_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Deliver a message. No-op if nobody is listening.
    pub fn send(&self, owner_id: Ulid, message: String) {
        if let Some(sender) = self.channels.get(&owner_id) {
            if sender.send(message).is_err() {
                tracing::debug!("notification for {owner_id} dropped: no receivers");
            }
        } else {
            tracing::debug!("notification for {owner_id} dropped: no channel");
        }
    }

    /// Remove an owner's channel (e.g. when the account goes away).
    pub fn remove(&self, owner_id: &Ulid) {
        self.channels.remove(owner_id);
    }
}

#[async_trait]
impl NotificationSink for NotifyHub {
    async fn notify(&self, owner_id: Ulid, message: String) {
        self.send(owner_id, message);
    }
}
