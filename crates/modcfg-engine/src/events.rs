//! Change notifications.
//!
//! The service publishes on a `tokio::sync::broadcast` channel. Sends
//! never block the saving thread, and subscribers see events in the order
//! the saves that produced them completed.

use modcfg_core::ConfigurationId;
use tokio::sync::broadcast;

/// Buffered events per subscriber before the slowest one starts lagging.
pub const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationEvent {
    /// A configuration was written.
    Saved { id: ConfigurationId, name: String },
    /// The pending-restart set became non-empty (`true`) or empty again.
    RestartRequiredChanged { required: bool },
}

/// Publisher side of the event stream.
#[derive(Debug, Clone)]
pub(crate) struct EventBus {
    sender: broadcast::Sender<ConfigurationEvent>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub(crate) fn publish(&self, event: ConfigurationEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ConfigurationEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(ConfigurationEvent::RestartRequiredChanged { required: true });
        let mut receiver = bus.subscribe();
        assert!(receiver.try_recv().is_err());
        bus.publish(ConfigurationEvent::RestartRequiredChanged { required: false });
        assert_eq!(
            receiver.try_recv().unwrap(),
            ConfigurationEvent::RestartRequiredChanged { required: false }
        );
    }
}
