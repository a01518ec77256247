//! Outbound transport interface.
//!
//! Delivery itself (broadcasts, IPC, sockets) belongs to the host. This
//! crate only builds messages and hands them to a [`MessageTransport`].

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::OutboundMessage;
use crate::types::Result;

/// Trait for handing outbound messages to the host for delivery.
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver a message to the coordinator. Delivery is at-most-once.
    async fn send(&self, message: OutboundMessage) -> Result<()>;
}

#[async_trait::async_trait]
impl<T: MessageTransport + ?Sized> MessageTransport for Arc<T> {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        (**self).send(message).await
    }
}

/// In-memory transport that records every message it is given.
///
/// Useful for tests and for hosts that poll for outgoing messages.
#[derive(Default, Clone)]
pub struct InMemoryTransport {
    sent: Arc<RwLock<Vec<OutboundMessage>>>,
}

impl InMemoryTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages sent so far, oldest first.
    pub async fn sent(&self) -> Vec<OutboundMessage> {
        let sent = self.sent.read().await;
        sent.clone()
    }

    /// Remove and return all recorded messages.
    pub async fn drain(&self) -> Vec<OutboundMessage> {
        let mut sent = self.sent.write().await;
        std::mem::take(&mut *sent)
    }

    /// Number of messages sent so far.
    pub async fn len(&self) -> usize {
        let sent = self.sent.read().await;
        sent.len()
    }

    /// Returns true if nothing has been sent.
    pub async fn is_empty(&self) -> bool {
        let sent = self.sent.read().await;
        sent.is_empty()
    }
}

#[async_trait::async_trait]
impl MessageTransport for InMemoryTransport {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let mut sent = self.sent.write().await;
        sent.push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Extras, OutboundAction};

    fn launch() -> OutboundMessage {
        OutboundMessage::new(OutboundAction::Launch, "com.box.android", "partner", Extras::new())
    }

    #[tokio::test]
    async fn test_records_and_drains() {
        let transport = InMemoryTransport::new();
        assert!(transport.is_empty().await);

        transport.send(launch()).await.unwrap();
        transport.send(launch()).await.unwrap();
        assert_eq!(transport.len().await, 2);

        let drained = transport.drain().await;
        assert_eq!(drained.len(), 2);
        assert!(transport.is_empty().await);
    }

    #[tokio::test]
    async fn test_shared_through_arc() {
        let transport = Arc::new(InMemoryTransport::new());
        let shared: Arc<InMemoryTransport> = Arc::clone(&transport);

        shared.send(launch()).await.unwrap();
        assert_eq!(transport.sent().await, vec![launch()]);
    }
}
