//! Delivery of fulfilled notification requests.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::notifier::supervisor::NotificationRequest;

#[derive(Error, Debug)]
#[error("Notification delivery failed: {0}")]
pub struct SinkError(pub String);

/// Receives the single message produced for a request. Implemented by the
/// storage or chat layer that owns the request.
#[async_trait]
pub trait NotificationSink {
    async fn deliver(&self, request: &NotificationRequest, message: String) -> Result<(), SinkError>;
}

/// A message ready to be sent to the requesting user.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub request: NotificationRequest,
    pub message: String,
}

/// Forwards deliveries into an unbounded channel.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Delivery>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn deliver(&self, request: &NotificationRequest, message: String) -> Result<(), SinkError> {
        self.sender
            .send(Delivery {
                request: request.clone(),
                message,
            })
            .map_err(|_| SinkError("receiver dropped".to_string()))
    }
}
