//! The outbound side of the protocol core.
//!
//! The core never talks to a broker.  The request matcher hands finished
//! messages to a [`MessageSink`]; the transport behind it owns topic naming,
//! header framing, JSON encoding and schema validation.
//!
//! - [`MessageSink`] – the trait every transport must implement.
//! - [`ChannelSink`] – forwards [`OutboundMessage`]s into a Tokio channel so a
//!   separate task (or a test) can drain them.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use vdalink_types::{InstantActions, Order, VdaError};

/// Synchronous outbound calls made from the vehicle's executor.
///
/// Implementations must not block; hand the message to an I/O task instead.
pub trait MessageSink: Send + Sync {
    fn send_order(&self, order: &Order) -> Result<(), VdaError>;

    fn send_instant_actions(&self, actions: &InstantActions) -> Result<(), VdaError>;
}

/// A message leaving the core, tagged by topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "message", rename_all = "camelCase")]
pub enum OutboundMessage {
    Order(Order),
    InstantActions(InstantActions),
}

/// [`MessageSink`] backed by an unbounded Tokio channel.
///
/// # Example
///
/// ```
/// use vdalink_middleware::adapter::{ChannelSink, MessageSink, OutboundMessage};
/// use vdalink_types::{BlockingType, InstantActions};
///
/// let (sink, mut rx) = ChannelSink::new();
/// sink.send_instant_actions(&InstantActions::single("stateRequest", BlockingType::None))
///     .unwrap();
/// assert!(matches!(rx.try_recv(), Ok(OutboundMessage::InstantActions(_))));
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, message: OutboundMessage) -> Result<(), VdaError> {
        self.tx
            .send(message)
            .map_err(|e| VdaError::Channel(format!("outbound channel closed: {e}")))
    }
}

impl MessageSink for ChannelSink {
    fn send_order(&self, order: &Order) -> Result<(), VdaError> {
        self.forward(OutboundMessage::Order(order.clone()))
    }

    fn send_instant_actions(&self, actions: &InstantActions) -> Result<(), VdaError> {
        self.forward(OutboundMessage::InstantActions(actions.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str) -> Order {
        Order {
            order_id: id.to_string(),
            order_update_id: 0,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    #[test]
    fn forwards_in_send_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.send_order(&order("o1")).unwrap();
        sink.send_order(&order("o2")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::Order(order("o1")));
        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::Order(order("o2")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_a_channel_error() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        let err = sink.send_order(&order("o1")).unwrap_err();
        assert!(matches!(err, VdaError::Channel(_)));
    }

    #[test]
    fn outbound_messages_are_tagged_by_topic() {
        let json = serde_json::to_value(OutboundMessage::Order(order("o1"))).unwrap();
        assert_eq!(json["topic"], "order");
        assert_eq!(json["message"]["orderId"], "o1");
    }
}
