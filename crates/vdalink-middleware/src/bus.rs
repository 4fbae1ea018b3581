//! Vehicle event bus.
//!
//! Uses [`tokio::sync::broadcast`] so every subscriber (fleet manager glue,
//! panels, loggers) receives every event without one slow subscriber
//! blocking the vehicle's executor.  Slow subscribers skip events, so only
//! telemetry travels here; command completion and rejection go through
//! [`CommandReporter`][crate::reports::CommandReporter].
//!
//! | Event | Raised when |
//! |---|---|
//! | [`VehicleEvent::PositionChanged`] | the resolved point name changes |
//! | [`VehicleEvent::PrecisePositionChanged`] | a new continuous position arrives |
//! | [`VehicleEvent::EnergyLevelChanged`] | the battery charge changes |
//! | [`VehicleEvent::StatusChanged`] | the derived [`VehicleStatus`] changes |
//! | [`VehicleEvent::ConnectionChanged`] | the vehicle reports a new connection state |

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;
use vdalink_types::{ConnectionState, PlantPosition, VdaError};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// Coarse vehicle status derived from state reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    #[default]
    Unknown,
    Unavailable,
    Error,
    Idle,
    Executing,
    Charging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum VehicleEvent {
    PositionChanged {
        point: Option<String>,
    },
    /// Millimetres, plant coordinates.
    PrecisePositionChanged {
        position: Option<PlantPosition>,
        orientation_deg: Option<f64>,
    },
    EnergyLevelChanged {
        percent: f64,
    },
    StatusChanged {
        status: VehicleStatus,
    },
    ConnectionChanged {
        state: ConnectionState,
    },
}

/// Shared event bus. Clone it cheaply; all clones share one channel.
#[derive(Clone, Debug)]
pub struct VehicleEventBus {
    sender: broadcast::Sender<VehicleEvent>,
}

impl VehicleEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event` to every current subscriber.
    ///
    /// Returns the number of receivers handed the event, or
    /// [`VdaError::Channel`] when nobody is subscribed.
    pub fn publish(&self, event: VehicleEvent) -> Result<usize, VdaError> {
        self.sender
            .send(event)
            .map_err(|e| VdaError::Channel(format!("vehicle event bus send error: {e}")))
    }

    pub fn subscribe(&self) -> VehicleEventReceiver {
        VehicleEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for VehicleEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving half of the bus.  Lagged events are skipped with a warning.
pub struct VehicleEventReceiver {
    receiver: broadcast::Receiver<VehicleEvent>,
}

impl VehicleEventReceiver {
    /// Wait for the next event.
    ///
    /// Returns `None` when the bus is closed and no further events will arrive.
    pub async fn recv(&mut self) -> Option<VehicleEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "vehicle event receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Option<VehicleEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "vehicle event receiver lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() -> Result<(), Box<dyn std::error::Error>> {
        let bus = VehicleEventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(VehicleEvent::EnergyLevelChanged { percent: 80.0 })?;
        let received = rx.recv().await.ok_or("no event received")?;
        assert_eq!(received, VehicleEvent::EnergyLevelChanged { percent: 80.0 });
        Ok(())
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = VehicleEventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = VehicleEvent::StatusChanged {
            status: VehicleStatus::Idle,
        };
        bus.publish(event.clone())?;
        assert_eq!(rx1.recv().await, Some(event.clone()));
        assert_eq!(rx2.recv().await, Some(event));
        Ok(())
    }

    #[test]
    fn publish_without_subscribers_is_an_error() {
        let bus = VehicleEventBus::default();
        let result = bus.publish(VehicleEvent::PositionChanged { point: None });
        assert!(matches!(result, Err(VdaError::Channel(_))));
    }

    #[tokio::test]
    async fn slow_subscriber_skips_lagged_events() {
        let bus = VehicleEventBus::new(4);
        let mut slow = bus.subscribe();
        for i in 0..100 {
            let _ = bus.publish(VehicleEvent::EnergyLevelChanged { percent: i as f64 });
        }
        // The oldest retained event comes through after the lag warning.
        assert_eq!(
            slow.recv().await,
            Some(VehicleEvent::EnergyLevelChanged { percent: 96.0 })
        );
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let json = serde_json::to_value(VehicleEvent::ConnectionChanged {
            state: ConnectionState::ConnectionBroken,
        })
        .unwrap();
        assert_eq!(json["event"], "connectionChanged");
        assert_eq!(json["state"], "CONNECTIONBROKEN");
    }
}
