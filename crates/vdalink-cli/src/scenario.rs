//! Recorded scenarios: a plant model plus a timeline of commands and vehicle
//! messages, replayed through a real executor.
//!
//! ```json
//! {
//!   "plant": { "points": [ { "name": "A", "position": { "x": 0.0, "y": 0.0 } } ] },
//!   "timeline": [
//!     { "message": { "topic": "connection", "message": { "headerId": 1, "timestamp": "2024-01-01T00:00:00Z", "connectionState": "ONLINE" } } },
//!     { "command": { "...": "MovementCommand" } },
//!     "clear_queues"
//!   ]
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use vdalink_middleware::{
    ChannelSink, CommandReport, CommandReporter, OutboundMessage, VehicleEvent, VehicleEventBus,
    VehicleStatus,
};
use vdalink_runtime::{VehicleController, VehicleExecutor};
use vdalink_types::{InMemoryPlantModel, InboundMessage, InstantActions, MovementCommand, VdaError};

use crate::config::Config;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEntry {
    Command(Box<MovementCommand>),
    Message(InboundMessage),
    InstantActions(InstantActions),
    ClearQueues,
    BrokerOffline,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub plant: InMemoryPlantModel,
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
}

impl Scenario {
    pub fn from_json(raw: &str) -> Result<Self, VdaError> {
        serde_json::from_str(raw).map_err(|e| VdaError::Serialization(e.to_string()))
    }
}

/// Everything observed while replaying a scenario.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub outbound: Vec<OutboundMessage>,
    pub reports: Vec<CommandReport>,
    /// Telemetry; a long scenario may skip events beyond the bus capacity.
    pub events: Vec<VehicleEvent>,
    pub position: Option<String>,
    pub status: VehicleStatus,
    pub pending_requests: usize,
    pub tracked_orders: usize,
}

impl ReplayReport {
    pub fn completed_commands(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r, CommandReport::Completed { .. }))
            .count()
    }
}

/// Feed every timeline entry through a fresh executor and collect the result.
pub async fn replay(scenario: Scenario, config: &Config) -> Result<ReplayReport, VdaError> {
    let (sink, mut outbound_rx) = ChannelSink::new();
    let (reporter, mut reports_rx) = CommandReporter::new();
    let bus = VehicleEventBus::new(config.event_capacity.max(1));
    let mut events_rx = bus.subscribe();
    let controller = VehicleController::new(
        config.controller_config(),
        config.vehicle_profile(),
        Arc::new(scenario.plant),
        Arc::new(sink),
        reporter,
        bus,
    );

    let (task, handle) = VehicleExecutor::spawn(controller, 64);
    info!(entries = scenario.timeline.len(), "replaying scenario");
    for entry in scenario.timeline {
        match entry {
            TimelineEntry::Command(command) => handle.enqueue_command(*command).await?,
            TimelineEntry::Message(message) => handle.deliver(message).await?,
            TimelineEntry::InstantActions(actions) => handle.send_instant_actions(actions).await?,
            TimelineEntry::ClearQueues => handle.clear_queues().await?,
            TimelineEntry::BrokerOffline => handle.broker_offline().await?,
        }
    }
    handle.shutdown().await?;
    let controller = task
        .await
        .map_err(|e| VdaError::Channel(format!("vehicle executor task failed: {e}")))?;

    let mut report = ReplayReport {
        position: controller.position().map(str::to_string),
        status: controller.status(),
        pending_requests: controller.pending_requests(),
        tracked_orders: controller.tracked_orders(),
        ..ReplayReport::default()
    };
    while let Ok(message) = outbound_rx.try_recv() {
        report.outbound.push(message);
    }
    while let Ok(entry) = reports_rx.try_recv() {
        report.reports.push(entry);
    }
    while let Some(event) = events_rx.try_recv() {
        report.events.push(event);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
      "plant": {
        "points": [
          { "name": "A", "position": { "x": 0.0, "y": 0.0 } },
          { "name": "B", "position": { "x": 1000.0, "y": 0.0 } }
        ]
      },
      "timeline": [
        { "command": {
            "transport_order": "TO-9",
            "drive_order_index": 0,
            "route": [ {
              "path": { "name": "A--B", "source_point": "A", "destination_point": "B" },
              "source_point": { "name": "A", "position": { "x": 0.0, "y": 0.0 } },
              "destination_point": { "name": "B", "position": { "x": 1000.0, "y": 0.0 } },
              "vehicle_orientation": "FORWARD",
              "route_index": 0
            } ],
            "step": {
              "path": { "name": "A--B", "source_point": "A", "destination_point": "B" },
              "source_point": { "name": "A", "position": { "x": 0.0, "y": 0.0 } },
              "destination_point": { "name": "B", "position": { "x": 1000.0, "y": 0.0 } },
              "vehicle_orientation": "FORWARD",
              "route_index": 0
            },
            "final_destination": { "name": "B", "position": { "x": 1000.0, "y": 0.0 } },
            "final_movement": true,
            "no_operation": true
        } },
        { "message": { "topic": "connection", "message": {
            "headerId": 1, "timestamp": "2024-05-01T10:00:00Z", "connectionState": "ONLINE" } } },
        { "message": { "topic": "state", "message": {
            "headerId": 1, "timestamp": "2024-05-01T10:00:01Z",
            "operatingMode": "AUTOMATIC", "lastNodeId": "A" } } },
        { "message": { "topic": "state", "message": {
            "headerId": 2, "timestamp": "2024-05-01T10:00:02Z",
            "operatingMode": "AUTOMATIC", "orderId": "TO-9_0", "orderUpdateId": 0,
            "lastNodeId": "B", "batteryState": { "batteryCharge": 64.0 } } } }
      ]
    }"#;

    #[tokio::test]
    async fn replays_a_single_movement() -> Result<(), Box<dyn std::error::Error>> {
        let scenario = Scenario::from_json(SCENARIO)?;
        let report = replay(scenario, &Config::default()).await?;

        let orders: Vec<_> = report
            .outbound
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Order(order) => Some(order.order_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(orders, vec!["TO-9_0"]);
        assert_eq!(report.completed_commands(), 1);
        assert_eq!(report.position.as_deref(), Some("B"));
        assert_eq!(report.status, VehicleStatus::Idle);
        assert_eq!(report.pending_requests, 0);
        assert_eq!(report.tracked_orders, 0);
        Ok(())
    }

    #[test]
    fn malformed_scenario_is_a_serialization_error() {
        let err = Scenario::from_json("{ \"timeline\": 3 }").unwrap_err();
        assert!(matches!(err, VdaError::Serialization(_)));
    }

    #[test]
    fn unit_entries_parse_from_plain_strings() {
        let scenario = Scenario::from_json(r#"{ "timeline": ["clear_queues", "broker_offline"] }"#)
            .unwrap();
        assert!(matches!(scenario.timeline[0], TimelineEntry::ClearQueues));
        assert!(matches!(scenario.timeline[1], TimelineEntry::BrokerOffline));
    }
}
