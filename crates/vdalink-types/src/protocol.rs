//! VDA5050 wire model.
//!
//! Every type serializes in the camelCase layout mandated by VDA5050 2.x and
//! derives [`JsonSchema`] so a transport can publish or validate schemas.
//! Header fields are flattened into the message body, the way the protocol
//! lays them out on the wire.
//!
//! Outbound messages ([`Order`], [`InstantActions`]) carry no header: header
//! ids and timestamps are assigned by the transport when it frames the
//! message.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Header
// ────────────────────────────────────────────────────────────────────────────

/// Common header carried by every inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Per-topic monotonic counter maintained by the vehicle.
    pub header_id: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub serial_number: String,
}

impl Header {
    /// Header with the given id and timestamp and empty identity fields.
    pub fn new(header_id: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            header_id,
            timestamp,
            version: String::new(),
            manufacturer: String::new(),
            serial_number: String::new(),
        }
    }
}

/// Raised when a textual enum value does not name any variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseVariantError {
    pub kind: &'static str,
    pub value: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Actions
// ────────────────────────────────────────────────────────────────────────────

/// Whether an action must complete before (HARD), may overlap with (SOFT), or
/// is independent of (NONE) surrounding movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockingType {
    #[default]
    None,
    Soft,
    Hard,
}

impl FromStr for BlockingType {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(BlockingType::None),
            "SOFT" => Ok(BlockingType::Soft),
            "HARD" => Ok(BlockingType::Hard),
            _ => Err(ParseVariantError {
                kind: "blocking type",
                value: s.to_string(),
            }),
        }
    }
}

/// A single `(key, value)` action parameter.  The value keeps its JSON type
/// (number, boolean, string, or null).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActionParameter {
    pub key: String,
    pub value: serde_json::Value,
}

impl ActionParameter {
    pub fn new(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An action attached to a node, an edge, or sent as an instant action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub action_type: String,
    /// Unique within one order or instant-action batch.
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_description: Option<String>,
    pub blocking_type: BlockingType,
    #[serde(default)]
    pub action_parameters: Vec<ActionParameter>,
}

impl Action {
    pub fn new(
        action_type: impl Into<String>,
        action_id: impl Into<String>,
        blocking_type: BlockingType,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            action_id: action_id.into(),
            action_description: None,
            blocking_type,
            action_parameters: Vec::new(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Order
// ────────────────────────────────────────────────────────────────────────────

/// Position of a node in the vehicle's map, in meters and radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theta: Option<f64>,
    #[serde(
        rename = "allowedDeviationXY",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_deviation_xy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_deviation_theta: Option<f64>,
    pub map_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub node_id: String,
    /// Even for nodes.
    pub sequence_id: u32,
    /// `true` for the base, `false` for the horizon.
    pub released: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_position: Option<NodePosition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub edge_id: String,
    /// Odd for edges.
    pub sequence_id: u32,
    pub released: bool,
    pub start_node_id: String,
    pub end_node_id: String,
    /// Meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,
    /// Radians.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_allowed: Option<bool>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// An order message: alternating nodes and edges, base first, horizon after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub order_update_id: u64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Order {
    /// The released (base) nodes, in order.
    pub fn base_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.released)
    }

    /// The released (base) edges, in order.
    pub fn base_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.released)
    }

    /// The last node of the base, i.e. the node the vehicle will stop at.
    pub fn last_base_node(&self) -> Option<&Node> {
        self.base_nodes().last()
    }

    /// Every action attached to a released node or edge.
    pub fn base_actions(&self) -> impl Iterator<Item = &Action> {
        self.base_nodes()
            .flat_map(|n| n.actions.iter())
            .chain(self.base_edges().flat_map(|e| e.actions.iter()))
    }
}

/// A batch of out-of-band actions independent of the current order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstantActions {
    pub instant_actions: Vec<Action>,
}

impl InstantActions {
    pub fn new(instant_actions: Vec<Action>) -> Self {
        Self { instant_actions }
    }

    /// A batch holding a single parameterless action with a fresh UUID id,
    /// e.g. `cancelOrder`, `startPause` or `stateRequest`.
    pub fn single(action_type: impl Into<String>, blocking_type: BlockingType) -> Self {
        Self::new(vec![Action::new(
            action_type,
            Uuid::new_v4().to_string(),
            blocking_type,
        )])
    }

    pub fn action_ids(&self) -> impl Iterator<Item = &str> {
        self.instant_actions.iter().map(|a| a.action_id.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// State
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub node_id: String,
    pub sequence_id: u32,
    #[serde(default)]
    pub released: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EdgeState {
    pub edge_id: String,
    pub sequence_id: u32,
    #[serde(default)]
    pub released: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Initializing,
    Running,
    Waiting,
    Paused,
    Finished,
    Failed,
}

impl ActionStatus {
    /// `true` for FINISHED and FAILED.
    pub fn is_terminal(self) -> bool {
        matches!(self, ActionStatus::Finished | ActionStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionState {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    pub action_status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingMode {
    Automatic,
    Semiautomatic,
    #[default]
    Manual,
    Service,
    Teachin,
}

impl OperatingMode {
    /// Only AUTOMATIC and SEMIAUTOMATIC vehicles accept orders from master
    /// control.
    pub fn accepts_orders(self) -> bool {
        matches!(self, OperatingMode::Automatic | OperatingMode::Semiautomatic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorLevel {
    Warning,
    Fatal,
}

/// An entry of the state report's `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VehicleError {
    pub error_type: String,
    pub error_level: ErrorLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatteryState {
    /// Percent, 0–100.
    pub battery_charge: f64,
    #[serde(default)]
    pub charging: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f64>,
}

/// Continuous vehicle position in meters / radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgvPosition {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub map_id: String,
    #[serde(default = "default_true")]
    pub position_initialized: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Velocity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omega: Option<f64>,
}

/// The vehicle's periodic state report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub order_update_id: u64,
    #[serde(default)]
    pub last_node_id: String,
    #[serde(default)]
    pub last_node_sequence_id: u32,
    #[serde(default)]
    pub node_states: Vec<NodeState>,
    #[serde(default)]
    pub edge_states: Vec<EdgeState>,
    #[serde(default)]
    pub action_states: Vec<ActionState>,
    #[serde(default)]
    pub operating_mode: OperatingMode,
    #[serde(default)]
    pub errors: Vec<VehicleError>,
    #[serde(default)]
    pub battery_state: BatteryState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agv_position: Option<AgvPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Velocity>,
    #[serde(default)]
    pub driving: bool,
    #[serde(default)]
    pub paused: bool,
}

impl State {
    /// An empty report with the given header: no order, manual mode.
    pub fn new(header: Header) -> Self {
        Self {
            header,
            order_id: String::new(),
            order_update_id: 0,
            last_node_id: String::new(),
            last_node_sequence_id: 0,
            node_states: Vec::new(),
            edge_states: Vec::new(),
            action_states: Vec::new(),
            operating_mode: OperatingMode::default(),
            errors: Vec::new(),
            battery_state: BatteryState::default(),
            agv_position: None,
            velocity: None,
            driving: false,
            paused: false,
        }
    }

    pub fn action_state(&self, action_id: &str) -> Option<&ActionState> {
        self.action_states.iter().find(|s| s.action_id == action_id)
    }

    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| e.error_level == ErrorLevel::Fatal)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connection & visualization
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Online,
    Offline,
    #[serde(rename = "CONNECTIONBROKEN")]
    ConnectionBroken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(flatten)]
    pub header: Header,
    pub connection_state: ConnectionState,
}

/// High-frequency position report published next to the state topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    #[serde(flatten)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agv_position: Option<AgvPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Velocity>,
}

// ────────────────────────────────────────────────────────────────────────────
// Inbound envelope
// ────────────────────────────────────────────────────────────────────────────

/// The inbound topics the vehicle publishes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageTopic {
    Connection,
    State,
    Visualization,
}

impl fmt::Display for MessageTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageTopic::Connection => write!(f, "connection"),
            MessageTopic::State => write!(f, "state"),
            MessageTopic::Visualization => write!(f, "visualization"),
        }
    }
}

/// A parsed, schema-validated message received from the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "message", rename_all = "lowercase")]
pub enum InboundMessage {
    Connection(Connection),
    State(State),
    Visualization(Visualization),
}

impl InboundMessage {
    pub fn header(&self) -> &Header {
        match self {
            InboundMessage::Connection(m) => &m.header,
            InboundMessage::State(m) => &m.header,
            InboundMessage::Visualization(m) => &m.header,
        }
    }

    pub fn topic(&self) -> MessageTopic {
        match self {
            InboundMessage::Connection(_) => MessageTopic::Connection,
            InboundMessage::State(_) => MessageTopic::State,
            InboundMessage::Visualization(_) => MessageTopic::Visualization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn blocking_type_parses_case_insensitively() {
        assert_eq!("hard".parse::<BlockingType>().unwrap(), BlockingType::Hard);
        assert_eq!(" SOFT ".parse::<BlockingType>().unwrap(), BlockingType::Soft);
        let err = "sometimes".parse::<BlockingType>().unwrap_err();
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn node_position_uses_protocol_field_names() {
        let pos = NodePosition {
            x: 1.0,
            y: 2.0,
            theta: None,
            allowed_deviation_xy: Some(0.5),
            allowed_deviation_theta: Some(0.1),
            map_id: "floor1".to_string(),
        };
        let json = serde_json::to_value(&pos).unwrap();
        assert_eq!(json["allowedDeviationXY"], 0.5);
        assert_eq!(json["allowedDeviationTheta"], 0.1);
        assert_eq!(json["mapId"], "floor1");
        assert!(json.get("theta").is_none());
    }

    #[test]
    fn state_parses_minimal_vehicle_report() {
        let raw = r#"{
            "headerId": 12,
            "timestamp": "2024-05-01T10:00:00Z",
            "orderId": "TOrder-1_0",
            "orderUpdateId": 3,
            "lastNodeId": "P3",
            "nodeStates": [{"nodeId": "P4", "sequenceId": 2, "released": true}],
            "edgeStates": [],
            "actionStates": [{"actionId": "P4_action_0", "actionStatus": "RUNNING"}],
            "operatingMode": "AUTOMATIC",
            "errors": [{"errorType": "orderError", "errorLevel": "WARNING"}],
            "batteryState": {"batteryCharge": 87.5, "charging": false},
            "driving": true
        }"#;
        let state: State = serde_json::from_str(raw).unwrap();
        assert_eq!(state.header.header_id, 12);
        assert_eq!(state.order_update_id, 3);
        assert_eq!(state.node_states[0].node_id, "P4");
        assert_eq!(state.action_states[0].action_status, ActionStatus::Running);
        assert!(state.operating_mode.accepts_orders());
        assert_eq!(state.errors[0].error_type, "orderError");
        assert!(!state.has_fatal_error());
        assert!(state.agv_position.is_none());
    }

    #[test]
    fn connection_broken_uses_single_word_tag() {
        let raw = r#"{"headerId": 1, "timestamp": "2024-05-01T10:00:00Z",
                      "connectionState": "CONNECTIONBROKEN"}"#;
        let conn: Connection = serde_json::from_str(raw).unwrap();
        assert_eq!(conn.connection_state, ConnectionState::ConnectionBroken);
    }

    #[test]
    fn order_base_views_skip_horizon() {
        let node = |id: &str, seq, released| Node {
            node_id: id.to_string(),
            sequence_id: seq,
            released,
            node_position: None,
            actions: vec![Action::new("beep", format!("{id}_action_0"), BlockingType::None)],
        };
        let order = Order {
            order_id: "o1".to_string(),
            order_update_id: 0,
            nodes: vec![node("A", 0, true), node("B", 2, true), node("C", 4, false)],
            edges: vec![],
        };
        assert_eq!(order.last_base_node().unwrap().node_id, "B");
        let ids: Vec<_> = order.base_actions().map(|a| a.action_id.as_str()).collect();
        assert_eq!(ids, vec!["A_action_0", "B_action_0"]);
    }

    #[test]
    fn instant_actions_single_generates_unique_ids() {
        let a = InstantActions::single("cancelOrder", BlockingType::Hard);
        let b = InstantActions::single("cancelOrder", BlockingType::Hard);
        assert_ne!(a.instant_actions[0].action_id, b.instant_actions[0].action_id);
        assert_eq!(a.action_ids().count(), 1);
    }

    #[test]
    fn inbound_message_reports_topic_and_header() {
        let msg = InboundMessage::Connection(Connection {
            header: Header::new(4, ts(100)),
            connection_state: ConnectionState::Online,
        });
        assert_eq!(msg.topic(), MessageTopic::Connection);
        assert_eq!(msg.header().header_id, 4);
        assert_eq!(msg.topic().to_string(), "connection");
    }
}
