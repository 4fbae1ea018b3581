//! `vdalink-types` – shared vocabulary of the vdalink stack.
//!
//! # Modules
//!
//! - [`protocol`] – the VDA5050 wire model: [`Order`][protocol::Order],
//!   [`InstantActions`][protocol::InstantActions], and the inbound
//!   [`State`][protocol::State] / [`Connection`][protocol::Connection] /
//!   [`Visualization`][protocol::Visualization] reports wrapped in the closed
//!   [`InboundMessage`][protocol::InboundMessage] sum type.
//! - [`plant`] – read-only plant-model values (points, paths, locations) and
//!   the [`PlantModel`][plant::PlantModel] query trait.
//! - [`command`] – [`MovementCommand`][command::MovementCommand], the unit of
//!   work handed down by the transport-order execution engine.

pub mod command;
pub mod plant;
pub mod protocol;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use command::MovementCommand;
pub use plant::{
    InMemoryPlantModel, Location, LocationType, Path, PlantModel, PlantPosition, Point,
    Properties, Step, VehicleOrientation, VehicleProfile,
};
pub use protocol::{
    Action, ActionParameter, ActionState, ActionStatus, AgvPosition, BatteryState, BlockingType,
    Connection, ConnectionState, Edge, EdgeState, ErrorLevel, Header, InboundMessage,
    InstantActions, MessageTopic, Node, NodePosition, NodeState, OperatingMode, Order, State,
    Velocity, VehicleError, Visualization,
};

/// Global error type spanning transport failures, serialization problems and
/// executor plumbing.
///
/// Nothing in the protocol core is fatal: these errors are surfaced to the
/// caller, logged, and processing continues with the next message.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum VdaError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Vehicle executor has shut down")]
    ExecutorClosed,
}
