//! [`OrderMapper`] – one VDA5050 order per movement command.
//!
//! # Layout of a mapped order
//!
//! ```text
//!  base (released)                      horizon (unreleased)
//!  source ──edge── destination ──edge── node ──edge── node …
//!   seq 0   seq 1    seq 2       seq 3  seq 4  seq 5  seq 6
//! ```
//!
//! The first command of a drive order starts a new logical order whose id is
//! `<transportOrder>_<driveOrderIndex>`; its source node is mapped fresh and
//! carries the `ORDER_START` actions.  Every following command of the same
//! drive order is an order *update*: the previous order's last base node is
//! reused as the stitching source node, so sequence ids keep increasing and
//! the vehicle does not have to re-verify its position.  `orderUpdateId` is
//! the route index of the command's step.
//!
//! The horizon previews up to [`MapperConfig::max_horizon_steps`] further
//! steps of the route.
//!
//! # Example
//!
//! ```
//! use vdalink_mapping::order_mapper::{MapperConfig, OrderMapper};
//! use vdalink_types::{
//!     InMemoryPlantModel, MovementCommand, Path, Point, Properties, Step, VehicleOrientation,
//!     VehicleProfile,
//! };
//!
//! let step = |i: usize, from: &str, to: &str| Step {
//!     path: Some(Path::new(format!("{from}--{to}"), from, to)),
//!     source_point: Some(Point::new(from, 0.0, 0.0)),
//!     destination_point: Point::new(to, 1000.0, 0.0),
//!     vehicle_orientation: VehicleOrientation::Forward,
//!     route_index: i,
//! };
//! let route = vec![step(0, "A", "B"), step(1, "B", "C")];
//! let command = MovementCommand {
//!     transport_order: "T1".into(),
//!     drive_order_index: 0,
//!     step: route[0].clone(),
//!     final_destination: route[1].destination_point.clone(),
//!     route,
//!     operation: String::new(),
//!     op_location: None,
//!     final_movement: true,
//!     no_operation: true,
//!     properties: Properties::new(),
//! };
//!
//! let mut mapper = OrderMapper::new(MapperConfig::default());
//! let order = mapper.to_order(&command, &VehicleProfile::default(), &InMemoryPlantModel::default());
//!
//! assert_eq!(order.order_id, "T1_0");
//! let seqs: Vec<_> = order.nodes.iter().map(|n| (n.node_id.as_str(), n.sequence_id, n.released)).collect();
//! assert_eq!(seqs, vec![("A", 0, true), ("B", 2, true), ("C", 4, false)]);
//! ```

use tracing::{debug, info};
use vdalink_types::{
    Action, MovementCommand, Node, Order, PlantModel, Point, Step, VehicleProfile,
};

use crate::action_filter::{ActionFilter, TriggerRule};
use crate::actions::{
    self, ActionIdCounter, ActionScope, ActionTrigger, PropertyAction, extract_actions,
};
use crate::node_edge::{DeviationMode, ElementMapper};

/// Tunables for [`OrderMapper`].
#[derive(Debug, Clone, PartialEq)]
pub struct MapperConfig {
    /// Map id for points without a `vda5050:mapId` property.
    pub default_map_id: String,
    /// Maximum number of route steps previewed in the horizon.
    pub max_horizon_steps: usize,
    /// Widen the first node's deviation to cover the vehicle's precise
    /// position.
    pub extended_deviation: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            default_map_id: "default".to_string(),
            max_horizon_steps: 2,
            extended_deviation: true,
        }
    }
}

/// Builds orders from movement commands, remembering the previously mapped
/// order for stitching.
pub struct OrderMapper {
    config: MapperConfig,
    previous: Option<Order>,
    action_ids: ActionIdCounter,
}

impl OrderMapper {
    pub fn new(config: MapperConfig) -> Self {
        Self {
            config,
            previous: None,
            action_ids: ActionIdCounter::default(),
        }
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// The most recently mapped order, if any.
    pub fn previous_order(&self) -> Option<&Order> {
        self.previous.as_ref()
    }

    /// Forget the previous order so the next command starts a fresh one.
    ///
    /// The action id counter keeps running, so ids stay unique across resets.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Map `command` to an order for `vehicle`.
    pub fn to_order(
        &mut self,
        command: &MovementCommand,
        vehicle: &VehicleProfile,
        plant: &dyn PlantModel,
    ) -> Order {
        let order_id = command.order_name();
        let stitch_node = self
            .previous
            .as_ref()
            .filter(|previous| previous.order_id == order_id)
            .and_then(Order::last_base_node)
            .cloned();
        if stitch_node.is_none() {
            info!(order_id = %order_id, "starting new order");
        }

        let order = if command.step.has_movement() {
            self.movement_order(order_id, command, vehicle, plant, stitch_node)
        } else {
            self.stationary_order(order_id, command, vehicle, plant, stitch_node)
        };
        debug!(
            order_id = %order.order_id,
            order_update_id = order.order_update_id,
            nodes = order.nodes.len(),
            edges = order.edges.len(),
            "mapped movement command"
        );
        self.previous = Some(order.clone());
        order
    }

    /// Single-node order for a command that does not move.
    fn stationary_order(
        &mut self,
        order_id: String,
        command: &MovementCommand,
        vehicle: &VehicleProfile,
        plant: &dyn PlantModel,
        stitch_node: Option<Node>,
    ) -> Order {
        let destination = &command.step.destination_point;
        // Updates of the same order never step backwards.
        let sequence_id = match stitch_node {
            Some(node) if node.node_id == destination.name => node.sequence_id,
            Some(node) => node.sequence_id + 2,
            None => 0,
        };

        let candidates = self.destination_candidates(command, vehicle, plant);
        let actions = node_filter(vehicle, destination_trigger(command)).apply(&candidates, ActionScope::Node);
        let mapper = ElementMapper::new(vehicle, &self.config.default_map_id);

        Order {
            order_id,
            order_update_id: command.step.route_index as u64,
            nodes: vec![mapper.to_base_node(destination, sequence_id, actions, DeviationMode::Standard)],
            edges: Vec::new(),
        }
    }

    fn movement_order(
        &mut self,
        order_id: String,
        command: &MovementCommand,
        vehicle: &VehicleProfile,
        plant: &dyn PlantModel,
        stitch_node: Option<Node>,
    ) -> Order {
        let step = &command.step;
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        // ── Source node ─────────────────────────────────────────────────────
        let source = match stitch_node {
            Some(mut node) => {
                // Already dispatched with the previous order.
                node.actions.clear();
                node
            }
            None => self.initial_node(step, vehicle),
        };
        let mut sequence_id = source.sequence_id;
        nodes.push(source);

        // ── Base edge + destination ─────────────────────────────────────────
        let map_id = self.config.default_map_id.clone();
        let mapper = ElementMapper::new(vehicle, &map_id);
        sequence_id += 1;
        let edge_actions = self.edge_actions(step, vehicle);
        if let Some(edge) = mapper.to_base_edge(step, sequence_id, edge_actions) {
            edges.push(edge);
        }

        sequence_id += 1;
        let candidates = self.destination_candidates(command, vehicle, plant);
        let actions = node_filter(vehicle, destination_trigger(command)).apply(&candidates, ActionScope::Node);
        nodes.push(mapper.to_base_node(
            &step.destination_point,
            sequence_id,
            actions,
            DeviationMode::Standard,
        ));

        // ── Horizon ─────────────────────────────────────────────────────────
        let horizon = command
            .remaining_steps()
            .iter()
            .take(self.config.max_horizon_steps);
        for horizon_step in horizon {
            let edge_actions = self.edge_actions(horizon_step, vehicle);
            let Some(edge) = mapper.to_horizon_edge(horizon_step, sequence_id + 1, edge_actions) else {
                break;
            };
            sequence_id += 2;
            edges.push(edge);

            let route_end = horizon_step.route_index + 1 >= command.route.len();
            let trigger = if route_end {
                ActionTrigger::OrderEnd
            } else {
                ActionTrigger::Passing
            };
            let point = &horizon_step.destination_point;
            let mut candidates = extract_actions(&point.properties, &point.name, &mut self.action_ids);
            if route_end {
                candidates.extend(self.final_destination_candidates(command, vehicle, plant));
                candidates.extend(self.command_candidates(command));
            }
            let actions = node_filter(vehicle, trigger).apply(&candidates, ActionScope::Node);
            nodes.push(mapper.to_horizon_node(point, sequence_id, actions));
        }

        Order {
            order_id,
            order_update_id: step.route_index as u64,
            nodes,
            edges,
        }
    }

    /// Fresh first node of a new order, carrying the `ORDER_START` actions.
    fn initial_node(&mut self, step: &Step, vehicle: &VehicleProfile) -> Node {
        let mapper = ElementMapper::new(vehicle, &self.config.default_map_id);
        // has_movement() guarantees a source point.
        let point: &Point = step.source_point.as_ref().unwrap_or(&step.destination_point);
        let candidates = extract_actions(&point.properties, &point.name, &mut self.action_ids);
        let actions = node_filter(vehicle, ActionTrigger::OrderStart).apply(&candidates, ActionScope::Node);
        let mode = match vehicle.precise_position {
            Some(precise) if self.config.extended_deviation => DeviationMode::Extended(precise),
            _ => DeviationMode::Standard,
        };
        mapper.to_base_node(point, 0, actions, mode)
    }

    fn edge_actions(&mut self, step: &Step, vehicle: &VehicleProfile) -> Vec<Action> {
        let Some(path) = step.path.as_ref() else {
            return Vec::new();
        };
        let candidates = extract_actions(&path.properties, &path.name, &mut self.action_ids);
        ActionFilter::for_vehicle(vehicle)
            .with_rule(TriggerRule::single(ActionTrigger::Passing))
            .apply(&candidates, ActionScope::Edge)
    }

    /// Destination point actions, plus the final-destination and
    /// command-level actions.
    fn destination_candidates(
        &mut self,
        command: &MovementCommand,
        vehicle: &VehicleProfile,
        plant: &dyn PlantModel,
    ) -> Vec<PropertyAction> {
        let point = &command.step.destination_point;
        let mut candidates = extract_actions(&point.properties, &point.name, &mut self.action_ids);
        if command.is_final_step() {
            candidates.extend(self.final_destination_candidates(command, vehicle, plant));
        }
        candidates.extend(self.command_candidates(command));
        candidates
    }

    /// Operation-location actions and the operation's destination action.
    fn final_destination_candidates(
        &mut self,
        command: &MovementCommand,
        vehicle: &VehicleProfile,
        plant: &dyn PlantModel,
    ) -> Vec<PropertyAction> {
        let mut candidates = Vec::new();
        let location_type = command
            .op_location
            .as_ref()
            .and_then(|l| plant.location_type(&l.type_name));
        if let Some(location) = command.op_location.as_ref() {
            candidates.extend(extract_actions(
                &location.properties,
                &location.name,
                &mut self.action_ids,
            ));
        }
        candidates.extend(actions::destination_action(
            command,
            location_type,
            vehicle,
            &mut self.action_ids,
        ));
        candidates
    }

    fn command_candidates(&mut self, command: &MovementCommand) -> Vec<PropertyAction> {
        extract_actions(
            &command.properties,
            &command.transport_order,
            &mut self.action_ids,
        )
    }
}

fn destination_trigger(command: &MovementCommand) -> ActionTrigger {
    if command.is_final_step() {
        ActionTrigger::OrderEnd
    } else {
        ActionTrigger::Passing
    }
}

fn node_filter(vehicle: &VehicleProfile, trigger: ActionTrigger) -> ActionFilter {
    ActionFilter::for_vehicle(vehicle).with_rule(TriggerRule::single(trigger))
}
