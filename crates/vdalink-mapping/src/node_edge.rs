//! Points and route steps to protocol nodes and edges.
//!
//! Plant coordinates are millimetres and degrees; the protocol wants meters
//! and radians.  All conversions happen here.
//!
//! # Allowed deviation
//!
//! In [`DeviationMode::Standard`] the point's own `vda5050:deviationXY` /
//! `vda5050:deviationTheta` properties override the vehicle's, and both are
//! omitted when neither object sets them.  Theta is configured in degrees.
//!
//! [`DeviationMode::Extended`] is used for the first node of a freshly
//! started order: the XY tolerance is widened to the distance between the
//! vehicle's precise position and the node plus [`EXTENDED_DEVIATION_MARGIN`],
//! and theta is left unconstrained (π), so the vehicle's actual pose is
//! always inside the acceptance envelope of the node it starts on.
//!
//! # Example
//!
//! ```
//! use vdalink_mapping::node_edge::{DeviationMode, ElementMapper};
//! use vdalink_types::{PlantPosition, Point, VehicleProfile};
//!
//! let vehicle = VehicleProfile::default();
//! let mapper = ElementMapper::new(&vehicle, "floor0");
//! let point = Point::new("P1", 1000.0, 1000.0);
//!
//! let node = mapper.to_base_node(
//!     &point,
//!     0,
//!     Vec::new(),
//!     DeviationMode::Extended(PlantPosition::new(5000.0, 5000.0)),
//! );
//! let pos = node.node_position.unwrap();
//! assert!((pos.allowed_deviation_xy.unwrap() - (32f64.sqrt() + 0.01)).abs() < 1e-9);
//! assert_eq!(pos.allowed_deviation_theta, Some(std::f64::consts::PI));
//! ```

use std::f64::consts::PI;

use vdalink_types::{
    Action, Edge, Node, NodePosition, PlantPosition, Point, Properties, Step, VehicleOrientation,
    VehicleProfile,
};

use crate::properties::{
    self, DEVIATION_THETA, DEVIATION_XY, ORIENTATION_FORWARD, ORIENTATION_REVERSE,
    ROTATION_ALLOWED_FORWARD, ROTATION_ALLOWED_REVERSE,
};

/// Added to the measured distance in extended deviation mode (meters).
pub const EXTENDED_DEVIATION_MARGIN: f64 = 0.01;

/// Plant length unit (mm) per protocol length unit (m).
const MM_PER_M: f64 = 1000.0;

/// How a node's allowed deviation is computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviationMode {
    /// Point property, else vehicle property, else unset.
    Standard,
    /// Widen to cover the vehicle's precise position (plant coordinates).
    Extended(PlantPosition),
}

/// Maps points and steps for one vehicle.
pub struct ElementMapper<'a> {
    vehicle: &'a VehicleProfile,
    default_map_id: &'a str,
}

impl<'a> ElementMapper<'a> {
    pub fn new(vehicle: &'a VehicleProfile, default_map_id: &'a str) -> Self {
        Self {
            vehicle,
            default_map_id,
        }
    }

    /// A released node for `point`.
    pub fn to_base_node(
        &self,
        point: &Point,
        sequence_id: u32,
        actions: Vec<Action>,
        mode: DeviationMode,
    ) -> Node {
        self.to_node(point, sequence_id, true, actions, mode)
    }

    /// An unreleased node for `point`.  Horizon nodes always use the
    /// standard deviation.
    pub fn to_horizon_node(&self, point: &Point, sequence_id: u32, actions: Vec<Action>) -> Node {
        self.to_node(point, sequence_id, false, actions, DeviationMode::Standard)
    }

    /// A released edge for `step`, or `None` when the step has no path.
    pub fn to_base_edge(&self, step: &Step, sequence_id: u32, actions: Vec<Action>) -> Option<Edge> {
        self.to_edge(step, sequence_id, true, actions)
    }

    /// An unreleased edge for `step`, or `None` when the step has no path.
    pub fn to_horizon_edge(
        &self,
        step: &Step,
        sequence_id: u32,
        actions: Vec<Action>,
    ) -> Option<Edge> {
        self.to_edge(step, sequence_id, false, actions)
    }

    fn to_node(
        &self,
        point: &Point,
        sequence_id: u32,
        released: bool,
        actions: Vec<Action>,
        mode: DeviationMode,
    ) -> Node {
        let x = point.position.x / MM_PER_M;
        let y = point.position.y / MM_PER_M;
        let (allowed_deviation_xy, allowed_deviation_theta) = match mode {
            DeviationMode::Standard => self.standard_deviation(point),
            DeviationMode::Extended(precise) => {
                let (xy, theta) = extended_deviation(point, precise);
                (Some(xy), Some(theta))
            }
        };
        Node {
            node_id: point.name.clone(),
            sequence_id,
            released,
            node_position: Some(NodePosition {
                x,
                y,
                theta: point.vehicle_orientation_angle.map(f64::to_radians),
                allowed_deviation_xy,
                allowed_deviation_theta,
                map_id: properties::point_map_id(point, self.default_map_id).to_string(),
            }),
            actions,
        }
    }

    fn standard_deviation(&self, point: &Point) -> (Option<f64>, Option<f64>) {
        let xy = deviation_property(&point.properties, DEVIATION_XY)
            .or_else(|| deviation_property(&self.vehicle.properties, DEVIATION_XY));
        let theta = deviation_property(&point.properties, DEVIATION_THETA)
            .or_else(|| deviation_property(&self.vehicle.properties, DEVIATION_THETA))
            .map(f64::to_radians);
        (xy, theta)
    }

    fn to_edge(
        &self,
        step: &Step,
        sequence_id: u32,
        released: bool,
        actions: Vec<Action>,
    ) -> Option<Edge> {
        let path = step.path.as_ref()?;
        let start_node_id = step
            .source_point
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_else(|| path.source_point.clone());

        let reverse = step.vehicle_orientation == VehicleOrientation::Backward;
        let (velocity, orientation_key, rotation_key) = if reverse {
            (path.max_reverse_velocity, ORIENTATION_REVERSE, ROTATION_ALLOWED_REVERSE)
        } else {
            (path.max_velocity, ORIENTATION_FORWARD, ROTATION_ALLOWED_FORWARD)
        };

        Some(Edge {
            edge_id: path.name.clone(),
            sequence_id,
            released,
            start_node_id,
            end_node_id: step.destination_point.name.clone(),
            max_speed: (velocity > 0).then(|| f64::from(velocity) / MM_PER_M),
            orientation: properties::parse_property::<f64>(&path.properties, orientation_key)
                .map(f64::to_radians),
            rotation_allowed: properties::parse_property::<bool>(&path.properties, rotation_key),
            actions,
        })
    }
}

/// A non-negative deviation value from `properties`.
fn deviation_property(properties: &Properties, key: &str) -> Option<f64> {
    properties::parse_property::<f64>(properties, key).filter(|v| *v >= 0.0)
}

/// Tolerances covering `precise` (plant coordinates) around `point`:
/// `(distance + margin, π)`, in meters and radians.
pub fn extended_deviation(point: &Point, precise: PlantPosition) -> (f64, f64) {
    let dx = (precise.x - point.position.x) / MM_PER_M;
    let dy = (precise.y - point.position.y) / MM_PER_M;
    (dx.hypot(dy) + EXTENDED_DEVIATION_MARGIN, PI)
}
