//! Read-only plant-model values.
//!
//! The plant model (points, paths, locations, vehicles) is owned by the
//! upstream fleet manager.  The protocol core only reads it through the
//! [`PlantModel`] trait and the string property maps attached to each object.
//! Coordinates are millimetres and angles are degrees, as in the plant model;
//! conversion to VDA5050 units happens in `vdalink-mapping`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form key/value properties attached to a plant-model object.
pub type Properties = BTreeMap<String, String>;

/// A position in plant coordinates (millimetres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlantPosition {
    pub x: f64,
    pub y: f64,
}

impl PlantPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub name: String,
    pub position: PlantPosition,
    /// Degrees; `None` when the point does not constrain orientation.
    #[serde(default)]
    pub vehicle_orientation_angle: Option<f64>,
    #[serde(default)]
    pub properties: Properties,
}

impl Point {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            position: PlantPosition::new(x, y),
            vehicle_orientation_angle: None,
            properties: Properties::new(),
        }
    }

    pub fn with_orientation(mut self, degrees: f64) -> Self {
        self.vehicle_orientation_angle = Some(degrees);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub name: String,
    pub source_point: String,
    pub destination_point: String,
    /// Millimetres per second.
    #[serde(default)]
    pub max_velocity: u32,
    /// Millimetres per second.
    #[serde(default)]
    pub max_reverse_velocity: u32,
    #[serde(default)]
    pub properties: Properties,
}

impl Path {
    pub fn new(
        name: impl Into<String>,
        source_point: impl Into<String>,
        destination_point: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_point: source_point.into(),
            destination_point: destination_point.into(),
            max_velocity: 0,
            max_reverse_velocity: 0,
            properties: Properties::new(),
        }
    }

    pub fn with_velocities(mut self, forward: u32, reverse: u32) -> Self {
        self.max_velocity = forward;
        self.max_reverse_velocity = reverse;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationType {
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
}

/// Direction the vehicle travels a path in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleOrientation {
    Forward,
    Backward,
    #[default]
    Undefined,
}

/// One step of a computed route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// `None` for a step that does not move (e.g. an operation in place).
    #[serde(default)]
    pub path: Option<Path>,
    #[serde(default)]
    pub source_point: Option<Point>,
    pub destination_point: Point,
    #[serde(default)]
    pub vehicle_orientation: VehicleOrientation,
    /// Position of this step within its route.
    pub route_index: usize,
}

impl Step {
    pub fn has_movement(&self) -> bool {
        self.path.is_some() && self.source_point.is_some()
    }
}

/// The vehicle's static properties and its last known precise position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
    /// Operation name that means "recharge here".
    #[serde(default)]
    pub recharge_operation: String,
    /// Millimetres.
    #[serde(default)]
    pub precise_position: Option<PlantPosition>,
}

// ────────────────────────────────────────────────────────────────────────────
// Queries
// ────────────────────────────────────────────────────────────────────────────

/// Read-only queries the protocol core issues against the plant model.
pub trait PlantModel: Send + Sync {
    fn point(&self, name: &str) -> Option<&Point>;

    /// All points, in plant-model order.
    fn points(&self) -> Vec<&Point>;

    fn location_type(&self, name: &str) -> Option<&LocationType>;
}

/// A [`PlantModel`] snapshot held entirely in memory.
///
/// # Example
///
/// ```
/// use vdalink_types::plant::{InMemoryPlantModel, PlantModel, Point};
///
/// let model = InMemoryPlantModel::default()
///     .with_point(Point::new("P1", 0.0, 0.0))
///     .with_point(Point::new("P2", 1000.0, 0.0));
///
/// assert_eq!(model.points().len(), 2);
/// assert!(model.point("P2").is_some());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryPlantModel {
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub location_types: Vec<LocationType>,
}

impl InMemoryPlantModel {
    pub fn with_point(mut self, point: Point) -> Self {
        self.points.push(point);
        self
    }

    pub fn with_location_type(mut self, location_type: LocationType) -> Self {
        self.location_types.push(location_type);
        self
    }
}

impl PlantModel for InMemoryPlantModel {
    fn point(&self, name: &str) -> Option<&Point> {
        self.points.iter().find(|p| p.name == name)
    }

    fn points(&self) -> Vec<&Point> {
        self.points.iter().collect()
    }

    fn location_type(&self, name: &str) -> Option<&LocationType> {
        self.location_types.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_without_path_has_no_movement() {
        let step = Step {
            path: None,
            source_point: Some(Point::new("A", 0.0, 0.0)),
            destination_point: Point::new("A", 0.0, 0.0),
            vehicle_orientation: VehicleOrientation::Undefined,
            route_index: 0,
        };
        assert!(!step.has_movement());
    }

    #[test]
    fn in_memory_model_looks_up_location_types() {
        let model = InMemoryPlantModel::default().with_location_type(LocationType {
            name: "Charger".to_string(),
            properties: Properties::new(),
        });
        assert!(model.location_type("Charger").is_some());
        assert!(model.location_type("Shelf").is_none());
    }

    #[test]
    fn plant_model_deserializes_with_defaults() {
        let raw = r#"{"points": [{"name": "P1", "position": {"x": 1.0, "y": 2.0}}]}"#;
        let model: InMemoryPlantModel = serde_json::from_str(raw).unwrap();
        let p = model.point("P1").unwrap();
        assert_eq!(p.vehicle_orientation_angle, None);
        assert!(p.properties.is_empty());
        assert!(model.location_types.is_empty());
    }
}
