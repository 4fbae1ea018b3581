//! [`PositionResolver`] – discrete point name from a state report.
//!
//! Resolution order:
//!
//! 1. A non-blank `lastNodeId` reported by the vehicle is authoritative.
//! 2. Otherwise, with a continuous `agvPosition`: the last known point if it
//!    still matches, else the first matching point in plant-model order.
//! 3. Otherwise the last known position is kept.
//!
//! A point *matches* when it is within the configured XY deviation, on the
//! same map, and either has no orientation or is within the configured theta
//! deviation.
//!
//! # Example
//!
//! ```
//! use vdalink_mapping::position_resolver::{PositionResolver, ResolverConfig};
//! use vdalink_types::{AgvPosition, Header, InMemoryPlantModel, Point, State};
//!
//! let plant = InMemoryPlantModel::default().with_point(Point::new("P3", 3000.0, 0.0));
//! let resolver = PositionResolver::new(ResolverConfig::default());
//!
//! let mut state = State::new(Header::new(1, chrono::Utc::now()));
//! state.agv_position = Some(AgvPosition {
//!     x: 3.05, y: 0.0, theta: 0.0, map_id: "default".into(), position_initialized: true,
//! });
//! assert_eq!(resolver.resolve(None, &state, &plant).as_deref(), Some("P3"));
//!
//! // An explicit node id always wins.
//! state.last_node_id = "P7".into();
//! assert_eq!(resolver.resolve(None, &state, &plant).as_deref(), Some("P7"));
//! ```

use std::f64::consts::{PI, TAU};

use tracing::trace;
use vdalink_types::{AgvPosition, PlantModel, Point, State};

use crate::properties;

/// Tolerances used to match a continuous position against points.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Meters.
    pub deviation_xy: f64,
    /// Radians.
    pub deviation_theta: f64,
    /// Map id for points without a `vda5050:mapId` property.
    pub default_map_id: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            deviation_xy: 0.5,
            deviation_theta: 0.1,
            default_map_id: "default".to_string(),
        }
    }
}

pub struct PositionResolver {
    config: ResolverConfig,
}

impl PositionResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Resolve the vehicle's current point name.
    pub fn resolve(
        &self,
        last_known: Option<&str>,
        state: &State,
        plant: &dyn PlantModel,
    ) -> Option<String> {
        let reported = state.last_node_id.trim();
        if !reported.is_empty() {
            return Some(reported.to_string());
        }
        let Some(position) = state.agv_position.as_ref() else {
            return last_known.map(str::to_string);
        };

        if let Some(point) = last_known.and_then(|name| plant.point(name))
            && self.matches(point, position)
        {
            return Some(point.name.clone());
        }
        plant
            .points()
            .into_iter()
            .find(|point| self.matches(point, position))
            .map(|point| point.name.clone())
            .or_else(|| last_known.map(str::to_string))
    }

    /// `true` when `position` lies within the deviation envelope of `point`.
    pub fn matches(&self, point: &Point, position: &AgvPosition) -> bool {
        if properties::point_map_id(point, &self.config.default_map_id) != position.map_id {
            return false;
        }
        let dx = point.position.x / 1000.0 - position.x;
        let dy = point.position.y / 1000.0 - position.y;
        if dx.hypot(dy) > self.config.deviation_xy {
            return false;
        }
        let matched = match point.vehicle_orientation_angle {
            None => true,
            Some(degrees) => {
                angular_difference(degrees.to_radians(), position.theta) <= self.config.deviation_theta
            }
        };
        trace!(point = %point.name, matched, "position match");
        matched
    }
}

/// Absolute difference of two angles, normalized to `[0, π]`.
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(TAU);
    if diff > PI { TAU - diff } else { diff }
}
