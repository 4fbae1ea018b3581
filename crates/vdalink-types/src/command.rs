//! [`MovementCommand`] – one step of a drive order, as handed down by the
//! transport-order execution engine.

use serde::{Deserialize, Serialize};

use crate::plant::{Location, Point, Properties, Step};

/// A single movement step plus the context needed to map it to an order.
///
/// The command is opaque to the upstream engine's internals; it carries the
/// full route of its drive order so the mapper can build a horizon, and the
/// names of the owning transport order / drive order so consecutive commands
/// can be stitched into one logical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementCommand {
    /// Name of the owning transport order.
    pub transport_order: String,
    /// Index of the owning drive order within the transport order.
    pub drive_order_index: usize,
    /// Full route of the drive order.
    pub route: Vec<Step>,
    /// The step this command executes.
    pub step: Step,
    /// Operation to perform at the final destination.
    #[serde(default)]
    pub operation: String,
    /// Location the operation is performed at, if any.
    #[serde(default)]
    pub op_location: Option<Location>,
    /// The drive order's final destination point.
    pub final_destination: Point,
    /// `true` for the last movement of the whole transport order.
    #[serde(default)]
    pub final_movement: bool,
    /// `true` when the operation is the no-operation marker.
    #[serde(default)]
    pub no_operation: bool,
    /// Transport-order level properties.
    #[serde(default)]
    pub properties: Properties,
}

impl MovementCommand {
    /// Order id shared by every command of the same drive order.
    pub fn order_name(&self) -> String {
        format!("{}_{}", self.transport_order, self.drive_order_index)
    }

    /// `true` when this command executes the last step of its route.
    pub fn is_final_step(&self) -> bool {
        self.step.route_index + 1 >= self.route.len()
    }

    /// `true` when an operation has to be performed at the destination.
    pub fn has_operation(&self) -> bool {
        self.is_final_step() && !self.no_operation && !self.operation.is_empty()
    }

    /// Steps after this command's step, in route order.
    pub fn remaining_steps(&self) -> &[Step] {
        let next = (self.step.route_index + 1).min(self.route.len());
        &self.route[next..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::{Path, VehicleOrientation};

    fn step(index: usize, from: &str, to: &str) -> Step {
        Step {
            path: Some(Path::new(format!("{from}--{to}"), from, to)),
            source_point: Some(Point::new(from, 0.0, 0.0)),
            destination_point: Point::new(to, 1000.0, 0.0),
            vehicle_orientation: VehicleOrientation::Forward,
            route_index: index,
        }
    }

    fn command(step_index: usize) -> MovementCommand {
        let route = vec![step(0, "A", "B"), step(1, "B", "C"), step(2, "C", "D")];
        MovementCommand {
            transport_order: "TOrder-0001".to_string(),
            drive_order_index: 1,
            step: route[step_index].clone(),
            final_destination: route[2].destination_point.clone(),
            route,
            operation: "LOAD".to_string(),
            op_location: None,
            final_movement: false,
            no_operation: false,
            properties: Properties::new(),
        }
    }

    #[test]
    fn order_name_joins_transport_order_and_drive_order_index() {
        assert_eq!(command(0).order_name(), "TOrder-0001_1");
    }

    #[test]
    fn only_last_step_is_final_and_carries_operation() {
        assert!(!command(1).is_final_step());
        assert!(!command(1).has_operation());
        assert!(command(2).is_final_step());
        assert!(command(2).has_operation());
    }

    #[test]
    fn no_operation_suppresses_operation() {
        let mut cmd = command(2);
        cmd.no_operation = true;
        assert!(!cmd.has_operation());
    }

    #[test]
    fn remaining_steps_follow_current_step() {
        let names: Vec<_> = command(0)
            .remaining_steps()
            .iter()
            .map(|s| s.destination_point.name.clone())
            .collect();
        assert_eq!(names, vec!["C", "D"]);
        assert!(command(2).remaining_steps().is_empty());
    }
}
