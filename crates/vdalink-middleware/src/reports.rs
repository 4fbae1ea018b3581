//! Command reports: a movement command was driven, or its order was refused.
//!
//! Unlike [`VehicleEvent`][crate::bus::VehicleEvent]s these must never be
//! lost, since the upstream scheduler waits on them to advance its
//! transport order.  They travel over an unbounded [`mpsc`] channel with a
//! single consumer instead of the broadcast bus.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use vdalink_types::{MovementCommand, VdaError, VehicleError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "report", rename_all = "camelCase")]
pub enum CommandReport {
    Completed {
        command: Box<MovementCommand>,
    },
    Rejected {
        order_id: String,
        command: Box<MovementCommand>,
        errors: Vec<VehicleError>,
    },
}

impl CommandReport {
    pub fn command(&self) -> &MovementCommand {
        match self {
            CommandReport::Completed { command } | CommandReport::Rejected { command, .. } => {
                command
            }
        }
    }
}

/// Sending half of the report channel, owned by the controller.
///
/// # Example
///
/// ```
/// use vdalink_middleware::reports::CommandReporter;
///
/// let (reporter, mut rx) = CommandReporter::new();
/// drop(reporter);
/// assert!(rx.try_recv().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct CommandReporter {
    tx: mpsc::UnboundedSender<CommandReport>,
}

impl CommandReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CommandReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue `report` for the consumer.  Fails only once the receiver is gone.
    pub fn report(&self, report: CommandReport) -> Result<(), VdaError> {
        self.tx
            .send(report)
            .map_err(|e| VdaError::Channel(format!("command report channel closed: {e}")))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdalink_types::{Point, Properties, Step, VehicleOrientation};

    fn command(index: usize) -> MovementCommand {
        let step = Step {
            path: None,
            source_point: None,
            destination_point: Point::new("B", 1000.0, 0.0),
            vehicle_orientation: VehicleOrientation::Forward,
            route_index: index,
        };
        MovementCommand {
            transport_order: "T".to_string(),
            drive_order_index: 0,
            route: vec![step.clone()],
            step: step.clone(),
            operation: String::new(),
            op_location: None,
            final_destination: step.destination_point.clone(),
            final_movement: true,
            no_operation: true,
            properties: Properties::new(),
        }
    }

    #[test]
    fn reports_are_never_dropped() {
        let (reporter, mut rx) = CommandReporter::new();
        for i in 0..1_000 {
            reporter
                .report(CommandReport::Completed {
                    command: Box::new(command(i)),
                })
                .unwrap();
        }
        let mut received = 0;
        while let Ok(report) = rx.try_recv() {
            assert_eq!(report.command().step.route_index, received);
            received += 1;
        }
        assert_eq!(received, 1_000);
    }

    #[test]
    fn report_after_receiver_drop_is_an_error() {
        let (reporter, rx) = CommandReporter::new();
        drop(rx);
        assert!(reporter.is_closed());
        let result = reporter.report(CommandReport::Completed {
            command: Box::new(command(0)),
        });
        assert!(matches!(result, Err(VdaError::Channel(_))));
    }
}
