//! [`VehicleController`] – the protocol core of one vehicle, wired together.
//!
//! Outbound, each movement command is mapped to an order and queued on the
//! [`RequestMatcher`].  Inbound, every message passes the
//! [`OrderingFilter`] first; accepted state reports then drive, in order:
//!
//! 1. the request matcher (acknowledged orders move to the tracker),
//! 2. the [`CompletionTracker`],
//! 3. the [`PositionResolver`],
//! 4. energy level and [`VehicleStatus`] derivation.
//!
//! Driven and refused movement commands leave as [`CommandReport`]s through
//! the [`CommandReporter`], which never drops one.  Telemetry (position,
//! energy, status, connection) leaves as [`VehicleEvent`]s on the
//! [`VehicleEventBus`].
//!
//! The controller holds no locks.  Hand it to a
//! [`VehicleExecutor`][crate::executor::VehicleExecutor] and talk to it
//! through the executor's handle.

use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn};
use vdalink_mapping::{MapperConfig, OrderMapper, PositionResolver, ResolverConfig};
use vdalink_middleware::{
    CommandReport, CommandReporter, CompletionMode, CompletionTracker, MessageSink,
    OrderAssociation, OrderingFilter, Request, RequestListener, RequestMatcher, VehicleEvent,
    VehicleEventBus, VehicleStatus,
};
use vdalink_types::{
    ActionStatus, AgvPosition, Connection, ConnectionState, InboundMessage, InstantActions,
    MovementCommand, PlantModel, PlantPosition, State, VehicleError, VehicleProfile,
    Visualization,
};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`VehicleController`].
#[derive(Debug, Clone, Default)]
pub struct ControllerConfig {
    pub mapper: MapperConfig,
    pub resolver: ResolverConfig,
    pub completion_mode: CompletionMode,
}

// ─────────────────────────────────────────────────────────────────────────────
// Status derivation
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse status of the vehicle as reported in `state`.
///
/// Checked in priority order: a FATAL error, a mode that does not accept
/// orders, charging, driving or running actions, idle.
pub fn derive_status(state: &State) -> VehicleStatus {
    if state.has_fatal_error() {
        VehicleStatus::Error
    } else if !state.operating_mode.accepts_orders() {
        VehicleStatus::Unavailable
    } else if state.battery_state.charging {
        VehicleStatus::Charging
    } else if state.driving
        || state
            .action_states
            .iter()
            .any(|a| a.action_status == ActionStatus::Running)
    {
        VehicleStatus::Executing
    } else {
        VehicleStatus::Idle
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// VehicleController
// ─────────────────────────────────────────────────────────────────────────────

pub struct VehicleController {
    vehicle: VehicleProfile,
    plant: Arc<dyn PlantModel>,
    sink: Arc<dyn MessageSink>,
    reporter: CommandReporter,
    bus: VehicleEventBus,
    filter: OrderingFilter,
    matcher: RequestMatcher,
    tracker: CompletionTracker,
    mapper: OrderMapper,
    resolver: PositionResolver,
    // ── Last reported values ─────────────────────────────────────────────────
    position: Option<String>,
    orientation_deg: Option<f64>,
    energy_level: Option<f64>,
    status: VehicleStatus,
    connection: Option<ConnectionState>,
}

impl VehicleController {
    pub fn new(
        config: ControllerConfig,
        vehicle: VehicleProfile,
        plant: Arc<dyn PlantModel>,
        sink: Arc<dyn MessageSink>,
        reporter: CommandReporter,
        bus: VehicleEventBus,
    ) -> Self {
        Self {
            vehicle,
            plant,
            sink,
            reporter,
            bus,
            filter: OrderingFilter::new(),
            matcher: RequestMatcher::new(),
            tracker: CompletionTracker::new(config.completion_mode),
            mapper: OrderMapper::new(config.mapper),
            resolver: PositionResolver::new(config.resolver),
            position: None,
            orientation_deg: None,
            energy_level: None,
            status: VehicleStatus::Unknown,
            connection: None,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn vehicle(&self) -> &VehicleProfile {
        &self.vehicle
    }

    pub fn bus(&self) -> &VehicleEventBus {
        &self.bus
    }

    /// The resolved point name.
    pub fn position(&self) -> Option<&str> {
        self.position.as_deref()
    }

    pub fn status(&self) -> VehicleStatus {
        self.status
    }

    pub fn energy_level(&self) -> Option<f64> {
        self.energy_level
    }

    pub fn is_offline(&self) -> bool {
        self.filter.is_offline()
    }

    /// Requests queued on the matcher, including the one in flight.
    pub fn pending_requests(&self) -> usize {
        self.matcher.len()
    }

    /// Acknowledged orders not yet driven.
    pub fn tracked_orders(&self) -> usize {
        self.tracker.len()
    }

    // ── Outbound ─────────────────────────────────────────────────────────────

    /// Map `command` to an order and queue it for sending.
    #[instrument(skip_all, fields(vehicle = %self.vehicle.name, step = command.step.route_index))]
    pub fn enqueue_command(&mut self, command: MovementCommand) {
        let order = self
            .mapper
            .to_order(&command, &self.vehicle, self.plant.as_ref());
        self.matcher.enqueue(
            Request::Order(OrderAssociation::new(order, command)),
            self.sink.as_ref(),
        );
    }

    pub fn send_instant_actions(&mut self, actions: InstantActions) {
        self.matcher
            .enqueue(Request::InstantActions(actions), self.sink.as_ref());
    }

    /// Drop every queued request and tracked order.  The vehicle is not told.
    pub fn clear_queues(&mut self) {
        info!(vehicle = %self.vehicle.name, "clearing command queues");
        self.matcher.clear();
        self.tracker.clear();
        self.mapper.reset();
    }

    pub fn on_broker_offline(&mut self) {
        self.filter.on_broker_offline();
    }

    // ── Inbound ──────────────────────────────────────────────────────────────

    /// Process one inbound message.  Returns `false` when the ordering filter
    /// dropped it.
    #[instrument(skip_all, fields(vehicle = %self.vehicle.name, topic = %message.topic()))]
    pub fn handle_message(&mut self, message: &InboundMessage) -> bool {
        if !self.filter.accept(message) {
            return false;
        }
        match message {
            InboundMessage::Connection(connection) => self.handle_connection(connection),
            InboundMessage::State(state) => self.handle_state(state),
            InboundMessage::Visualization(visualization) => {
                self.handle_visualization(visualization)
            }
        }
        true
    }

    fn handle_connection(&mut self, connection: &Connection) {
        let state = connection.connection_state;
        if self.connection != Some(state) {
            self.connection = Some(state);
            self.emit(VehicleEvent::ConnectionChanged { state });
        }
        if state != ConnectionState::Online {
            self.update_status(VehicleStatus::Unavailable);
        }
    }

    fn handle_state(&mut self, state: &State) {
        let mut outcome = MatcherOutcome::default();
        self.matcher
            .on_state(state, self.sink.as_ref(), &mut outcome);
        for association in outcome.accepted {
            self.tracker.enqueue(association);
        }
        for report in outcome.rejected {
            self.report(report);
        }

        let mut completed = Vec::new();
        self.tracker.on_state(state, |command| completed.push(command));
        for command in completed {
            self.report(CommandReport::Completed {
                command: Box::new(command),
            });
        }

        let resolved = self
            .resolver
            .resolve(self.position.as_deref(), state, self.plant.as_ref());
        if resolved != self.position {
            debug!(from = ?self.position, to = ?resolved, "position changed");
            self.position = resolved.clone();
            self.emit(VehicleEvent::PositionChanged { point: resolved });
        }

        if let Some(position) = &state.agv_position {
            self.update_precise_position(position);
        }

        let charge = state.battery_state.battery_charge;
        if self.energy_level != Some(charge) {
            self.energy_level = Some(charge);
            self.emit(VehicleEvent::EnergyLevelChanged { percent: charge });
        }

        self.update_status(derive_status(state));
    }

    fn handle_visualization(&mut self, visualization: &Visualization) {
        if let Some(position) = &visualization.agv_position {
            self.update_precise_position(position);
        }
    }

    fn update_precise_position(&mut self, position: &AgvPosition) {
        let (precise, orientation) = if position.position_initialized {
            (
                Some(PlantPosition::new(position.x * 1000.0, position.y * 1000.0)),
                Some(position.theta.to_degrees()),
            )
        } else {
            (None, None)
        };
        if precise != self.vehicle.precise_position || orientation != self.orientation_deg {
            self.vehicle.precise_position = precise;
            self.orientation_deg = orientation;
            self.emit(VehicleEvent::PrecisePositionChanged {
                position: precise,
                orientation_deg: orientation,
            });
        }
    }

    fn update_status(&mut self, status: VehicleStatus) {
        if self.status != status {
            info!(vehicle = %self.vehicle.name, from = ?self.status, to = ?status, "status changed");
            self.status = status;
            self.emit(VehicleEvent::StatusChanged { status });
        }
    }

    fn report(&self, report: CommandReport) {
        if let Err(e) = self.reporter.report(report) {
            warn!(vehicle = %self.vehicle.name, error = %e, "command report lost");
        }
    }

    fn emit(&self, event: VehicleEvent) {
        if let Err(e) = self.bus.publish(event) {
            trace!(error = %e, "vehicle event not delivered");
        }
    }
}

/// Collects matcher outcomes so they can be applied after the matcher call.
#[derive(Default)]
struct MatcherOutcome {
    accepted: Vec<OrderAssociation>,
    rejected: Vec<CommandReport>,
}

impl RequestListener for MatcherOutcome {
    fn order_accepted(&mut self, association: OrderAssociation) {
        self.accepted.push(association);
    }

    fn order_rejected(&mut self, association: &OrderAssociation, errors: &[VehicleError]) {
        self.rejected.push(CommandReport::Rejected {
            order_id: association.order.order_id.clone(),
            command: Box::new(association.command.clone()),
            errors: errors.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc::UnboundedReceiver;
    use vdalink_middleware::{ChannelSink, OutboundMessage, VehicleEventReceiver};
    use vdalink_middleware::bus::DEFAULT_CAPACITY;
    use vdalink_types::{
        ActionState, EdgeState, ErrorLevel, Header, InMemoryPlantModel, NodeState, OperatingMode,
        Order, Path, Point, Properties, Step, VehicleOrientation,
    };

    struct Harness {
        controller: VehicleController,
        outbound: UnboundedReceiver<OutboundMessage>,
        reports: UnboundedReceiver<CommandReport>,
        events: VehicleEventReceiver,
        header_id: u32,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_bus(VehicleEventBus::new(DEFAULT_CAPACITY))
        }

        fn with_bus(bus: VehicleEventBus) -> Self {
            let plant = InMemoryPlantModel::default()
                .with_point(Point::new("A", 0.0, 0.0))
                .with_point(Point::new("B", 1000.0, 0.0))
                .with_point(Point::new("C", 2000.0, 0.0));
            let (sink, outbound) = ChannelSink::new();
            let (reporter, reports) = CommandReporter::new();
            let events = bus.subscribe();
            let vehicle = VehicleProfile {
                name: "AGV-01".to_string(),
                ..VehicleProfile::default()
            };
            let controller = VehicleController::new(
                ControllerConfig::default(),
                vehicle,
                Arc::new(plant),
                Arc::new(sink),
                reporter,
                bus,
            );
            Self {
                controller,
                outbound,
                reports,
                events,
                header_id: 0,
            }
        }

        fn header(&mut self) -> Header {
            self.header_id += 1;
            Header::new(self.header_id, Utc.timestamp_opt(1_000 + self.header_id as i64, 0).unwrap())
        }

        fn connect(&mut self, connection_state: ConnectionState) -> bool {
            let header = self.header();
            self.controller
                .handle_message(&InboundMessage::Connection(Connection {
                    header,
                    connection_state,
                }))
        }

        fn state(&mut self, order_id: &str, update: u64) -> State {
            let mut state = State::new(self.header());
            state.operating_mode = OperatingMode::Automatic;
            state.order_id = order_id.to_string();
            state.order_update_id = update;
            state.battery_state.battery_charge = 75.0;
            state
        }

        fn feed(&mut self, state: State) -> bool {
            self.controller.handle_message(&InboundMessage::State(state))
        }

        fn sent_orders(&mut self) -> Vec<Order> {
            let mut orders = Vec::new();
            while let Ok(message) = self.outbound.try_recv() {
                if let OutboundMessage::Order(order) = message {
                    orders.push(order);
                }
            }
            orders
        }

        fn drain_reports(&mut self) -> Vec<CommandReport> {
            let mut reports = Vec::new();
            while let Ok(report) = self.reports.try_recv() {
                reports.push(report);
            }
            reports
        }

        fn drain_events(&mut self) -> Vec<VehicleEvent> {
            let mut events = Vec::new();
            while let Some(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn step(index: usize, from: &str, from_x: f64, to: &str, to_x: f64) -> Step {
        Step {
            path: Some(Path::new(format!("{from}--{to}"), from, to)),
            source_point: Some(Point::new(from, from_x, 0.0)),
            destination_point: Point::new(to, to_x, 0.0),
            vehicle_orientation: VehicleOrientation::Forward,
            route_index: index,
        }
    }

    fn commands() -> Vec<MovementCommand> {
        let route = vec![step(0, "A", 0.0, "B", 1000.0), step(1, "B", 1000.0, "C", 2000.0)];
        route
            .iter()
            .map(|s| MovementCommand {
                transport_order: "T1".to_string(),
                drive_order_index: 0,
                route: route.clone(),
                step: s.clone(),
                operation: String::new(),
                op_location: None,
                final_destination: route[1].destination_point.clone(),
                final_movement: s.route_index == 1,
                no_operation: true,
                properties: Properties::new(),
            })
            .collect()
    }

    #[test]
    fn status_priority() {
        let mut state = State::new(Header::new(1, Utc::now()));
        assert_eq!(derive_status(&state), VehicleStatus::Unavailable);

        state.operating_mode = OperatingMode::Automatic;
        assert_eq!(derive_status(&state), VehicleStatus::Idle);

        state.driving = true;
        assert_eq!(derive_status(&state), VehicleStatus::Executing);

        state.battery_state.charging = true;
        assert_eq!(derive_status(&state), VehicleStatus::Charging);

        state.operating_mode = OperatingMode::Manual;
        assert_eq!(derive_status(&state), VehicleStatus::Unavailable);

        state.errors.push(VehicleError {
            error_type: "emergencyStop".to_string(),
            error_level: ErrorLevel::Fatal,
            error_description: None,
        });
        assert_eq!(derive_status(&state), VehicleStatus::Error);
    }

    #[test]
    fn running_action_means_executing() {
        let mut state = State::new(Header::new(1, Utc::now()));
        state.operating_mode = OperatingMode::Semiautomatic;
        state.action_states.push(ActionState {
            action_id: "x".to_string(),
            action_type: None,
            action_status: ActionStatus::Running,
            result_description: None,
        });
        assert_eq!(derive_status(&state), VehicleStatus::Executing);
    }

    #[test]
    fn state_is_dropped_until_vehicle_is_online() {
        let mut h = Harness::new();
        let state = h.state("", 0);
        assert!(!h.feed(state));
        assert!(h.connect(ConnectionState::Online));
        let state = h.state("", 0);
        assert!(h.feed(state));
    }

    #[test]
    fn full_drive_order_lifecycle() {
        let mut h = Harness::new();
        let commands = commands();
        h.controller.enqueue_command(commands[0].clone());
        h.controller.enqueue_command(commands[1].clone());
        assert!(h.sent_orders().is_empty(), "no state report yet");

        h.connect(ConnectionState::Online);
        let mut idle = h.state("", 0);
        idle.last_node_id = "A".to_string();
        h.feed(idle);
        let sent = h.sent_orders();
        assert_eq!(sent.len(), 1);
        assert_eq!((sent[0].order_id.as_str(), sent[0].order_update_id), ("T1_0", 0));
        assert_eq!(h.controller.position(), Some("A"));

        // Vehicle acknowledges the first order while driving A--B.
        let mut driving = h.state("T1_0", 0);
        driving.driving = true;
        driving.edge_states.push(EdgeState {
            edge_id: "A--B".to_string(),
            sequence_id: 1,
            released: true,
        });
        driving.node_states.push(NodeState {
            node_id: "B".to_string(),
            sequence_id: 2,
            released: true,
        });
        h.feed(driving);
        assert_eq!(h.controller.tracked_orders(), 1);
        let update = h.sent_orders();
        assert_eq!(update.len(), 1);
        assert_eq!(update[0].order_update_id, 1);
        assert_eq!(update[0].nodes[0].node_id, "B", "stitched on the previous destination");
        assert_eq!(update[0].nodes[0].sequence_id, 2);
        h.drain_events();

        // B reached and the update acknowledged: first command completes.
        let mut at_b = h.state("T1_0", 1);
        at_b.last_node_id = "B".to_string();
        at_b.driving = true;
        at_b.edge_states.push(EdgeState {
            edge_id: "B--C".to_string(),
            sequence_id: 3,
            released: true,
        });
        h.feed(at_b);
        let completed: Vec<usize> = h
            .drain_reports()
            .iter()
            .filter_map(|r| match r {
                CommandReport::Completed { command } => Some(command.step.route_index),
                _ => None,
            })
            .collect();
        assert_eq!(completed, vec![0]);
        assert!(h.drain_events().contains(&VehicleEvent::PositionChanged {
            point: Some("B".to_string())
        }));

        let mut at_c = h.state("T1_0", 1);
        at_c.last_node_id = "C".to_string();
        h.feed(at_c);
        assert_eq!(h.controller.tracked_orders(), 0);
        assert_eq!(h.controller.pending_requests(), 0);
        assert_eq!(h.controller.status(), VehicleStatus::Idle);
        assert_eq!(h.controller.energy_level(), Some(75.0));
    }

    #[test]
    fn rejection_is_reported() {
        let mut h = Harness::new();
        h.controller.enqueue_command(commands()[0].clone());
        h.connect(ConnectionState::Online);
        let mut rejecting = h.state("", 0);
        rejecting.errors.push(VehicleError {
            error_type: "noRouteError".to_string(),
            error_level: ErrorLevel::Warning,
            error_description: Some("no path to B".to_string()),
        });
        h.feed(rejecting);
        let reports = h.drain_reports();
        assert_eq!(reports.len(), 1);
        match &reports[0] {
            CommandReport::Rejected { order_id, command, errors } => {
                assert_eq!(order_id, "T1_0");
                assert_eq!(command.step.route_index, 0);
                assert_eq!(errors[0].error_type, "noRouteError");
            }
            other => panic!("unexpected report {other:?}"),
        }
        assert!(h.sent_orders().is_empty());
    }

    #[test]
    fn visualization_updates_precise_position() {
        let mut h = Harness::new();
        h.connect(ConnectionState::Online);
        let header = h.header();
        h.controller
            .handle_message(&InboundMessage::Visualization(Visualization {
                header,
                agv_position: Some(AgvPosition {
                    x: 1.5,
                    y: -0.25,
                    theta: 0.0,
                    map_id: "default".to_string(),
                    position_initialized: true,
                }),
                velocity: None,
            }));
        assert_eq!(
            h.controller.vehicle().precise_position,
            Some(PlantPosition::new(1500.0, -250.0))
        );
        assert!(h.drain_events().iter().any(|e| matches!(
            e,
            VehicleEvent::PrecisePositionChanged { position: Some(_), .. }
        )));
    }

    #[test]
    fn clear_queues_starts_a_fresh_order() {
        let mut h = Harness::new();
        let commands = commands();
        h.controller.enqueue_command(commands[0].clone());
        h.controller.clear_queues();
        assert_eq!(h.controller.pending_requests(), 0);

        h.connect(ConnectionState::Online);
        let idle = h.state("", 0);
        h.feed(idle);
        h.controller.enqueue_command(commands[1].clone());
        let sent = h.sent_orders();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].nodes[0].node_id, "B");
        assert_eq!(sent[0].nodes[0].sequence_id, 0, "no stitching after a clear");
    }

    #[test]
    fn connection_loss_makes_vehicle_unavailable() {
        let mut h = Harness::new();
        h.connect(ConnectionState::Online);
        let idle = h.state("", 0);
        h.feed(idle);
        assert_eq!(h.controller.status(), VehicleStatus::Idle);
        h.connect(ConnectionState::ConnectionBroken);
        assert_eq!(h.controller.status(), VehicleStatus::Unavailable);
        assert!(h.controller.is_offline());
    }

    #[test]
    fn completion_survives_a_tiny_lagging_bus() {
        let mut h = Harness::with_bus(VehicleEventBus::new(1));
        h.controller.enqueue_command(commands()[0].clone());
        h.connect(ConnectionState::Online);
        let mut idle = h.state("", 0);
        idle.last_node_id = "A".to_string();
        h.feed(idle);
        let mut at_b = h.state("T1_0", 0);
        at_b.last_node_id = "B".to_string();
        at_b.battery_state.battery_charge = 40.0;
        h.feed(at_b);

        assert_eq!(h.controller.tracked_orders(), 0);
        let reports = h.drain_reports();
        assert_eq!(reports.len(), 1);
        assert!(matches!(&reports[0], CommandReport::Completed { command } if command.step.route_index == 0));
    }

    #[test]
    fn completion_is_reported_without_bus_subscribers() {
        let mut h = Harness::new();
        drop(std::mem::replace(&mut h.events, VehicleEventBus::new(1).subscribe()));
        assert_eq!(h.controller.bus().subscriber_count(), 0);

        h.controller.enqueue_command(commands()[0].clone());
        h.connect(ConnectionState::Online);
        let idle = h.state("", 0);
        h.feed(idle);
        let mut at_b = h.state("T1_0", 0);
        at_b.last_node_id = "B".to_string();
        h.feed(at_b);

        assert_eq!(h.drain_reports().len(), 1);
    }
}
