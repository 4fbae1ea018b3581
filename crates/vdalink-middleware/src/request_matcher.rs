//! [`RequestMatcher`] – one outbound request in flight at a time.
//!
//! Requests are queued in FIFO order.  The head is sent and stays at the head
//! until a state report acknowledges it:
//!
//! - an order is acknowledged when the report's `orderId` / `orderUpdateId`
//!   equal the order's;
//! - an instant-action batch is acknowledged when every action id of the
//!   batch appears in the report's `actionStates`.
//!
//! A report that acknowledges nothing makes the matcher resend the head.  A
//! report carrying one of the [`REJECTION_ERROR_TYPES`] marks an order head
//! as rejected instead: the listener is told once and the order is never
//! resent.  Nothing is sent while the vehicle is not in an automatic mode.
//!
//! There is no timer.  Only a new state report moves the queue.

use std::collections::VecDeque;

use tracing::{debug, info, warn};
use vdalink_types::{InstantActions, MovementCommand, Order, State, VehicleError};

use crate::adapter::MessageSink;

/// Error types with which a vehicle refuses an order.
pub const REJECTION_ERROR_TYPES: [&str; 4] = [
    "validationError",
    "noRouteError",
    "orderError",
    "orderUpdateError",
];

/// An order paired with the movement command it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAssociation {
    pub order: Order,
    pub command: MovementCommand,
}

impl OrderAssociation {
    pub fn new(order: Order, command: MovementCommand) -> Self {
        Self { order, command }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Order(OrderAssociation),
    InstantActions(InstantActions),
}

impl Request {
    /// `true` when `state` acknowledges this request.
    pub fn is_acknowledged_by(&self, state: &State) -> bool {
        match self {
            Request::Order(association) => {
                state.order_id == association.order.order_id
                    && state.order_update_id == association.order.order_update_id
            }
            Request::InstantActions(actions) => actions
                .action_ids()
                .all(|id| state.action_state(id).is_some()),
        }
    }

    fn send(&self, sink: &dyn MessageSink) {
        let result = match self {
            Request::Order(association) => {
                debug!(
                    order_id = %association.order.order_id,
                    order_update_id = association.order.order_update_id,
                    "sending order"
                );
                sink.send_order(&association.order)
            }
            Request::InstantActions(actions) => {
                debug!(count = actions.instant_actions.len(), "sending instant actions");
                sink.send_instant_actions(actions)
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to send request, keeping it pending");
        }
    }
}

/// Receives the outcome of queued requests.
pub trait RequestListener {
    /// The vehicle acknowledged the order; ownership passes to the caller.
    fn order_accepted(&mut self, association: OrderAssociation);

    /// The vehicle refused the order.  Called once per order.
    fn order_rejected(&mut self, association: &OrderAssociation, errors: &[VehicleError]);

    fn instant_actions_accepted(&mut self, _actions: InstantActions) {}
}

struct Pending {
    request: Request,
    rejected: bool,
}

/// # Example
///
/// ```
/// use vdalink_middleware::adapter::ChannelSink;
/// use vdalink_middleware::request_matcher::{Request, RequestMatcher};
/// use vdalink_types::{BlockingType, InstantActions};
///
/// let (sink, mut rx) = ChannelSink::new();
/// let mut matcher = RequestMatcher::new();
/// matcher.enqueue(Request::InstantActions(InstantActions::single("startPause", BlockingType::Hard)), &sink);
///
/// // Nothing leaves until a state report shows an automatic operating mode.
/// assert!(rx.try_recv().is_err());
/// assert_eq!(matcher.len(), 1);
/// ```
#[derive(Default)]
pub struct RequestMatcher {
    queue: VecDeque<Pending>,
    sending_allowed: bool,
}

impl RequestMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn sending_allowed(&self) -> bool {
        self.sending_allowed
    }

    /// The request currently in flight.
    pub fn head(&self) -> Option<&Request> {
        self.queue.front().map(|p| &p.request)
    }

    /// Append `request`; it is sent right away when the queue was empty.
    pub fn enqueue(&mut self, request: Request, sink: &dyn MessageSink) {
        let was_empty = self.queue.is_empty();
        self.queue.push_back(Pending {
            request,
            rejected: false,
        });
        if was_empty {
            self.send_head(sink);
        }
    }

    /// Evaluate the head of the queue against a state report.
    pub fn on_state(
        &mut self,
        state: &State,
        sink: &dyn MessageSink,
        listener: &mut dyn RequestListener,
    ) {
        self.sending_allowed = state.operating_mode.accepts_orders();

        let Some(head) = self.queue.front_mut() else {
            return;
        };

        let rejections: Vec<VehicleError> = state
            .errors
            .iter()
            .filter(|e| REJECTION_ERROR_TYPES.contains(&e.error_type.as_str()))
            .cloned()
            .collect();
        if !rejections.is_empty() {
            if let Request::Order(association) = &head.request
                && !head.rejected
            {
                warn!(
                    order_id = %association.order.order_id,
                    errors = rejections.len(),
                    "vehicle rejected order"
                );
                head.rejected = true;
                listener.order_rejected(association, &rejections);
            }
            return;
        }

        if head.request.is_acknowledged_by(state) {
            let Some(done) = self.queue.pop_front() else {
                return;
            };
            match done.request {
                Request::Order(association) => {
                    info!(
                        order_id = %association.order.order_id,
                        order_update_id = association.order.order_update_id,
                        "order acknowledged"
                    );
                    listener.order_accepted(association);
                }
                Request::InstantActions(actions) => {
                    info!(count = actions.instant_actions.len(), "instant actions acknowledged");
                    listener.instant_actions_accepted(actions);
                }
            }
            self.send_head(sink);
        } else if !head.rejected {
            self.send_head(sink);
        }
    }

    /// Drop every queued request without notifying the vehicle.
    pub fn clear(&mut self) {
        if !self.queue.is_empty() {
            info!(dropped = self.queue.len(), "request queue cleared");
        }
        self.queue.clear();
    }

    fn send_head(&self, sink: &dyn MessageSink) {
        let Some(head) = self.queue.front() else {
            return;
        };
        if !self.sending_allowed {
            debug!("sending suppressed, vehicle not in automatic mode");
            return;
        }
        head.request.send(sink);
    }
}
