//! [`CompletionTracker`] – decides when acknowledged orders are driven.
//!
//! The vehicle removes a node or edge from `nodeStates` / `edgeStates` once it
//! has passed it.  An order is complete when none of its released elements
//! remain in the report.  For the last movement of a transport order the
//! actions on those elements must also have finished; action ids the report
//! does not mention count as satisfied.
//!
//! Associations complete in FIFO order.  A report only ever concerns the
//! oldest association, and only when it names that association's order id.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vdalink_types::{MovementCommand, State};

use crate::request_matcher::OrderAssociation;

/// Which released elements must be gone before an order counts as driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    #[default]
    EdgesAndNodes,
    EdgesOnly,
}

/// # Example
///
/// ```
/// use chrono::Utc;
/// use vdalink_middleware::completion_tracker::{CompletionMode, CompletionTracker};
/// use vdalink_types::{Header, State};
///
/// let mut tracker = CompletionTracker::new(CompletionMode::EdgesAndNodes);
/// let state = State::new(Header::new(1, Utc::now()));
/// // Nothing queued: nothing completes.
/// assert_eq!(tracker.on_state(&state, |_| unreachable!()), 0);
/// ```
#[derive(Debug, Default)]
pub struct CompletionTracker {
    queue: VecDeque<OrderAssociation>,
    mode: CompletionMode,
}

impl CompletionTracker {
    pub fn new(mode: CompletionMode) -> Self {
        Self {
            queue: VecDeque::new(),
            mode,
        }
    }

    pub fn mode(&self) -> CompletionMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn enqueue(&mut self, association: OrderAssociation) {
        debug!(order_id = %association.order.order_id, "tracking order");
        self.queue.push_back(association);
    }

    /// Pop every leading association `state` completes and hand its command
    /// to `on_completed`.  Returns the number of completed commands.
    pub fn on_state(
        &mut self,
        state: &State,
        mut on_completed: impl FnMut(MovementCommand),
    ) -> usize {
        let mut completed = 0;
        while let Some(head) = self.queue.front() {
            if head.order.order_id != state.order_id || !self.is_complete(head, state) {
                break;
            }
            let Some(done) = self.queue.pop_front() else {
                break;
            };
            info!(
                order_id = %done.order.order_id,
                order_update_id = done.order.order_update_id,
                "movement completed"
            );
            on_completed(done.command);
            completed += 1;
        }
        completed
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    fn is_complete(&self, association: &OrderAssociation, state: &State) -> bool {
        let order = &association.order;

        let edges_done = order.base_edges().all(|edge| {
            !state
                .edge_states
                .iter()
                .any(|s| s.edge_id == edge.edge_id && s.sequence_id == edge.sequence_id)
        });
        if !edges_done {
            return false;
        }

        if self.mode == CompletionMode::EdgesAndNodes {
            let nodes_done = order.base_nodes().all(|node| {
                !state
                    .node_states
                    .iter()
                    .any(|s| s.node_id == node.node_id && s.sequence_id == node.sequence_id)
            });
            if !nodes_done {
                return false;
            }
        }

        if association.command.final_movement {
            return order.base_actions().all(|action| {
                state
                    .action_state(&action.action_id)
                    .is_none_or(|s| s.action_status.is_terminal())
            });
        }
        true
    }
}
