//! [`ActionFilter`] – decides which declared actions end up in an order.
//!
//! Every registered [`ActionRule`] is evaluated in insertion order; a
//! candidate is kept only when all of them accept it.  Four rules are
//! provided:
//!
//! - [`CapabilityRule`] – the vehicle supports the action type.
//! - [`TagRule`] – the action carries one of the tags the vehicle accepts.
//! - [`ScopeRule`] – the action may be placed on a node (or an edge).
//! - [`TriggerRule`] – the action applies at this point of the order's
//!   lifecycle.

use std::collections::BTreeSet;

use tracing::debug;
use vdalink_types::{Action, VehicleProfile};

use crate::actions::{ActionScope, ActionTrigger, PropertyAction};
use crate::properties::{self, ACTION_TAGS, DEFAULT_TAG, SUPPORTED_ACTIONS};

/// Wildcard entry in the vehicle's supported-action list.
pub const ANY_ACTION: &str = "*";

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// One inclusion predicate for a candidate action.
pub trait ActionRule: Send + Sync {
    /// Name used in debug logs when the rule rejects an action.
    fn name(&self) -> &str;

    /// `true` when `action` may be placed at `scope`.
    fn accepts(&self, action: &PropertyAction, scope: ActionScope) -> bool;
}

// ────────────────────────────────────────────────────────────────────────────
// ActionFilter
// ────────────────────────────────────────────────────────────────────────────

/// Logical AND over a list of [`ActionRule`]s.
///
/// # Example
///
/// ```
/// use vdalink_mapping::action_filter::{ActionFilter, TriggerRule};
/// use vdalink_mapping::actions::{extract_actions, ActionIdCounter, ActionScope, ActionTrigger};
/// use vdalink_types::{Properties, VehicleProfile};
///
/// let mut props = Properties::new();
/// props.insert("vda5050:action.1".into(), "beep".into());
/// props.insert("vda5050:action.1.when".into(), "ORDER_END".into());
/// let candidates = extract_actions(&props, "P1", &mut ActionIdCounter::default());
///
/// let passing = ActionFilter::for_vehicle(&VehicleProfile::default())
///     .with_rule(TriggerRule::single(ActionTrigger::Passing));
/// assert!(passing.apply(&candidates, ActionScope::Node).is_empty());
///
/// let at_end = ActionFilter::for_vehicle(&VehicleProfile::default())
///     .with_rule(TriggerRule::single(ActionTrigger::OrderEnd));
/// assert_eq!(at_end.apply(&candidates, ActionScope::Node).len(), 1);
/// ```
#[derive(Default)]
pub struct ActionFilter {
    rules: Vec<Box<dyn ActionRule>>,
}

impl ActionFilter {
    /// Create a filter with no rules; it accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capability, tag and scope rules configured from the vehicle's
    /// properties.  Add a [`TriggerRule`] for the placement at hand.
    pub fn for_vehicle(vehicle: &VehicleProfile) -> Self {
        Self::new()
            .with_rule(CapabilityRule::from_vehicle(vehicle))
            .with_rule(TagRule::from_vehicle(vehicle))
            .with_rule(ScopeRule)
    }

    /// Register a rule.  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn ActionRule>) {
        self.rules.push(rule);
    }

    pub fn with_rule(mut self, rule: impl ActionRule + 'static) -> Self {
        self.add_rule(Box::new(rule));
        self
    }

    pub fn accepts(&self, action: &PropertyAction, scope: ActionScope) -> bool {
        for rule in &self.rules {
            if !rule.accepts(action, scope) {
                debug!(
                    rule = rule.name(),
                    action_type = %action.action_type,
                    action_id = %action.action_id,
                    "action filtered out"
                );
                return false;
            }
        }
        true
    }

    /// Keep the accepted candidates, converted to wire actions.
    pub fn apply(&self, candidates: &[PropertyAction], scope: ActionScope) -> Vec<Action> {
        candidates
            .iter()
            .filter(|a| self.accepts(a, scope))
            .map(PropertyAction::to_action)
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Accepts action types on the vehicle's allow-list.  An empty list or one
/// containing [`ANY_ACTION`] accepts every type.
pub struct CapabilityRule {
    pub supported: BTreeSet<String>,
}

impl CapabilityRule {
    pub fn from_vehicle(vehicle: &VehicleProfile) -> Self {
        Self {
            supported: properties::string_set(&vehicle.properties, SUPPORTED_ACTIONS),
        }
    }
}

impl ActionRule for CapabilityRule {
    fn name(&self) -> &str {
        "capability"
    }

    fn accepts(&self, action: &PropertyAction, _scope: ActionScope) -> bool {
        self.supported.is_empty()
            || self.supported.contains(ANY_ACTION)
            || self.supported.contains(&action.action_type)
    }
}

/// Accepts actions sharing at least one tag with the vehicle.
pub struct TagRule {
    pub accepted: BTreeSet<String>,
}

impl TagRule {
    /// Tags from `vda5050:actionTags`, or `{"default"}` when unset.
    pub fn from_vehicle(vehicle: &VehicleProfile) -> Self {
        let mut accepted = properties::string_set(&vehicle.properties, ACTION_TAGS);
        if accepted.is_empty() {
            accepted.insert(DEFAULT_TAG.to_string());
        }
        Self { accepted }
    }
}

impl ActionRule for TagRule {
    fn name(&self) -> &str {
        "tag"
    }

    fn accepts(&self, action: &PropertyAction, _scope: ActionScope) -> bool {
        !action.tags.is_disjoint(&self.accepted)
    }
}

/// Accepts actions whose scope covers the placement.
pub struct ScopeRule;

impl ActionRule for ScopeRule {
    fn name(&self) -> &str {
        "scope"
    }

    fn accepts(&self, action: &PropertyAction, scope: ActionScope) -> bool {
        action.scopes.contains(&scope)
    }
}

/// Accepts actions whose triggers intersect the required set.
pub struct TriggerRule {
    pub required: BTreeSet<ActionTrigger>,
}

impl TriggerRule {
    pub fn single(trigger: ActionTrigger) -> Self {
        Self {
            required: [trigger].into_iter().collect(),
        }
    }
}

impl ActionRule for TriggerRule {
    fn name(&self) -> &str {
        "trigger"
    }

    fn accepts(&self, action: &PropertyAction, _scope: ActionScope) -> bool {
        !action.triggers.is_disjoint(&self.required)
    }
}
