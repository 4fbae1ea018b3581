//! Custom-action extraction from property maps.
//!
//! A plant-model object declares actions through keys of the form
//! `vda5050:action.<idx>[.<suffix>]`, where `<idx>` is a free-form index
//! token:
//!
//! | Key | Meaning |
//! |---|---|
//! | `vda5050:action.<idx>` | action type (required) |
//! | `….blockingType` | `NONE` / `SOFT` / `HARD`, default `NONE` |
//! | `….parameter.<name>` | parameter value, optionally typed (`float:`, `integer:`, `boolean:`, `string:`) |
//! | `….when` | `|`-separated lifecycle triggers, default all |
//! | `….tags` | `|`-separated tags, default `default` |
//! | `….scope` | `|`-separated `NODE` / `EDGE`, default both |
//!
//! Declarations are returned in lexicographic order of their index token.
//! Malformed entries never abort extraction: the offending value falls back
//! to a safe default, or the single declaration is dropped when it has no
//! action type.
//!
//! # Example
//!
//! ```
//! use vdalink_mapping::actions::{extract_actions, ActionIdCounter, ActionTrigger};
//! use vdalink_types::{BlockingType, Properties};
//!
//! let mut props = Properties::new();
//! props.insert("vda5050:action.01".into(), "beep".into());
//! props.insert("vda5050:action.01.blockingType".into(), "SOFT".into());
//! props.insert("vda5050:action.01.parameter.volume".into(), "integer:7".into());
//! props.insert("vda5050:action.01.when".into(), "PASSING".into());
//!
//! let mut ids = ActionIdCounter::default();
//! let actions = extract_actions(&props, "P1", &mut ids);
//!
//! assert_eq!(actions.len(), 1);
//! assert_eq!(actions[0].action_id, "P1_action_0");
//! assert_eq!(actions[0].blocking_type, BlockingType::Soft);
//! assert!(actions[0].triggers.contains(&ActionTrigger::Passing));
//! assert!(!actions[0].triggers.contains(&ActionTrigger::OrderEnd));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};
use vdalink_types::protocol::ParseVariantError;
use vdalink_types::{
    Action, ActionParameter, BlockingType, LocationType, MovementCommand, Properties,
    VehicleProfile,
};

use crate::properties::{self, ACTION_PREFIX, DEFAULT_TAG, DESTINATION_ACTION_PREFIX};

/// Action type used for the vehicle's recharge operation unless overridden.
pub const RECHARGE_ACTION_TYPE: &str = "startCharging";

// ────────────────────────────────────────────────────────────────────────────
// Triggers & scopes
// ────────────────────────────────────────────────────────────────────────────

/// Point in an order's lifecycle at which an action applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionTrigger {
    /// First node of a freshly started order.
    OrderStart,
    /// Every node the vehicle passes on its way.
    Passing,
    /// Final node of the route.
    OrderEnd,
}

impl ActionTrigger {
    pub const ALL: [ActionTrigger; 3] = [
        ActionTrigger::OrderStart,
        ActionTrigger::Passing,
        ActionTrigger::OrderEnd,
    ];

    pub fn all() -> BTreeSet<ActionTrigger> {
        Self::ALL.into_iter().collect()
    }
}

impl FromStr for ActionTrigger {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ORDER_START" => Ok(ActionTrigger::OrderStart),
            "PASSING" => Ok(ActionTrigger::Passing),
            "ORDER_END" => Ok(ActionTrigger::OrderEnd),
            _ => Err(ParseVariantError {
                kind: "action trigger",
                value: s.to_string(),
            }),
        }
    }
}

/// Where in an order an action may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionScope {
    Node,
    Edge,
}

impl ActionScope {
    pub fn all() -> BTreeSet<ActionScope> {
        [ActionScope::Node, ActionScope::Edge].into_iter().collect()
    }
}

impl FromStr for ActionScope {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NODE" => Ok(ActionScope::Node),
            "EDGE" => Ok(ActionScope::Edge),
            _ => Err(ParseVariantError {
                kind: "action scope",
                value: s.to_string(),
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PropertyAction
// ────────────────────────────────────────────────────────────────────────────

/// An action declared in a property map, before vehicle-specific filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAction {
    pub action_type: String,
    pub action_id: String,
    pub blocking_type: BlockingType,
    pub parameters: Vec<ActionParameter>,
    pub triggers: BTreeSet<ActionTrigger>,
    pub tags: BTreeSet<String>,
    pub scopes: BTreeSet<ActionScope>,
}

impl PropertyAction {
    /// Convert into the wire representation.
    pub fn to_action(&self) -> Action {
        Action {
            action_type: self.action_type.clone(),
            action_id: self.action_id.clone(),
            action_description: None,
            blocking_type: self.blocking_type,
            action_parameters: self.parameters.clone(),
        }
    }
}

/// Hands out action ids of the form `<origin>_action_<n>`.
///
/// The counter is owned by whoever maps orders and threaded through every
/// extraction call, so ids stay unique across all orders it produces.
#[derive(Debug, Clone, Default)]
pub struct ActionIdCounter {
    next: u64,
}

impl ActionIdCounter {
    pub fn next_id(&mut self, origin: &str) -> String {
        let id = format!("{origin}_action_{}", self.next);
        self.next += 1;
        id
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct RawDeclaration<'a> {
    action_type: Option<&'a str>,
    blocking_type: Option<&'a str>,
    parameters: Vec<(&'a str, &'a str)>,
    when: Option<&'a str>,
    tags: Option<&'a str>,
    scope: Option<&'a str>,
}

/// Extract every custom action declared in `properties`.
///
/// `origin` names the object the map belongs to and prefixes the generated
/// action ids.
pub fn extract_actions(
    properties: &Properties,
    origin: &str,
    ids: &mut ActionIdCounter,
) -> Vec<PropertyAction> {
    let mut declarations: BTreeMap<&str, RawDeclaration<'_>> = BTreeMap::new();

    for (key, value) in properties {
        let Some(rest) = key.strip_prefix(ACTION_PREFIX) else {
            continue;
        };
        let (index, suffix) = match rest.split_once('.') {
            Some((index, suffix)) => (index, Some(suffix)),
            None => (rest, None),
        };
        if index.is_empty() {
            warn!(origin, key = %key, "ignoring action property without index");
            continue;
        }
        let decl = declarations.entry(index).or_default();
        match suffix {
            None => decl.action_type = Some(value.as_str()),
            Some("blockingType") => decl.blocking_type = Some(value.as_str()),
            Some("when") => decl.when = Some(value.as_str()),
            Some("tags") => decl.tags = Some(value.as_str()),
            Some("scope") => decl.scope = Some(value.as_str()),
            Some(other) => match other.strip_prefix("parameter.") {
                Some(name) if !name.is_empty() => decl.parameters.push((name, value.as_str())),
                _ => debug!(origin, key = %key, "ignoring unknown action property"),
            },
        }
    }

    let mut actions = Vec::new();
    for (index, decl) in declarations {
        let Some(action_type) = decl.action_type.map(str::trim).filter(|t| !t.is_empty()) else {
            warn!(origin, index, "dropping action declaration without action type");
            continue;
        };
        actions.push(PropertyAction {
            action_type: action_type.to_string(),
            action_id: ids.next_id(origin),
            blocking_type: parse_blocking_type(decl.blocking_type, BlockingType::None, origin),
            parameters: decl
                .parameters
                .iter()
                .map(|(name, raw)| ActionParameter::new(*name, parse_parameter_value(raw)))
                .collect(),
            triggers: parse_triggers(decl.when, origin),
            tags: parse_tags(decl.tags),
            scopes: parse_scopes(decl.scope, origin),
        });
    }
    actions
}

/// Decode a typed parameter value.
///
/// `float:`, `integer:` and `boolean:` values that fail to parse degrade to
/// `null`; `string:` and unprefixed values are kept verbatim.
pub fn parse_parameter_value(raw: &str) -> Value {
    if let Some(v) = raw.strip_prefix("float:") {
        match v.trim().parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            Some(n) => Value::Number(n),
            None => degrade(raw),
        }
    } else if let Some(v) = raw.strip_prefix("integer:") {
        match v.trim().parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => degrade(raw),
        }
    } else if let Some(v) = raw.strip_prefix("boolean:") {
        match v.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => degrade(raw),
        }
    } else if let Some(v) = raw.strip_prefix("string:") {
        Value::String(v.to_string())
    } else {
        Value::String(raw.to_string())
    }
}

fn degrade(raw: &str) -> Value {
    warn!(value = raw, "action parameter value does not match its type; using null");
    Value::Null
}

fn parse_blocking_type(raw: Option<&str>, default: BlockingType, origin: &str) -> BlockingType {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!(origin, error = %e, "falling back to blocking type NONE");
            BlockingType::None
        }),
    }
}

fn parse_triggers(raw: Option<&str>, origin: &str) -> BTreeSet<ActionTrigger> {
    let Some(raw) = raw else {
        return ActionTrigger::all();
    };
    let tokens = properties::split_list(raw);
    if tokens.is_empty() {
        return ActionTrigger::all();
    }
    let parsed: Result<BTreeSet<_>, _> = tokens.iter().map(|t| t.parse::<ActionTrigger>()).collect();
    parsed.unwrap_or_else(|e| {
        warn!(origin, error = %e, "falling back to all action triggers");
        ActionTrigger::all()
    })
}

fn parse_tags(raw: Option<&str>) -> BTreeSet<String> {
    let tags: BTreeSet<String> = raw
        .map(|raw| properties::split_list(raw).into_iter().map(str::to_string).collect())
        .unwrap_or_default();
    if tags.is_empty() {
        [DEFAULT_TAG.to_string()].into_iter().collect()
    } else {
        tags
    }
}

fn parse_scopes(raw: Option<&str>, origin: &str) -> BTreeSet<ActionScope> {
    let Some(raw) = raw else {
        return ActionScope::all();
    };
    let parsed: Result<BTreeSet<_>, _> = properties::split_list(raw)
        .iter()
        .map(|t| t.parse::<ActionScope>())
        .collect();
    match parsed {
        Ok(scopes) if !scopes.is_empty() => scopes,
        Ok(_) => ActionScope::all(),
        Err(e) => {
            warn!(origin, error = %e, "falling back to node and edge scope");
            ActionScope::all()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Destination actions
// ────────────────────────────────────────────────────────────────────────────

/// Resolve the action performing `command`'s operation at its destination.
///
/// Keys under `vda5050:destinationAction.<operation>.` are merged per key
/// from the location type, then the location, then the command itself, each
/// later source overriding the earlier ones.  Without an explicit
/// `actionType` the operation name is used, or [`RECHARGE_ACTION_TYPE`] for
/// the vehicle's recharge operation.
///
/// Returns `None` when the command carries no operation.
pub fn destination_action(
    command: &MovementCommand,
    location_type: Option<&LocationType>,
    vehicle: &VehicleProfile,
    ids: &mut ActionIdCounter,
) -> Option<PropertyAction> {
    if !command.has_operation() {
        return None;
    }
    let prefix = format!("{DESTINATION_ACTION_PREFIX}{}.", command.operation);

    let mut merged: BTreeMap<&str, &str> = BTreeMap::new();
    let sources = [
        location_type.map(|t| &t.properties),
        command.op_location.as_ref().map(|l| &l.properties),
        Some(&command.properties),
    ];
    for props in sources.into_iter().flatten() {
        for (key, value) in props {
            if let Some(suffix) = key.strip_prefix(prefix.as_str()) {
                merged.insert(suffix, value.as_str());
            }
        }
    }

    let is_recharge =
        !vehicle.recharge_operation.is_empty() && command.operation == vehicle.recharge_operation;
    let action_type = merged
        .get("actionType")
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if is_recharge {
                RECHARGE_ACTION_TYPE.to_string()
            } else {
                command.operation.clone()
            }
        });

    let origin = command
        .op_location
        .as_ref()
        .map(|l| l.name.as_str())
        .unwrap_or(command.step.destination_point.name.as_str());

    let parameters = merged
        .iter()
        .filter_map(|(suffix, raw)| {
            suffix
                .strip_prefix("parameter.")
                .filter(|name| !name.is_empty())
                .map(|name| ActionParameter::new(name, parse_parameter_value(raw)))
        })
        .collect();

    Some(PropertyAction {
        action_type,
        action_id: ids.next_id(origin),
        blocking_type: parse_blocking_type(merged.get("blockingType").copied(), BlockingType::Hard, origin),
        parameters,
        triggers: [ActionTrigger::OrderEnd].into_iter().collect(),
        tags: parse_tags(merged.get("tags").copied()),
        scopes: [ActionScope::Node].into_iter().collect(),
    })
}
