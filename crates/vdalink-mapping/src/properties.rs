//! `vda5050:*` property keys and typed readers.
//!
//! Plant-model objects carry free-form string properties.  The keys below
//! configure how the objects are mapped onto protocol messages.  Readers
//! never fail: a value that does not parse is logged and treated as absent.
//!
//! | Key | Object | Meaning |
//! |---|---|---|
//! | `vda5050:action.<idx>[.<suffix>]` | point, path, location, order | custom actions, see [`crate::actions`] |
//! | `vda5050:destinationAction.<op>.<suffix>` | location type, location, order | action performed for operation `<op>` |
//! | `vda5050:deviationXY` | point, vehicle | allowed XY deviation (m) |
//! | `vda5050:deviationTheta` | point, vehicle | allowed theta deviation (degrees) |
//! | `vda5050:mapId` | point | map the point lies on |
//! | `vda5050:orientationForward` / `…Reverse` | path | vehicle orientation on the edge (degrees) |
//! | `vda5050:rotationAllowedForward` / `…Reverse` | path | whether rotation is allowed on the edge |
//! | `vda5050:supportedActions` | vehicle | `|`-separated action types; empty or `*` allows all |
//! | `vda5050:actionTags` | vehicle | `|`-separated tags the vehicle accepts |

use std::collections::BTreeSet;
use std::str::FromStr;

use tracing::warn;
use vdalink_types::{Point, Properties};

pub const ACTION_PREFIX: &str = "vda5050:action.";
pub const DESTINATION_ACTION_PREFIX: &str = "vda5050:destinationAction.";
pub const DEVIATION_XY: &str = "vda5050:deviationXY";
pub const DEVIATION_THETA: &str = "vda5050:deviationTheta";
pub const MAP_ID: &str = "vda5050:mapId";
pub const ORIENTATION_FORWARD: &str = "vda5050:orientationForward";
pub const ORIENTATION_REVERSE: &str = "vda5050:orientationReverse";
pub const ROTATION_ALLOWED_FORWARD: &str = "vda5050:rotationAllowedForward";
pub const ROTATION_ALLOWED_REVERSE: &str = "vda5050:rotationAllowedReverse";
pub const SUPPORTED_ACTIONS: &str = "vda5050:supportedActions";
pub const ACTION_TAGS: &str = "vda5050:actionTags";

/// Separator for list-valued properties.
pub const LIST_SEPARATOR: char = '|';

/// Tag assigned to actions that do not declare any.
pub const DEFAULT_TAG: &str = "default";

/// Read and parse `key`, logging and discarding values that do not parse.
pub fn parse_property<T: FromStr>(properties: &Properties, key: &str) -> Option<T> {
    let raw = properties.get(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable property value");
            None
        }
    }
}

/// Split a `|`-separated list, trimming entries and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<&str> {
    raw.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Read a `|`-separated set property.  Absent keys yield an empty set.
pub fn string_set(properties: &Properties, key: &str) -> BTreeSet<String> {
    properties
        .get(key)
        .map(|raw| split_list(raw).into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

/// The map a point lies on: its own `vda5050:mapId` property, else
/// `default_map_id`.
pub fn point_map_id<'a>(point: &'a Point, default_map_id: &'a str) -> &'a str {
    point
        .properties
        .get(MAP_ID)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(default_map_id)
}
