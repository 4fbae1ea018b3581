//! Configuration vault – reads/writes `~/.vdalink/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use vdalink_mapping::{MapperConfig, ResolverConfig};
use vdalink_middleware::CompletionMode;
use vdalink_runtime::ControllerConfig;
use vdalink_types::{Properties, VehicleProfile};

/// Persisted adapter configuration for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_vehicle_name")]
    pub vehicle_name: String,

    /// Map id of points without a `vda5050:mapId` property.
    #[serde(default = "default_map_id")]
    pub default_map_id: String,

    /// Route steps previewed in each order's horizon.
    #[serde(default = "default_horizon_steps")]
    pub max_horizon_steps: usize,

    /// Widen the first node's deviation to the vehicle's precise position.
    #[serde(default = "default_true")]
    pub extended_deviation: bool,

    #[serde(default)]
    pub completion_mode: CompletionMode,

    /// Meters.
    #[serde(default = "default_deviation_xy")]
    pub position_deviation_xy: f64,

    /// Radians.
    #[serde(default = "default_deviation_theta")]
    pub position_deviation_theta: f64,

    /// Operation name that means "recharge here".
    #[serde(default = "default_recharge_operation")]
    pub recharge_operation: String,

    /// Capacity of the vehicle event bus.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// `vda5050:*` vehicle properties (supported actions, tags, deviation).
    #[serde(default)]
    pub vehicle_properties: Properties,
}

fn default_vehicle_name() -> String {
    "vehicle-01".to_string()
}
fn default_map_id() -> String {
    "default".to_string()
}
fn default_horizon_steps() -> usize {
    2
}
fn default_true() -> bool {
    true
}
fn default_deviation_xy() -> f64 {
    0.5
}
fn default_deviation_theta() -> f64 {
    0.1
}
fn default_recharge_operation() -> String {
    "CHARGE".to_string()
}
fn default_event_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vehicle_name: default_vehicle_name(),
            default_map_id: default_map_id(),
            max_horizon_steps: default_horizon_steps(),
            extended_deviation: default_true(),
            completion_mode: CompletionMode::default(),
            position_deviation_xy: default_deviation_xy(),
            position_deviation_theta: default_deviation_theta(),
            recharge_operation: default_recharge_operation(),
            event_capacity: default_event_capacity(),
            vehicle_properties: Properties::new(),
        }
    }
}

impl Config {
    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig {
            default_map_id: self.default_map_id.clone(),
            max_horizon_steps: self.max_horizon_steps,
            extended_deviation: self.extended_deviation,
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            deviation_xy: self.position_deviation_xy,
            deviation_theta: self.position_deviation_theta,
            default_map_id: self.default_map_id.clone(),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            mapper: self.mapper_config(),
            resolver: self.resolver_config(),
            completion_mode: self.completion_mode,
        }
    }

    pub fn vehicle_profile(&self) -> VehicleProfile {
        VehicleProfile {
            name: self.vehicle_name.clone(),
            properties: self.vehicle_properties.clone(),
            recharge_operation: self.recharge_operation.clone(),
            precise_position: None,
        }
    }
}

/// Return the path to `~/.vdalink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".vdalink").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `VDALINK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `VDALINK_VEHICLE_NAME` | `vehicle_name` |
/// | `VDALINK_MAP_ID` | `default_map_id` |
/// | `VDALINK_HORIZON_STEPS` | `max_horizon_steps` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("VDALINK_VEHICLE_NAME") {
        cfg.vehicle_name = v;
    }
    if let Ok(v) = std::env::var("VDALINK_MAP_ID") {
        cfg.default_map_id = v;
    }
    if let Ok(v) = std::env::var("VDALINK_HORIZON_STEPS")
        && let Ok(steps) = v.parse::<usize>()
    {
        cfg.max_horizon_steps = steps;
    }
}

/// Save the config to disk, creating `~/.vdalink/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
