//! Configuration Vault – reads/writes `~/.skyway/config.toml` and loads
//! city files.

use serde::{Deserialize, Serialize};
use skyway_geometry::{DetectorConfig, StaticCity};
use skyway_planner::PathfinderConfig;
use skyway_runtime::TrafficLoopConfig;
use skyway_types::{BuildingVolume, MapBounds, SkywayError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persisted user configuration stored in `~/.skyway/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Real-time tick period used by `/run`.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Proximity scan frequency, in ticks.
    #[serde(default = "default_scan_every_n_ticks")]
    pub scan_every_n_ticks: u64,

    /// Horizontal clearance kept around buildings.
    #[serde(default = "default_collision_radius")]
    pub collision_radius: f64,

    #[serde(default = "default_warning_distance")]
    pub warning_distance: f64,

    #[serde(default = "default_critical_distance")]
    pub critical_distance: f64,

    /// Node expansions allowed per route search.
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,

    /// Wall-clock limit per route search.
    #[serde(default = "default_planner_deadline_ms")]
    pub planner_deadline_ms: u64,

    /// Drop contacts silent for this long; `0` disables expiry.
    #[serde(default)]
    pub contact_ttl_secs: u64,

    /// TOML city file (`[bounds]` + `[[buildings]]`).  The built-in demo
    /// city is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_file: Option<String>,
}

fn default_tick_interval_ms() -> u64 {
    100
}
fn default_scan_every_n_ticks() -> u64 {
    5
}
fn default_collision_radius() -> f64 {
    5.0
}
fn default_warning_distance() -> f64 {
    100.0
}
fn default_critical_distance() -> f64 {
    50.0
}
fn default_max_expansions() -> usize {
    5_000
}
fn default_planner_deadline_ms() -> u64 {
    2_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            scan_every_n_ticks: default_scan_every_n_ticks(),
            collision_radius: default_collision_radius(),
            warning_distance: default_warning_distance(),
            critical_distance: default_critical_distance(),
            max_expansions: default_max_expansions(),
            planner_deadline_ms: default_planner_deadline_ms(),
            contact_ttl_secs: 0,
            city_file: None,
        }
    }
}

impl Config {
    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            collision_radius: self.collision_radius,
            ..DetectorConfig::default()
        }
    }

    pub fn pathfinder_config(&self) -> PathfinderConfig {
        PathfinderConfig {
            max_expansions: self.max_expansions,
            deadline: Some(self.planner_deadline()),
            ..PathfinderConfig::default()
        }
    }

    pub fn traffic_config(&self) -> TrafficLoopConfig {
        TrafficLoopConfig {
            scan_every_n_ticks: self.scan_every_n_ticks,
            contact_ttl: (self.contact_ttl_secs > 0)
                .then(|| Duration::from_secs(self.contact_ttl_secs)),
            warning_distance: self.warning_distance,
            critical_distance: self.critical_distance,
        }
    }

    pub fn planner_deadline(&self) -> Duration {
        Duration::from_millis(self.planner_deadline_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// Return the path to `~/.skyway/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".skyway").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, SkywayError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, SkywayError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        SkywayError::Config(format!("Failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| SkywayError::Config(format!("Failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SKYWAY_*` environment variable overrides to `cfg`.  Values that
/// do not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `SKYWAY_TICK_INTERVAL_MS` | `tick_interval_ms` |
/// | `SKYWAY_SCAN_EVERY` | `scan_every_n_ticks` |
/// | `SKYWAY_COLLISION_RADIUS` | `collision_radius` |
/// | `SKYWAY_MAX_EXPANSIONS` | `max_expansions` |
/// | `SKYWAY_PLANNER_DEADLINE_MS` | `planner_deadline_ms` |
/// | `SKYWAY_CONTACT_TTL_SECS` | `contact_ttl_secs` |
/// | `SKYWAY_CITY_FILE` | `city_file` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`, which maps a `SKYWAY_*` name to
/// its value.
pub(crate) fn apply_overrides<F>(cfg: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let parsed = |name: &str| lookup(name).map(|v| v.trim().to_string());
    let parsed_u64 = |name: &str| parsed(name).and_then(|v| v.parse::<u64>().ok());

    if let Some(v) = parsed_u64("SKYWAY_TICK_INTERVAL_MS") {
        cfg.tick_interval_ms = v;
    }
    if let Some(v) = parsed_u64("SKYWAY_SCAN_EVERY") {
        cfg.scan_every_n_ticks = v;
    }
    if let Some(v) = parsed("SKYWAY_COLLISION_RADIUS").and_then(|v| v.parse::<f64>().ok())
        && v >= 0.0
    {
        cfg.collision_radius = v;
    }
    if let Some(v) = parsed("SKYWAY_MAX_EXPANSIONS").and_then(|v| v.parse::<usize>().ok()) {
        cfg.max_expansions = v;
    }
    if let Some(v) = parsed_u64("SKYWAY_PLANNER_DEADLINE_MS") {
        cfg.planner_deadline_ms = v;
    }
    if let Some(v) = parsed_u64("SKYWAY_CONTACT_TTL_SECS") {
        cfg.contact_ttl_secs = v;
    }
    if let Some(v) = lookup("SKYWAY_CITY_FILE")
        && !v.trim().is_empty()
    {
        cfg.city_file = Some(v);
    }
}

/// Save the config to disk, creating `~/.skyway/` if necessary.
pub fn save(cfg: &Config) -> Result<(), SkywayError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), SkywayError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            SkywayError::Config(format!("Failed to create config directory: {e}"))
        })?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                SkywayError::Config(format!("Failed to set config directory permissions: {e}"))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| SkywayError::Serialization(format!("Failed to serialize config: {e}")))?;
    let write_err =
        |e: std::io::Error| SkywayError::Config(format!("Failed to write config at {}: {e}", path.display()));
    // Owner-only file (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// City files
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a TOML city file.
pub fn load_city(path: &Path) -> Result<StaticCity, SkywayError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        SkywayError::Config(format!("Failed to read city file {}: {e}", path.display()))
    })?;
    toml::from_str(&raw).map_err(|e| {
        SkywayError::Config(format!("Failed to parse city file {}: {e}", path.display()))
    })
}

/// Small built-in city: a 2 km square with a few blocks of towers.
pub fn demo_city() -> StaticCity {
    StaticCity::new(
        MapBounds::new(0.0, 0.0, 2000.0, 2000.0),
        vec![
            BuildingVolume::new(300.0, 300.0, 120.0, 80.0, 180.0),
            BuildingVolume::new(600.0, 200.0, 60.0, 400.0, 450.0),
            BuildingVolume::new(900.0, 900.0, 200.0, 200.0, 90.0),
            BuildingVolume::new(1300.0, 500.0, 80.0, 80.0, 260.0),
            BuildingVolume::new(1200.0, 1400.0, 300.0, 40.0, 500.0),
            BuildingVolume::new(400.0, 1500.0, 150.0, 150.0, 60.0),
        ],
    )
}
