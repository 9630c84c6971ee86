//! Configuration for the planning core.
//!
//! Two layers: [`NavConfig`] is the serde-loadable file surface with the
//! externally fixed key names, [`PlannerConfig`] is the immutable-per-call
//! bundle of tunables and injected handles the executive hands to planners.

use crate::error::{NavError, Result};
use crate::map::{EmptyMap, Map};
use crate::obstacles::{DynamicObstaclesManager, IgnoreObstacles};
use crate::ribbon::HeuristicKind;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Which planner the executive runs each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WhichPlanner {
    PotentialField,
    #[default]
    AStar,
    BitStar,
}

/// File-level configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct NavConfig {
    /// Dubins radius for transit manoeuvres (meters)
    #[serde(default = "default_turning_radius")]
    pub turning_radius: f64,

    /// Dubins radius for coverage manoeuvres (meters)
    #[serde(default = "default_coverage_turning_radius")]
    pub coverage_turning_radius: f64,

    /// Commanded transit speed (m/s)
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,

    /// Commanded coverage speed (m/s)
    #[serde(default = "default_slow_speed")]
    pub slow_speed: f64,

    /// Full lateral coverage width of a ribbon (meters)
    #[serde(default = "default_line_width")]
    pub line_width: f64,

    /// Branching factor for the sampling planners
    #[serde(default = "default_branching_factor")]
    pub k: usize,

    /// Ribbon heuristic kind, 0..4
    #[serde(default)]
    pub heuristic: u8,

    /// Planner search horizon (seconds)
    #[serde(default = "default_time_horizon")]
    pub time_horizon: f64,

    /// Floor of the search horizon under repeated failure (seconds)
    #[serde(default = "default_time_minimum")]
    pub time_minimum: f64,

    /// Arc-length step for edge collision checks (meters)
    #[serde(default = "default_collision_checking_increment")]
    pub collision_checking_increment: f64,

    /// Seed count for sampling search
    #[serde(default = "default_initial_samples")]
    pub initial_samples: usize,

    /// Enable the alternative Dubins entry variant set
    #[serde(default)]
    pub use_brown_paths: bool,

    /// Score collisions against the Gaussian obstacle model
    #[serde(default)]
    pub use_gaussian_dynamic_obstacles: bool,

    /// Disable dynamic obstacle costing entirely
    #[serde(default)]
    pub ignore_dynamic_obstacles: bool,

    /// Planner selection
    #[serde(default)]
    pub which_planner: WhichPlanner,

    /// Replanning period presented downstream (seconds)
    #[serde(default = "default_planning_time")]
    pub planning_time: f64,
}

fn default_turning_radius() -> f64 {
    8.0
}
fn default_coverage_turning_radius() -> f64 {
    16.0
}
fn default_max_speed() -> f64 {
    2.5
}
fn default_slow_speed() -> f64 {
    1.0
}
fn default_line_width() -> f64 {
    2.0
}
fn default_branching_factor() -> usize {
    4
}
fn default_time_horizon() -> f64 {
    30.0
}
fn default_time_minimum() -> f64 {
    5.0
}
fn default_collision_checking_increment() -> f64 {
    0.5
}
fn default_initial_samples() -> usize {
    100
}
fn default_planning_time() -> f64 {
    1.0
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            turning_radius: default_turning_radius(),
            coverage_turning_radius: default_coverage_turning_radius(),
            max_speed: default_max_speed(),
            slow_speed: default_slow_speed(),
            line_width: default_line_width(),
            k: default_branching_factor(),
            heuristic: 0,
            time_horizon: default_time_horizon(),
            time_minimum: default_time_minimum(),
            collision_checking_increment: default_collision_checking_increment(),
            initial_samples: default_initial_samples(),
            use_brown_paths: false,
            use_gaussian_dynamic_obstacles: false,
            ignore_dynamic_obstacles: false,
            which_planner: WhichPlanner::default(),
            planning_time: default_planning_time(),
        }
    }
}

impl NavConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("failed to read config file: {}", e)))?;
        toml::from_str(&content).map_err(|e| NavError::Config(e.to_string()))
    }

    /// The heuristic kind named by the `heuristic` index, if valid.
    pub fn heuristic_kind(&self) -> Option<HeuristicKind> {
        HeuristicKind::from_index(self.heuristic)
    }
}

/// Immutable-per-call bundle of tunables and injected handles.
#[derive(Clone)]
pub struct PlannerConfig {
    pub turning_radius: f64,
    pub coverage_turning_radius: f64,
    pub max_speed: f64,
    pub slow_speed: f64,
    pub branching_factor: usize,
    pub time_horizon: f64,
    pub time_minimum: f64,
    pub collision_checking_increment: f64,
    pub initial_samples: usize,
    pub use_brown_paths: bool,
    map: Arc<dyn Map>,
    obstacles: Arc<dyn DynamicObstaclesManager>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::from_nav_config(&NavConfig::default())
    }
}

impl PlannerConfig {
    /// Build a runtime bundle from file-level settings, with an empty map
    /// and no obstacles until the executive injects them.
    pub fn from_nav_config(config: &NavConfig) -> Self {
        Self {
            turning_radius: config.turning_radius,
            coverage_turning_radius: config.coverage_turning_radius,
            max_speed: config.max_speed,
            slow_speed: config.slow_speed,
            branching_factor: config.k,
            time_horizon: config.time_horizon,
            time_minimum: config.time_minimum,
            collision_checking_increment: config.collision_checking_increment,
            initial_samples: config.initial_samples,
            use_brown_paths: config.use_brown_paths,
            map: Arc::new(EmptyMap),
            obstacles: Arc::new(IgnoreObstacles),
        }
    }

    #[inline]
    pub fn map(&self) -> &Arc<dyn Map> {
        &self.map
    }

    pub fn set_map(&mut self, map: Arc<dyn Map>) {
        self.map = map;
    }

    #[inline]
    pub fn obstacles(&self) -> &Arc<dyn DynamicObstaclesManager> {
        &self.obstacles
    }

    pub fn set_obstacles(&mut self, obstacles: Arc<dyn DynamicObstaclesManager>) {
        self.obstacles = obstacles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NavConfig::default();
        assert_eq!(config.which_planner, WhichPlanner::AStar);
        assert!(config.time_minimum < config.time_horizon);
        assert_eq!(config.heuristic_kind(), Some(HeuristicKind::TspPointRobotNoSplitAllRibbons));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            turning_radius = 10.0
            which_planner = "bit_star"
            heuristic = 2
            k = 7
        "#;
        let config: NavConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.turning_radius, 10.0);
        assert_eq!(config.which_planner, WhichPlanner::BitStar);
        assert_eq!(config.heuristic_kind(), Some(HeuristicKind::MaxDistance));
        assert_eq!(config.k, 7);
        // untouched keys keep their defaults
        assert_eq!(config.max_speed, 2.5);
    }

    #[test]
    fn test_bad_heuristic_index() {
        let config = NavConfig {
            heuristic: 9,
            ..Default::default()
        };
        assert!(config.heuristic_kind().is_none());
    }
}
