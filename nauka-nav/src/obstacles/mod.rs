//! Dynamic obstacle models.
//!
//! Other vessels are tracked either as binary footprints (oriented
//! rectangles projected through time) or as 2D Gaussian distributions.
//! Planners depend only on the [`DynamicObstaclesManager`] trait and call it
//! once per collision-checking step, so implementations keep the query cheap.

mod binary;
mod gaussian;

pub use binary::{BinaryDynamicObstaclesManager, BinaryObstacle, BLOCKED_COST};
pub use gaussian::{GaussianDynamicObstaclesManager, GaussianObstacle, GaussianObstacles};

use nauka_plan::State;

/// A projected obstacle outline used for steering repulsion.
#[derive(Debug, Clone, Copy)]
pub struct ObstacleFootprint {
    /// Footprint center
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub length: f64,
}

/// Collision-cost query against the tracked dynamic obstacles.
pub trait DynamicObstaclesManager: Send + Sync {
    /// A number weighted by increasing chance of collision at `(x, y)` at
    /// `time`. Not a probability. `strict` widens the obstacle footprint by
    /// a standoff margin.
    fn collision_exists(&self, x: f64, y: f64, time: f64, strict: bool) -> f64;

    /// Convenience overload reading position and time from a state.
    fn collision_at_state(&self, state: &State, strict: bool) -> f64 {
        self.collision_exists(state.x, state.y, state.time, strict)
    }

    /// Collision cost with track uncertainty grown by the time since the
    /// last observation. Models without an uncertainty term fall back to
    /// [`DynamicObstaclesManager::collision_exists`].
    fn collision_exists_grown(
        &self,
        x: f64,
        y: f64,
        time: f64,
        stdev_power: f64,
        stdev_factor: f64,
    ) -> f64 {
        let _ = (stdev_power, stdev_factor);
        self.collision_exists(x, y, time, false)
    }

    /// Projected obstacle footprints at `time`, for steering repulsion.
    fn footprints(&self, time: f64) -> Vec<ObstacleFootprint> {
        let _ = time;
        Vec::new()
    }
}

/// The null manager backing `ignore_dynamic_obstacles`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreObstacles;

impl DynamicObstaclesManager for IgnoreObstacles {
    fn collision_exists(&self, _x: f64, _y: f64, _time: f64, _strict: bool) -> f64 {
        0.0
    }
}
