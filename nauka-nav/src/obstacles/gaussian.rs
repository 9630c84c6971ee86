//! Gaussian dynamic obstacles.
//!
//! Each tracked vessel is a 2D Gaussian translated through time at the
//! vessel's reported velocity. The summed, intensity-weighted densities give
//! a collision cost, not a probability.

use super::{DynamicObstaclesManager, ObstacleFootprint};
use nalgebra::{Matrix2, Vector2};
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI};

/// Deep-copied snapshot of the tracked obstacles, keyed by MMSI.
pub type GaussianObstacles = HashMap<u32, GaussianObstacle>;

/// One tracked vessel as a Gaussian distribution.
#[derive(Debug, Clone)]
pub struct GaussianObstacle {
    pub x: f64,
    pub y: f64,
    /// Mathematical yaw (π/2 − compass heading)
    pub yaw: f64,
    pub speed: f64,
    /// Time of the last track update
    pub time: f64,
    pub mean: Vector2<f64>,
    pub covariance: Matrix2<f64>,
    /// Weight of this obstacle's density in the summed cost
    pub intensity: f64,
}

impl GaussianObstacle {
    /// Default position covariance for a fresh track.
    pub fn default_covariance() -> Matrix2<f64> {
        Matrix2::new(30.0, 10.0, 10.0, 30.0)
    }

    pub fn new(x: f64, y: f64, heading: f64, speed: f64, time: f64) -> Self {
        Self::with_covariance(x, y, heading, speed, time, Self::default_covariance())
    }

    pub fn with_covariance(
        x: f64,
        y: f64,
        heading: f64,
        speed: f64,
        time: f64,
        covariance: Matrix2<f64>,
    ) -> Self {
        Self {
            x,
            y,
            yaw: FRAC_PI_2 - heading,
            speed,
            time,
            mean: Vector2::new(x, y),
            covariance,
            intensity: 1.0,
        }
    }

    /// Translate the mean to `desired_time` under constant velocity.
    /// The covariance is unchanged.
    pub fn project(&mut self, desired_time: f64) {
        let dt = desired_time - self.time;
        self.x += self.speed * dt * self.yaw.cos();
        self.y += self.speed * dt * self.yaw.sin();
        self.mean = Vector2::new(self.x, self.y);
        self.time = desired_time;
    }

    /// Copy projected to `desired_time`.
    pub fn projected(&self, desired_time: f64) -> Self {
        let mut copy = self.clone();
        copy.project(desired_time);
        copy
    }

    /// Density of the distribution at `point`.
    pub fn pdf(&self, point: &Vector2<f64>) -> f64 {
        Self::density(point, &self.mean, &self.covariance)
    }

    /// Density at `point` after projecting the mean to `time` and growing
    /// the covariance diagonal by `(|Δt|·stdev_factor)^stdev_power`.
    ///
    /// Used by BIT* edge costing: tracks far from their observation time
    /// spread out instead of pinning cost to a stale point estimate.
    pub fn pdf_projected_grown(
        &self,
        point: &Vector2<f64>,
        time: f64,
        stdev_power: f64,
        stdev_factor: f64,
    ) -> f64 {
        let dt = time - self.time;
        let mean = Vector2::new(
            self.x + self.speed * dt * self.yaw.cos(),
            self.y + self.speed * dt * self.yaw.sin(),
        );
        let growth = (dt.abs() * stdev_factor).powf(stdev_power);
        let covariance = self.covariance + Matrix2::identity() * growth;
        Self::density(point, &mean, &covariance)
    }

    fn density(point: &Vector2<f64>, mean: &Vector2<f64>, covariance: &Matrix2<f64>) -> f64 {
        let Some(inverse) = covariance.try_inverse() else {
            return 0.0;
        };
        let diff = point - mean;
        let quadform = (diff.transpose() * inverse * diff)[(0, 0)];
        let norm = 1.0 / (2.0 * PI * covariance.determinant().sqrt());
        norm * (-0.5 * quadform).exp()
    }
}

/// Tracks Gaussian obstacles keyed by MMSI.
#[derive(Debug, Clone, Default)]
pub struct GaussianDynamicObstaclesManager {
    obstacles: GaussianObstacles,
}

impl GaussianDynamicObstaclesManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a track with the default covariance.
    pub fn update(&mut self, mmsi: u32, x: f64, y: f64, heading: f64, speed: f64, time: f64) {
        self.obstacles
            .insert(mmsi, GaussianObstacle::new(x, y, heading, speed, time));
    }

    /// Insert or refresh a track with an explicit covariance.
    #[allow(clippy::too_many_arguments)]
    pub fn update_with_covariance(
        &mut self,
        mmsi: u32,
        x: f64,
        y: f64,
        heading: f64,
        speed: f64,
        time: f64,
        covariance: Matrix2<f64>,
    ) {
        self.obstacles.insert(
            mmsi,
            GaussianObstacle::with_covariance(x, y, heading, speed, time, covariance),
        );
    }

    /// Drop a track.
    pub fn forget(&mut self, mmsi: u32) {
        self.obstacles.remove(&mmsi);
    }

    pub fn get(&self) -> &GaussianObstacles {
        &self.obstacles
    }

    /// Deep copy of the tracked obstacles.
    pub fn deep_copy(&self) -> GaussianObstacles {
        self.obstacles.clone()
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }
}

impl DynamicObstaclesManager for GaussianDynamicObstaclesManager {
    fn collision_exists(&self, x: f64, y: f64, time: f64, _strict: bool) -> f64 {
        let point = Vector2::new(x, y);
        self.obstacles
            .values()
            .map(|o| o.intensity * o.projected(time).pdf(&point))
            .sum()
    }

    fn collision_exists_grown(
        &self,
        x: f64,
        y: f64,
        time: f64,
        stdev_power: f64,
        stdev_factor: f64,
    ) -> f64 {
        let point = Vector2::new(x, y);
        self.obstacles
            .values()
            .map(|o| o.intensity * o.pdf_projected_grown(&point, time, stdev_power, stdev_factor))
            .sum()
    }

    /// A track's steering footprint is its 2-sigma extent per axis.
    fn footprints(&self, time: f64) -> Vec<ObstacleFootprint> {
        self.obstacles
            .values()
            .map(|o| {
                let projected = o.projected(time);
                ObstacleFootprint {
                    x: projected.x,
                    y: projected.y,
                    width: 2.0 * projected.covariance[(0, 0)].sqrt(),
                    length: 2.0 * projected.covariance[(1, 1)].sqrt(),
                }
            })
            .collect()
    }
}
