//! Reactive potential-field planner.
//!
//! A short-horizon fallback: sums attractive forces toward uncovered ribbon
//! endpoints and repulsive forces from static and dynamic obstacles, then
//! integrates ten lookahead steps of Dubins motion along the net force
//! direction. Cheap, myopic, and immune to search-budget exhaustion.

use super::search::evaluate_edge;
use super::{Planner, Stats};
use crate::config::PlannerConfig;
use crate::error::Result;
use crate::ribbon::RibbonManager;
use nauka_plan::{DubinsPlan, DubinsSegment, State};

/// Lookahead steps integrated per call.
const LOOKAHEAD_STEPS: usize = 10;

/// Duration of one lookahead step, seconds.
const STEP_DURATION: f64 = 1.0;

/// Static obstacles beyond this distance contribute no force, meters.
const STATIC_OBSTACLE_IGNORE_THRESHOLD: f64 = 7.5;

/// Cell spacing of the static-obstacle scan, meters.
const STATIC_SCAN_STEP: f64 = 1.5;

/// Net forces weaker than this produce no plan.
const FORCE_FLOOR: f64 = 1e-3;

/// A force in the plane, accumulated from magnitude/direction pairs.
/// Directions are mathematical yaw.
#[derive(Debug, Clone, Copy, Default)]
struct Force {
    x: f64,
    y: f64,
}

impl Force {
    fn from_polar(magnitude: f64, direction: f64) -> Self {
        Self {
            x: magnitude * direction.cos(),
            y: magnitude * direction.sin(),
        }
    }

    fn add(&mut self, other: Force) {
        self.x += other.x;
        self.y += other.y;
    }

    fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Radians north of east.
    fn direction(&self) -> f64 {
        self.y.atan2(self.x)
    }
}

fn ribbon_magnitude(distance: f64) -> f64 {
    // avoid dividing by zero with a max value
    if distance <= 0.5 {
        return 20.0;
    }
    10.0 / distance
}

fn static_obstacle_magnitude(distance: f64) -> f64 {
    if distance > STATIC_OBSTACLE_IGNORE_THRESHOLD {
        return 0.0;
    }
    (-distance / 15.0).exp()
}

fn dynamic_obstacle_magnitude(distance: f64, width: f64, length: f64) -> f64 {
    // right on top of it: overwhelming repulsion
    if distance <= 0.0 {
        return 1000.0;
    }
    // scale magnitude by obstacle area
    (-distance / 13.0).exp() * width * length / 10.0
}

/// Short-horizon reactive planner.
#[derive(Debug, Default)]
pub struct PotentialFieldPlanner;

impl PotentialFieldPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Net force on the vehicle at `state`.
    fn net_force(state: &State, ribbons: &RibbonManager, config: &PlannerConfig) -> Force {
        let mut force = Force::default();

        // attraction toward every uncovered ribbon endpoint
        for span in ribbons.uncovered_spans() {
            for (x, y) in [(span.ax, span.ay), (span.bx, span.by)] {
                let distance = state.distance_to_point(x, y);
                let direction = (y - state.y).atan2(x - state.x);
                force.add(Force::from_polar(ribbon_magnitude(distance), direction));
            }
        }

        // repulsion from nearby blocked cells
        let n = (STATIC_OBSTACLE_IGNORE_THRESHOLD / STATIC_SCAN_STEP).ceil() as i32;
        for i in -n..=n {
            for j in -n..=n {
                let cx = state.x + i as f64 * STATIC_SCAN_STEP;
                let cy = state.y + j as f64 * STATIC_SCAN_STEP;
                if !config.map().is_blocked(cx, cy) {
                    continue;
                }
                let distance = state.distance_to_point(cx, cy);
                let magnitude = static_obstacle_magnitude(distance);
                if magnitude > 0.0 {
                    let direction = (state.y - cy).atan2(state.x - cx);
                    force.add(Force::from_polar(magnitude, direction));
                }
            }
        }

        // repulsion from the active obstacle model's projected footprints
        for footprint in config.obstacles().footprints(state.time) {
            let distance = state.distance_to_point(footprint.x, footprint.y);
            let magnitude =
                dynamic_obstacle_magnitude(distance, footprint.width, footprint.length);
            let direction = (state.y - footprint.y).atan2(state.x - footprint.x);
            force.add(Force::from_polar(magnitude, direction));
        }

        force
    }
}

impl Planner for PotentialFieldPlanner {
    fn plan(
        &mut self,
        ribbons: RibbonManager,
        start: &State,
        config: &PlannerConfig,
        _previous: DubinsPlan,
        time_remaining: f64,
    ) -> Result<Stats> {
        let mut ribbons = ribbons;
        let mut plan = DubinsPlan::new();
        let mut current = *start;
        current.speed = config.max_speed;
        let mut cost = 0.0;
        let mut collision = 0.0;
        let mut iterations = 0;

        for _ in 0..LOOKAHEAD_STEPS {
            iterations += 1;
            let force = Self::net_force(&current, &ribbons, config);
            if force.magnitude() < FORCE_FLOOR {
                break;
            }
            let yaw = force.direction();
            let distance = config.max_speed * STEP_DURATION;
            let target = State::new(
                current.x + distance * yaw.cos(),
                current.y + distance * yaw.sin(),
                State::heading_from_yaw(yaw),
                config.max_speed,
                0.0,
            );
            let Ok(segment) =
                DubinsSegment::between_states(&current, &target, config.coverage_turning_radius)
            else {
                break;
            };
            let evaluation = evaluate_edge(
                &segment,
                config.map().as_ref(),
                config.obstacles().as_ref(),
                config.collision_checking_increment,
                Some(&mut ribbons),
            );
            if !evaluation.feasible {
                break;
            }
            cost += evaluation.cost();
            collision += evaluation.collision;
            plan.append(segment);
            current = segment.end_state();
            if ribbons.done() {
                break;
            }
        }

        plan.set_dangerous(collision > 0.0);
        Ok(Stats {
            final_cost: if plan.empty() { f64::INFINITY } else { cost },
            plan,
            samples: 0,
            generated: iterations,
            expanded: iterations,
            iterations,
            time_remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacles::{GaussianDynamicObstaclesManager, IgnoreObstacles};
    use crate::ribbon::HeuristicKind;
    use std::sync::Arc;

    fn setup() -> (RibbonManager, PlannerConfig) {
        let mut ribbons = RibbonManager::new(HeuristicKind::MaxDistance, 8.0, 2);
        ribbons.add(20.0, 0.0, 60.0, 0.0);
        (ribbons, PlannerConfig::default())
    }

    #[test]
    fn test_plans_toward_uncovered_ribbon() {
        let (ribbons, config) = setup();
        let start = State::new(0.0, 0.0, std::f64::consts::FRAC_PI_2, 2.5, 0.0);
        let mut planner = PotentialFieldPlanner::new();
        let stats = planner
            .plan(ribbons, &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();
        assert!(!stats.plan.empty());
        // the lookahead should make eastward progress toward the ribbon
        let end = stats
            .plan
            .sample(stats.plan.end_time().unwrap())
            .unwrap();
        assert!(end.x > start.x);
    }

    #[test]
    fn test_no_force_no_plan() {
        // no ribbons, no obstacles: nothing pulls, nothing pushes
        let ribbons = RibbonManager::new(HeuristicKind::MaxDistance, 8.0, 2);
        let config = PlannerConfig::default();
        let start = State::new(0.0, 0.0, 0.0, 2.5, 0.0);
        let mut planner = PotentialFieldPlanner::new();
        let stats = planner
            .plan(ribbons, &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();
        assert!(stats.plan.empty());
        assert!(stats.final_cost.is_infinite());
    }

    #[test]
    fn test_obstacle_handle_gates_steering() {
        // The planner is deterministic, so with the obstacles ignored the
        // plan must be identical to the no-obstacle plan; with the Gaussian
        // model active the repulsion has to bend it.
        let start = State::new(0.0, 0.0, std::f64::consts::FRAC_PI_2, 2.5, 0.0);
        let mut manager = GaussianDynamicObstaclesManager::new();
        // a vessel squatting right on the approach to the ribbon
        manager.update(1, 10.0, 0.0, 0.0, 0.0, 0.0);

        let (ribbons, config) = setup();
        let baseline = PotentialFieldPlanner::new()
            .plan(ribbons, &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();

        let (ribbons, mut config) = setup();
        config.set_obstacles(Arc::new(IgnoreObstacles));
        let ignored = PotentialFieldPlanner::new()
            .plan(ribbons, &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();

        let (ribbons, mut config) = setup();
        config.set_obstacles(Arc::new(manager));
        let repelled = PotentialFieldPlanner::new()
            .plan(ribbons, &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();

        assert_eq!(baseline.plan, ignored.plan);
        assert_ne!(baseline.plan, repelled.plan);
    }

    #[test]
    fn test_magnitude_formulas() {
        assert_eq!(ribbon_magnitude(0.1), 20.0);
        assert!((ribbon_magnitude(5.0) - 2.0).abs() < 1e-12);
        assert_eq!(static_obstacle_magnitude(10.0), 0.0);
        assert!(static_obstacle_magnitude(3.0) > static_obstacle_magnitude(6.0));
        assert_eq!(dynamic_obstacle_magnitude(-1.0, 4.0, 4.0), 1000.0);
        assert!(
            dynamic_obstacle_magnitude(5.0, 4.0, 10.0)
                > dynamic_obstacle_magnitude(15.0, 4.0, 10.0)
        );
    }
}
