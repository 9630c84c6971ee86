//! Batch Informed Trees planner.
//!
//! Unlike the coverage planners, BIT\* drives to a single goal pose: the
//! nearest uncovered ribbon endpoint. It grows a tree over batches of
//! sampled states, processing candidate edges in order of estimated total
//! solution cost and pruning everything that cannot beat the incumbent.
//! Once a solution exists, new batches are drawn from the informed ellipsoid
//! spanned by start, goal and the incumbent cost. The executive does not
//! re-invoke BIT\* while its plan remains non-empty.

use super::search::sample_states;
use super::{Planner, Stats, TIME_PENALTY_FACTOR};
use crate::config::PlannerConfig;
use crate::error::Result;
use crate::ribbon::RibbonManager;
use nauka_plan::{DubinsPlan, DubinsSegment, State};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Goal tolerance in meters.
const GOAL_TOLERANCE: f64 = 1e-3;

/// Margin added around the start/goal bounding box when sampling uniformly,
/// meters.
const SAMPLING_MARGIN: f64 = 50.0;

/// A tree vertex.
#[derive(Debug, Clone)]
struct BitVertex {
    state: State,
    parent: Option<usize>,
    segment: Option<DubinsSegment>,
    /// Cost from the root in blended units
    g: f64,
    /// Dynamic-obstacle cost accumulated from the root
    collision: f64,
    pruned: bool,
}

/// A queued candidate edge, keyed by estimated total solution cost.
#[derive(Debug, Clone, Copy)]
struct EdgeCandidate {
    /// Tree vertex index
    source: usize,
    /// Sample index (usize::MAX flags the goal sample)
    target: usize,
    key: f64,
    seq: usize,
}

impl PartialEq for EdgeCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EdgeCandidate {}

impl Ord for EdgeCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .partial_cmp(&self.key)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for EdgeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Batch Informed Trees planner to a goal pose.
pub struct BitStarPlanner {
    rng: StdRng,
    dynamic_obstacle_cost_factor: f64,
    dynamic_obstacle_time_stdev_power: f64,
    dynamic_obstacle_time_stdev_factor: f64,
}

impl Default for BitStarPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl BitStarPlanner {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            dynamic_obstacle_cost_factor: 100_000.0,
            dynamic_obstacle_time_stdev_power: 1.0,
            dynamic_obstacle_time_stdev_factor: 1.0,
        }
    }

    /// Deterministic sampling for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new()
        }
    }

    /// Admissible cost-to-come/cost-to-go estimate between positions:
    /// straight-line time.
    fn estimate(from: &State, to: &State, max_speed: f64) -> f64 {
        from.distance_to(to) / max_speed.max(1e-6) * TIME_PENALTY_FACTOR
    }

    /// One sample: uniform over the bounding box, or from the informed
    /// ellipsoid once an incumbent exists.
    fn sample_state(&mut self, start: &State, goal: &State, c_best: f64, max_speed: f64) -> State {
        let heading = self.rng.gen_range(0.0..2.0 * PI);
        if c_best.is_finite() {
            // informed ellipsoid, axes in distance units
            let c_best_dist = c_best / TIME_PENALTY_FACTOR * max_speed;
            let c_min = start.distance_to(goal);
            let a = c_best_dist / 2.0;
            let b = (c_best_dist * c_best_dist - c_min * c_min).max(0.0).sqrt() / 2.0;
            let center_x = (start.x + goal.x) / 2.0;
            let center_y = (start.y + goal.y) / 2.0;
            let theta = (goal.y - start.y).atan2(goal.x - start.x);
            // uniform point in the unit disc, scaled onto the ellipse axes
            let radius = self.rng.gen::<f64>().sqrt();
            let angle = self.rng.gen_range(0.0..2.0 * PI);
            let ex = a * radius * angle.cos();
            let ey = b * radius * angle.sin();
            let (sin_t, cos_t) = theta.sin_cos();
            State::new(
                center_x + ex * cos_t - ey * sin_t,
                center_y + ex * sin_t + ey * cos_t,
                heading,
                0.0,
                0.0,
            )
        } else {
            let min_x = start.x.min(goal.x) - SAMPLING_MARGIN;
            let max_x = start.x.max(goal.x) + SAMPLING_MARGIN;
            let min_y = start.y.min(goal.y) - SAMPLING_MARGIN;
            let max_y = start.y.max(goal.y) + SAMPLING_MARGIN;
            State::new(
                self.rng.gen_range(min_x..max_x),
                self.rng.gen_range(min_y..max_y),
                heading,
                0.0,
                0.0,
            )
        }
    }

    /// True edge cost: walk the Dubins segment, fail on blocked cells,
    /// integrate the configured obstacle model's cost with track uncertainty
    /// grown by the time since observation.
    fn edge_cost(&self, segment: &DubinsSegment, config: &PlannerConfig) -> Option<(f64, f64)> {
        let samples = sample_states(segment, config.collision_checking_increment);
        if samples.is_empty() {
            return None;
        }
        let dt = if samples.len() > 1 {
            (segment.end_time() - segment.start_time()) / (samples.len() - 1) as f64
        } else {
            0.0
        };
        let mut collision = 0.0;
        for state in &samples {
            if config.map().is_blocked(state.x, state.y) {
                return None;
            }
            collision += config.obstacles().collision_exists_grown(
                state.x,
                state.y,
                state.time,
                self.dynamic_obstacle_time_stdev_power,
                self.dynamic_obstacle_time_stdev_factor,
            ) * dt;
        }
        let duration = segment.end_time() - segment.start_time();
        let cost = duration * TIME_PENALTY_FACTOR + collision * self.dynamic_obstacle_cost_factor;
        Some((cost, collision))
    }

    fn trace_plan(tree: &[BitVertex], index: usize) -> DubinsPlan {
        let mut segments = Vec::new();
        let mut current = Some(index);
        let dangerous = tree[index].collision > 0.0;
        while let Some(i) = current {
            if let Some(segment) = tree[i].segment {
                segments.push(segment);
            }
            current = tree[i].parent;
        }
        segments.reverse();
        let mut plan = DubinsPlan::new();
        for segment in segments {
            plan.append(segment);
        }
        plan.set_dangerous(dangerous);
        plan
    }
}

impl Planner for BitStarPlanner {
    fn plan(
        &mut self,
        ribbons: RibbonManager,
        start: &State,
        config: &PlannerConfig,
        _previous: DubinsPlan,
        time_remaining: f64,
    ) -> Result<Stats> {
        let deadline = Instant::now() + Duration::from_secs_f64(time_remaining.max(0.0));
        let mut stats = Stats::failure();
        stats.time_remaining = time_remaining;

        let Some(mut goal) = ribbons.nearest_uncovered_endpoint(start) else {
            return Ok(stats);
        };
        goal.speed = config.max_speed;

        let mut root_state = *start;
        root_state.speed = config.max_speed;
        let mut tree = vec![BitVertex {
            state: root_state,
            parent: None,
            segment: None,
            g: 0.0,
            collision: 0.0,
            pruned: false,
        }];
        // unconnected samples; consumed entries become None so queued edge
        // candidates keep stable indices within a batch
        let mut samples: Vec<Option<State>> = Vec::new();
        let mut queue: BinaryHeap<EdgeCandidate> = BinaryHeap::new();
        let mut seq = 0usize;
        let mut c_best = f64::INFINITY;
        let mut goal_vertex: Option<usize> = None;

        while Instant::now() < deadline {
            stats.iterations += 1;

            if queue.is_empty() {
                // start a new batch: prune against the incumbent, then sample
                samples.retain(|entry| {
                    entry.is_some_and(|x| {
                        Self::estimate(&root_state, &x, config.max_speed)
                            + Self::estimate(&x, &goal, config.max_speed)
                            < c_best
                    })
                });
                for vertex in tree.iter_mut() {
                    if vertex.g + Self::estimate(&vertex.state, &goal, config.max_speed) >= c_best {
                        vertex.pruned = true;
                    }
                }
                for _ in 0..config.initial_samples.max(1) {
                    let state = self.sample_state(&root_state, &goal, c_best, config.max_speed);
                    if Self::estimate(&root_state, &state, config.max_speed)
                        + Self::estimate(&state, &goal, config.max_speed)
                        < c_best
                    {
                        samples.push(Some(state));
                        stats.samples += 1;
                    }
                }
                // queue candidate edges from every live tree vertex
                for (vi, vertex) in tree.iter().enumerate() {
                    if vertex.pruned {
                        continue;
                    }
                    for (si, sample) in samples.iter().enumerate() {
                        let Some(sample) = sample else { continue };
                        let key = vertex.g
                            + Self::estimate(&vertex.state, sample, config.max_speed)
                            + Self::estimate(sample, &goal, config.max_speed);
                        if key < c_best {
                            seq += 1;
                            queue.push(EdgeCandidate {
                                source: vi,
                                target: si,
                                key,
                                seq,
                            });
                        }
                    }
                    let goal_key = vertex.g + Self::estimate(&vertex.state, &goal, config.max_speed);
                    if goal_key < c_best {
                        seq += 1;
                        queue.push(EdgeCandidate {
                            source: vi,
                            target: usize::MAX,
                            key: goal_key,
                            seq,
                        });
                    }
                }
                if queue.is_empty() && samples.is_empty() {
                    // nothing left that could improve the incumbent
                    break;
                }
                continue;
            }

            let Some(candidate) = queue.pop() else {
                continue;
            };
            if candidate.key >= c_best {
                // no queued edge can improve the solution: next batch
                queue.clear();
                continue;
            }
            let source = tree[candidate.source].clone();
            if source.pruned {
                continue;
            }
            let target_state = if candidate.target == usize::MAX {
                goal
            } else {
                match samples.get(candidate.target) {
                    Some(Some(s)) => *s,
                    // consumed earlier this batch, or pruned at a batch boundary
                    _ => continue,
                }
            };
            if target_state.is_co_located(&source.state) {
                continue;
            }
            stats.expanded += 1;

            let mut from = source.state;
            from.speed = config.max_speed;
            let Ok(segment) =
                DubinsSegment::between_states(&from, &target_state, config.turning_radius)
            else {
                continue;
            };
            if segment.end_time() - start.time > config.time_horizon {
                continue;
            }
            let Some((edge_cost, edge_collision)) = self.edge_cost(&segment, config) else {
                continue;
            };
            let g = source.g + edge_cost;
            if g + Self::estimate(&target_state, &goal, config.max_speed) >= c_best {
                continue;
            }

            let state = segment.end_state();
            tree.push(BitVertex {
                state,
                parent: Some(candidate.source),
                segment: Some(segment),
                g,
                collision: source.collision + edge_collision,
                pruned: false,
            });
            let index = tree.len() - 1;
            stats.generated += 1;

            if candidate.target == usize::MAX {
                // connected the goal
                if g < c_best {
                    c_best = g;
                    goal_vertex = Some(index);
                }
            } else {
                // consumed: a sample joins the tree at most once
                samples[candidate.target] = None;
                let goal_key = g + Self::estimate(&state, &goal, config.max_speed);
                if goal_key < c_best {
                    seq += 1;
                    queue.push(EdgeCandidate {
                        source: index,
                        target: usize::MAX,
                        key: goal_key,
                        seq,
                    });
                }
                for (si, sample) in samples.iter().enumerate() {
                    let Some(sample) = sample else { continue };
                    let key = g
                        + Self::estimate(&state, sample, config.max_speed)
                        + Self::estimate(sample, &goal, config.max_speed);
                    if key < c_best {
                        seq += 1;
                        queue.push(EdgeCandidate {
                            source: index,
                            target: si,
                            key,
                            seq,
                        });
                    }
                }
            }
        }

        if let Some(index) = goal_vertex {
            stats.plan = Self::trace_plan(&tree, index);
            stats.final_cost = c_best;
        }
        stats.time_remaining = (deadline - Instant::now().min(deadline)).as_secs_f64();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacles::{GaussianDynamicObstaclesManager, IgnoreObstacles};
    use crate::ribbon::HeuristicKind;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::Arc;

    fn survey_config() -> PlannerConfig {
        let nav = crate::config::NavConfig {
            max_speed: 2.0,
            slow_speed: 2.0,
            time_horizon: 120.0,
            initial_samples: 40,
            ..Default::default()
        };
        PlannerConfig::from_nav_config(&nav)
    }

    /// A stationary vessel squatting on the direct approach to the ribbons.
    fn blocking_manager() -> GaussianDynamicObstaclesManager {
        let mut manager = GaussianDynamicObstaclesManager::new();
        manager.update(1, 50.0, 0.0, 0.0, 0.0, 0.0);
        manager
    }

    #[test]
    fn test_reaches_goal_pose() {
        let mut ribbons = RibbonManager::new(HeuristicKind::MaxDistance, 8.0, 2);
        ribbons.add(50.0, 0.0, 150.0, 0.0);
        let start = State::new(0.0, 0.0, FRAC_PI_2, 2.0, 0.0);
        let config = survey_config();
        let mut planner = BitStarPlanner::seeded(5);
        let stats = planner
            .plan(ribbons.clone(), &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();
        assert!(!stats.plan.empty());
        let goal = ribbons.nearest_uncovered_endpoint(&start).unwrap();
        let end = stats.plan.sample(stats.plan.end_time().unwrap()).unwrap();
        assert!(end.distance_to(&goal) < 1.0, "ended {} m from goal", end.distance_to(&goal));
    }

    #[test]
    fn test_no_uncovered_ribbons_returns_empty() {
        let ribbons = RibbonManager::new(HeuristicKind::MaxDistance, 8.0, 2);
        let start = State::new(0.0, 0.0, 0.0, 2.0, 0.0);
        let config = survey_config();
        let mut planner = BitStarPlanner::seeded(5);
        let stats = planner
            .plan(ribbons, &start, &config, DubinsPlan::new(), 0.5)
            .unwrap();
        assert!(stats.plan.empty());
    }

    #[test]
    fn test_obstacle_raises_cost_and_danger() {
        let mut ribbons = RibbonManager::new(HeuristicKind::MaxDistance, 8.0, 2);
        ribbons.add(100.0, 0.0, 200.0, 0.0);
        let start = State::new(0.0, 0.0, FRAC_PI_2, 2.0, 0.0);
        let config = survey_config();

        let clear = BitStarPlanner::seeded(9)
            .plan(ribbons.clone(), &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();

        let mut config = survey_config();
        config.set_obstacles(Arc::new(blocking_manager()));
        let obstructed = BitStarPlanner::seeded(9)
            .plan(ribbons, &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();

        assert!(!clear.plan.empty());
        assert!(!obstructed.plan.empty());
        assert!(obstructed.final_cost >= clear.final_cost - 1e-9);
    }

    #[test]
    fn test_ignored_obstacles_do_not_cost() {
        // The null manager is what `ignore_dynamic_obstacles` installs: with
        // it in the config, a vessel on the approach must change nothing
        // relative to an empty sea, while the Gaussian model makes it cost.
        let mut ribbons = RibbonManager::new(HeuristicKind::MaxDistance, 8.0, 2);
        ribbons.add(100.0, 0.0, 200.0, 0.0);
        let start = State::new(0.0, 0.0, FRAC_PI_2, 2.0, 0.0);

        let clear = BitStarPlanner::seeded(13)
            .plan(ribbons.clone(), &start, &survey_config(), DubinsPlan::new(), 1.0)
            .unwrap();

        let mut config = survey_config();
        config.set_obstacles(Arc::new(blocking_manager()));
        let obstructed = BitStarPlanner::seeded(13)
            .plan(ribbons.clone(), &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();

        let mut config = survey_config();
        config.set_obstacles(Arc::new(IgnoreObstacles));
        let ignored = BitStarPlanner::seeded(13)
            .plan(ribbons, &start, &config, DubinsPlan::new(), 1.0)
            .unwrap();

        assert!(!ignored.plan.empty());
        assert!(!ignored.plan.dangerous());
        assert!((ignored.final_cost - clear.final_cost).abs() < 1e-9);
        assert!(ignored.final_cost <= obstructed.final_cost + 1e-9);
    }

    #[test]
    fn test_respects_budget() {
        let mut ribbons = RibbonManager::new(HeuristicKind::MaxDistance, 8.0, 2);
        ribbons.add(300.0, 300.0, 400.0, 300.0);
        let start = State::new(0.0, 0.0, 0.0, 2.0, 0.0);
        let nav = crate::config::NavConfig {
            max_speed: 2.0,
            time_horizon: 600.0,
            initial_samples: 60,
            ..Default::default()
        };
        let config = PlannerConfig::from_nav_config(&nav);
        let mut planner = BitStarPlanner::seeded(2);
        let budget = 0.4;
        let before = Instant::now();
        let _ = planner
            .plan(ribbons, &start, &config, DubinsPlan::new(), budget)
            .unwrap();
        assert!(before.elapsed().as_secs_f64() < budget + 0.25);
    }
}
