//! Anytime A\* over a lazy Dubins edge graph.
//!
//! Vertices are states on uncovered ribbon endpoints plus random samples;
//! edges are Dubins connections costed by elapsed time and integrated
//! dynamic-obstacle cost. Expansion is best-first on `g + h` with the ribbon
//! heuristic as `h`. The search is anytime: when the wall-clock budget runs
//! out it returns the best incumbent, tracing parent pointers back to the
//! start.

use super::search::{evaluate_edge, Arena, HeapNode, Vertex};
use super::{Planner, Stats};
use crate::config::PlannerConfig;
use crate::error::Result;
use crate::ribbon::RibbonManager;
use nauka_plan::{DubinsPlan, DubinsSegment, State};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BinaryHeap;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// A candidate successor pose with its connection radius and speed.
struct Target {
    state: State,
    rho: f64,
    speed: f64,
}

/// Anytime A\* / sampling-based planner.
pub struct AStarPlanner {
    rng: StdRng,
}

impl Default for AStarPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl AStarPlanner {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sampling for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Successor poses of a vertex: entry and exit poses of every uncovered
    /// span, plus `count` random samples inside the reachable disc.
    fn targets(
        &mut self,
        vertex: &Vertex,
        start_time: f64,
        config: &PlannerConfig,
        sample_count: usize,
    ) -> Vec<Target> {
        let mut targets = Vec::new();

        for span in vertex.ribbons.uncovered_spans() {
            let entry_a = span.entry_at_a();
            let entry_b = span.entry_at_b();
            // exits carry the traversal heading out of the far end
            let exit_b = State::new(span.bx, span.by, entry_a.heading, 0.0, 0.0);
            let exit_a = State::new(span.ax, span.ay, entry_b.heading, 0.0, 0.0);
            for entry in [entry_a, entry_b] {
                targets.push(Target {
                    state: entry,
                    rho: config.coverage_turning_radius,
                    speed: config.max_speed,
                });
                if config.use_brown_paths {
                    // lead-in pose one turning radius before the endpoint,
                    // for a straight approach onto the line
                    let lead = State::new(
                        entry.x - config.coverage_turning_radius * entry.heading.sin(),
                        entry.y - config.coverage_turning_radius * entry.heading.cos(),
                        entry.heading,
                        0.0,
                        0.0,
                    );
                    targets.push(Target {
                        state: lead,
                        rho: config.coverage_turning_radius,
                        speed: config.max_speed,
                    });
                }
            }
            // covering passes run at the survey speed
            for exit in [exit_a, exit_b] {
                targets.push(Target {
                    state: exit,
                    rho: config.coverage_turning_radius,
                    speed: config.slow_speed,
                });
            }
        }

        // random samples inside the disc still reachable within the horizon
        let elapsed = vertex.state.time - start_time;
        let reach = ((config.time_horizon - elapsed) * config.max_speed).max(10.0);
        for _ in 0..sample_count {
            let radius = reach * self.rng.gen::<f64>().sqrt();
            let angle = self.rng.gen_range(0.0..2.0 * PI);
            let heading = self.rng.gen_range(0.0..2.0 * PI);
            targets.push(Target {
                state: State::new(
                    vertex.state.x + radius * angle.cos(),
                    vertex.state.y + radius * angle.sin(),
                    heading,
                    0.0,
                    0.0,
                ),
                rho: config.turning_radius,
                speed: config.max_speed,
            });
        }

        targets
    }
}

impl Planner for AStarPlanner {
    fn plan(
        &mut self,
        ribbons: RibbonManager,
        start: &State,
        config: &PlannerConfig,
        previous: DubinsPlan,
        time_remaining: f64,
    ) -> Result<Stats> {
        let deadline = Instant::now() + Duration::from_secs_f64(time_remaining.max(0.0));
        let mut stats = Stats::failure();
        stats.time_remaining = time_remaining;
        if ribbons.done() {
            return Ok(stats);
        }

        let mut arena = Arena::new();
        let mut open = BinaryHeap::new();
        let mut seq = 0usize;

        let mut root_state = *start;
        root_state.speed = config.max_speed;
        let root_h = ribbons.heuristic_cost(&root_state, config.max_speed);
        let root = arena.push(Vertex {
            state: root_state,
            parent: None,
            segment: None,
            ribbons,
            g: 0.0,
            h: root_h,
            collision: 0.0,
        });
        open.push(HeapNode {
            index: root,
            f: root_h,
            h: root_h,
            g: 0.0,
            seq,
        });

        // seed the tree with the retained suffix of the previous plan
        let mut seed_parent = root;
        for segment in previous.segments() {
            let parent = arena.get(seed_parent).clone();
            let mut covered = parent.ribbons.clone();
            let evaluation = evaluate_edge(
                segment,
                config.map().as_ref(),
                config.obstacles().as_ref(),
                config.collision_checking_increment,
                Some(&mut covered),
            );
            if !evaluation.feasible {
                break;
            }
            let state = segment.end_state();
            let g = parent.g + evaluation.cost();
            let h = covered.heuristic_cost(&state, config.max_speed);
            let collision = parent.collision + evaluation.collision;
            let index = arena.push(Vertex {
                state,
                parent: Some(seed_parent),
                segment: Some(*segment),
                ribbons: covered,
                g,
                h,
                collision,
            });
            seq += 1;
            open.push(HeapNode {
                index,
                f: g + h,
                h,
                g,
                seq,
            });
            seed_parent = index;
        }

        let mut best_done: Option<(usize, f64)> = None;
        let mut best_leaf: Option<(usize, f64)> = None;
        let mut first_expansion = true;

        while let Some(node) = open.pop() {
            if Instant::now() >= deadline {
                break;
            }
            stats.iterations += 1;

            // incumbent-based pruning
            if let Some((_, incumbent)) = best_done {
                if node.f >= incumbent {
                    continue;
                }
            }

            let vertex = arena.get(node.index).clone();
            if vertex.ribbons.done() {
                match best_done {
                    Some((_, incumbent)) if incumbent <= vertex.g => {}
                    _ => best_done = Some((node.index, vertex.g)),
                }
                continue;
            }
            if node.index != root
                && best_leaf.is_none_or(|(_, f)| node.f < f)
            {
                best_leaf = Some((node.index, node.f));
            }
            stats.expanded += 1;

            let sample_count = if first_expansion {
                config.initial_samples.max(config.branching_factor)
            } else {
                config.branching_factor
            };
            first_expansion = false;
            stats.samples += sample_count;

            for target in self.targets(&vertex, start.time, config, sample_count) {
                if Instant::now() >= deadline {
                    break;
                }
                if target.state.is_co_located(&vertex.state) {
                    continue;
                }
                let mut from = vertex.state;
                from.speed = target.speed;
                let Ok(segment) = DubinsSegment::between_states(&from, &target.state, target.rho)
                else {
                    continue;
                };
                // prune edges past the search horizon
                if segment.end_time() - start.time > config.time_horizon {
                    continue;
                }
                let mut covered = vertex.ribbons.clone();
                let evaluation = evaluate_edge(
                    &segment,
                    config.map().as_ref(),
                    config.obstacles().as_ref(),
                    config.collision_checking_increment,
                    Some(&mut covered),
                );
                if !evaluation.feasible {
                    continue;
                }
                let state = segment.end_state();
                let g = vertex.g + evaluation.cost();
                let h = covered.heuristic_cost(&state, config.max_speed);
                if let Some((_, incumbent)) = best_done {
                    if g + h >= incumbent {
                        continue;
                    }
                }
                let collision = vertex.collision + evaluation.collision;
                let index = arena.push(Vertex {
                    state,
                    parent: Some(node.index),
                    segment: Some(segment),
                    ribbons: covered,
                    g,
                    h,
                    collision,
                });
                stats.generated += 1;
                seq += 1;
                open.push(HeapNode {
                    index,
                    f: g + h,
                    h,
                    g,
                    seq,
                });
            }
        }

        let incumbent = best_done.or(best_leaf);
        if let Some((index, cost)) = incumbent {
            stats.plan = arena.trace_plan(index);
            stats.final_cost = cost;
        }
        stats.time_remaining = (deadline - Instant::now().min(deadline)).as_secs_f64();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ribbon::HeuristicKind;
    use std::f64::consts::FRAC_PI_2;

    fn config_for_survey() -> PlannerConfig {
        let nav = crate::config::NavConfig {
            max_speed: 2.0,
            slow_speed: 2.0,
            time_horizon: 120.0,
            coverage_turning_radius: 8.0,
            ..Default::default()
        };
        PlannerConfig::from_nav_config(&nav)
    }

    #[test]
    fn test_single_ribbon_plan_covers_it() {
        let mut ribbons = RibbonManager::new(HeuristicKind::TspPointRobotNoSplitAllRibbons, 8.0, 2);
        ribbons.add(0.0, 0.0, 100.0, 0.0);
        let start = State::new(-20.0, 0.0, FRAC_PI_2, 2.0, 0.0);
        let config = config_for_survey();
        let mut planner = AStarPlanner::seeded(7);

        let stats = planner
            .plan(ribbons.clone(), &start, &config, DubinsPlan::new(), 0.9)
            .unwrap();
        assert!(!stats.plan.empty());

        // simulate traversal: sweep coverage along the plan's samples
        let samples = stats.plan.half_second_samples();
        for pair in samples.windows(2) {
            ribbons.cover_between(pair[0].x, pair[0].y, pair[1].x, pair[1].y, false);
        }
        assert!(ribbons.done());
        assert!(stats.plan.end_time().unwrap() <= 65.0);
    }

    #[test]
    fn test_returns_within_budget() {
        let mut ribbons = RibbonManager::new(HeuristicKind::TspPointRobotNoSplitAllRibbons, 8.0, 2);
        for i in 0..6 {
            let y = 20.0 * i as f64;
            ribbons.add(0.0, y, 200.0, y);
        }
        let start = State::new(-20.0, 0.0, FRAC_PI_2, 2.0, 0.0);
        let config = config_for_survey();
        let mut planner = AStarPlanner::seeded(1);

        let budget = 0.5;
        let before = Instant::now();
        let _ = planner
            .plan(ribbons, &start, &config, DubinsPlan::new(), budget)
            .unwrap();
        let elapsed = before.elapsed().as_secs_f64();
        assert!(elapsed < budget + 0.25, "took {}", elapsed);
    }

    #[test]
    fn test_done_ribbons_yield_empty_plan() {
        let ribbons = RibbonManager::new(HeuristicKind::MaxDistance, 8.0, 2);
        let start = State::new(0.0, 0.0, 0.0, 2.0, 0.0);
        let config = config_for_survey();
        let mut planner = AStarPlanner::seeded(3);
        let stats = planner
            .plan(ribbons, &start, &config, DubinsPlan::new(), 0.2)
            .unwrap();
        assert!(stats.plan.empty());
    }

    #[test]
    fn test_previous_plan_seeds_search() {
        let mut ribbons = RibbonManager::new(HeuristicKind::TspPointRobotNoSplitAllRibbons, 8.0, 2);
        ribbons.add(0.0, 0.0, 100.0, 0.0);
        let start = State::new(-20.0, 0.0, FRAC_PI_2, 2.0, 0.0);
        let config = config_for_survey();
        let mut planner = AStarPlanner::seeded(11);

        let first = planner
            .plan(ribbons.clone(), &start, &config, DubinsPlan::new(), 0.5)
            .unwrap();
        assert!(!first.plan.empty());

        // replanning from the same start with the previous plan as seed
        // must find a plan at least as good
        let second = planner
            .plan(ribbons, &start, &config, first.plan.clone(), 0.5)
            .unwrap();
        assert!(!second.plan.empty());
        assert!(second.final_cost <= first.final_cost + 1e-6);
    }
}
