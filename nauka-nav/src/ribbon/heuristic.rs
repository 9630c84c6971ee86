//! Cost-to-go estimates over the uncovered ribbons.
//!
//! Used to guide best-first search; these are lower-bound-flavoured
//! estimates, not proven admissible. All variants return seconds at the
//! given maximum speed.

use super::UncoveredSpan;
use nauka_plan::{DubinsPath, State};
use std::collections::HashMap;

/// Exhaustive TSP over more ribbons than this gets restricted to the
/// nearest ones, with the remainder lower-bounded by its summed length.
const MAX_TSP_RIBBONS: usize = 6;

/// The five heuristic kinds, wire-indexed 0..4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeuristicKind {
    TspPointRobotNoSplitAllRibbons,
    TspPointRobotNoSplitKRibbons,
    MaxDistance,
    TspDubinsNoSplitAllRibbons,
    TspDubinsNoSplitKRibbons,
}

impl HeuristicKind {
    /// Configuration index mapping, fixed by the external config surface.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(HeuristicKind::TspPointRobotNoSplitAllRibbons),
            1 => Some(HeuristicKind::TspPointRobotNoSplitKRibbons),
            2 => Some(HeuristicKind::MaxDistance),
            3 => Some(HeuristicKind::TspDubinsNoSplitAllRibbons),
            4 => Some(HeuristicKind::TspDubinsNoSplitKRibbons),
            _ => None,
        }
    }
}

/// Distance metric between poses for the TSP edge weights.
#[derive(Clone, Copy)]
enum Metric {
    PointRobot,
    Dubins { rho: f64 },
}

impl Metric {
    fn between(&self, from: &State, to: &State) -> f64 {
        match self {
            Metric::PointRobot => from.distance_to(to),
            Metric::Dubins { rho } => {
                DubinsPath::shortest(from.configuration(), to.configuration(), *rho)
                    .map(|p| p.length())
                    // degenerate connections fall back to the chord
                    .unwrap_or_else(|_| from.distance_to(to))
            }
        }
    }
}

/// Estimated cost in seconds to cover all `spans` starting from `state`.
pub fn cost(
    kind: HeuristicKind,
    state: &State,
    spans: &[UncoveredSpan],
    turning_radius: f64,
    k: usize,
    max_speed: f64,
) -> f64 {
    if spans.is_empty() {
        return 0.0;
    }
    let speed = max_speed.max(1e-6);
    let distance = match kind {
        HeuristicKind::MaxDistance => max_distance(state, spans),
        HeuristicKind::TspPointRobotNoSplitAllRibbons => {
            tsp(state, spans, MAX_TSP_RIBBONS, Metric::PointRobot)
        }
        HeuristicKind::TspPointRobotNoSplitKRibbons => tsp(state, spans, k, Metric::PointRobot),
        HeuristicKind::TspDubinsNoSplitAllRibbons => tsp(
            state,
            spans,
            MAX_TSP_RIBBONS,
            Metric::Dubins {
                rho: turning_radius,
            },
        ),
        HeuristicKind::TspDubinsNoSplitKRibbons => tsp(
            state,
            spans,
            k,
            Metric::Dubins {
                rho: turning_radius,
            },
        ),
    };
    distance / speed
}

/// Farthest uncovered endpoint.
fn max_distance(state: &State, spans: &[UncoveredSpan]) -> f64 {
    spans
        .iter()
        .flat_map(|s| {
            [
                state.distance_to_point(s.ax, s.ay),
                state.distance_to_point(s.bx, s.by),
            ]
        })
        .fold(0.0, f64::max)
}

/// TSP over whole ribbons: enter one end, leave the other, visit all.
///
/// Solved exactly over the `limit` spans nearest to the state; the rest
/// contribute their summed length.
fn tsp(state: &State, spans: &[UncoveredSpan], limit: usize, metric: Metric) -> f64 {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by(|&a, &b| {
        let da = span_distance(state, &spans[a]);
        let db = span_distance(state, &spans[b]);
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });

    let (near, far) = order.split_at(order.len().min(limit.max(1)));
    let selected: Vec<UncoveredSpan> = near.iter().map(|&i| spans[i]).collect();
    let remainder: f64 = far.iter().map(|&i| spans[i].length).sum();

    let mut solver = TspSolver {
        spans: &selected,
        metric,
        memo: HashMap::new(),
    };
    let full = (1u32 << selected.len()) - 1;
    solver.best(state, START_KEY, 0, full) + remainder
}

fn span_distance(state: &State, span: &UncoveredSpan) -> f64 {
    state
        .distance_to_point(span.ax, span.ay)
        .min(state.distance_to_point(span.bx, span.by))
}

const START_KEY: u8 = u8::MAX;

struct TspSolver<'a> {
    spans: &'a [UncoveredSpan],
    metric: Metric,
    /// (visited mask, endpoint key) → best remaining distance
    memo: HashMap<(u32, u8), f64>,
}

impl TspSolver<'_> {
    fn best(&mut self, at: &State, key: u8, mask: u32, full: u32) -> f64 {
        if mask == full {
            return 0.0;
        }
        if let Some(&cached) = self.memo.get(&(mask, key)) {
            return cached;
        }
        let mut best = f64::INFINITY;
        for (i, span) in self.spans.iter().enumerate() {
            if mask & (1 << i) != 0 {
                continue;
            }
            let next_mask = mask | (1 << i);
            // enter at a, exit at b
            let entry_a = span.entry_at_a();
            let exit_b = State::new(span.bx, span.by, entry_a.heading, 0.0, 0.0);
            let via_a = self.metric.between(at, &entry_a)
                + span.length
                + self.best(&exit_b, (i * 2 + 1) as u8, next_mask, full);
            // enter at b, exit at a
            let entry_b = span.entry_at_b();
            let exit_a = State::new(span.ax, span.ay, entry_b.heading, 0.0, 0.0);
            let via_b = self.metric.between(at, &entry_b)
                + span.length
                + self.best(&exit_a, (i * 2) as u8, next_mask, full);
            best = best.min(via_a).min(via_b);
        }
        self.memo.insert((mask, key), best);
        best
    }
}
