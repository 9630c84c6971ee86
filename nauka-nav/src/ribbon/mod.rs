//! Ribbon coverage accounting.
//!
//! A ribbon is an undirected line segment the vehicle must drive over within
//! a lateral tolerance of half the configured line width. Each ribbon tracks
//! the intervals of its length not yet covered; the manager owns the set,
//! answers `done()`, and prices the remaining work for the search planners.

mod heuristic;

pub use heuristic::HeuristicKind;

use nauka_plan::State;

/// Residual uncovered intervals shorter than this are considered covered.
pub const MIN_UNCOVERED_LENGTH: f64 = 1.0;

/// Default lateral coverage width in meters.
pub const DEFAULT_LINE_WIDTH: f64 = 2.0;

/// One survey line with its uncovered intervals.
#[derive(Debug, Clone, PartialEq)]
pub struct Ribbon {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    length: f64,
    /// Disjoint, ascending intervals of `[0, length]` not yet covered
    uncovered: Vec<(f64, f64)>,
}

impl Ribbon {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let length = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
        let uncovered = if length < MIN_UNCOVERED_LENGTH {
            Vec::new()
        } else {
            vec![(0.0, length)]
        };
        Self {
            x1,
            y1,
            x2,
            y2,
            length,
            uncovered,
        }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Point at parameter `t` along the segment.
    pub fn point_at(&self, t: f64) -> (f64, f64) {
        if self.length == 0.0 {
            return (self.x1, self.y1);
        }
        let f = t / self.length;
        (
            self.x1 + f * (self.x2 - self.x1),
            self.y1 + f * (self.y2 - self.y1),
        )
    }

    /// Projection parameter (unclamped) and perpendicular distance of a point.
    fn project(&self, x: f64, y: f64) -> (f64, f64) {
        if self.length == 0.0 {
            return (0.0, ((x - self.x1).powi(2) + (y - self.y1).powi(2)).sqrt());
        }
        let dx = self.x2 - self.x1;
        let dy = self.y2 - self.y1;
        let t = ((x - self.x1) * dx + (y - self.y1) * dy) / self.length;
        let (px, py) = self.point_at(t.clamp(0.0, self.length));
        let lateral = if (0.0..=self.length).contains(&t) {
            // perpendicular distance to the infinite line
            ((x - self.x1) * dy - (y - self.y1) * dx).abs() / self.length
        } else {
            ((x - px).powi(2) + (y - py).powi(2)).sqrt()
        };
        (t, lateral)
    }

    /// Mark the neighbourhood of a point as covered.
    ///
    /// The projection point ± `half_width` along the ribbon is removed from
    /// the uncovered set when the point lies within `half_width` laterally.
    /// `strict` requires the projection to fall between the endpoints;
    /// non-strict clamps it onto the segment.
    pub fn cover(&mut self, x: f64, y: f64, half_width: f64, strict: bool) {
        if self.uncovered.is_empty() {
            return;
        }
        let (t, lateral) = self.project(x, y);
        if lateral > half_width {
            return;
        }
        if strict && !(0.0..=self.length).contains(&t) {
            return;
        }
        let t = t.clamp(0.0, self.length);
        self.remove_interval(t - half_width, t + half_width);
    }

    fn remove_interval(&mut self, from: f64, to: f64) {
        let mut next = Vec::with_capacity(self.uncovered.len() + 1);
        for &(a, b) in &self.uncovered {
            if to <= a || from >= b {
                next.push((a, b));
                continue;
            }
            if from > a {
                next.push((a, from));
            }
            if to < b {
                next.push((to, b));
            }
        }
        next.retain(|&(a, b)| b - a >= MIN_UNCOVERED_LENGTH);
        self.uncovered = next;
    }

    /// Fully covered (up to the residual threshold)?
    #[inline]
    pub fn done(&self) -> bool {
        self.uncovered.is_empty()
    }

    /// Total uncovered length.
    pub fn uncovered_length(&self) -> f64 {
        self.uncovered.iter().map(|&(a, b)| b - a).sum()
    }

    /// Extent of the uncovered portion: endpoints of the smallest span
    /// containing every uncovered interval.
    pub fn uncovered_extent(&self) -> Option<(f64, f64)> {
        match (self.uncovered.first(), self.uncovered.last()) {
            (Some(&(a, _)), Some(&(_, b))) => Some((a, b)),
            _ => None,
        }
    }

    /// Endpoints of the segment as states heading into the ribbon.
    pub fn start_as_state(&self) -> State {
        let heading = (self.x2 - self.x1).atan2(self.y2 - self.y1);
        State::new(self.x1, self.y1, heading, 0.0, 0.0)
    }

    pub fn end_as_state(&self) -> State {
        let heading = (self.x1 - self.x2).atan2(self.y1 - self.y2);
        State::new(self.x2, self.y2, heading, 0.0, 0.0)
    }
}

/// An uncovered span with entry poses, produced for the planners.
#[derive(Debug, Clone, Copy)]
pub struct UncoveredSpan {
    /// First endpoint of the span
    pub ax: f64,
    pub ay: f64,
    /// Second endpoint of the span
    pub bx: f64,
    pub by: f64,
    /// Span length
    pub length: f64,
}

impl UncoveredSpan {
    /// Entry state at `a`, heading toward `b`.
    pub fn entry_at_a(&self) -> State {
        let heading = (self.bx - self.ax).atan2(self.by - self.ay);
        State::new(self.ax, self.ay, heading, 0.0, 0.0)
    }

    /// Entry state at `b`, heading toward `a`.
    pub fn entry_at_b(&self) -> State {
        let heading = (self.ax - self.bx).atan2(self.ay - self.by);
        State::new(self.bx, self.by, heading, 0.0, 0.0)
    }
}

/// The set of ribbons plus the coverage and heuristic configuration.
///
/// Plain `Clone` gives a deep value copy sharing no mutable state, which is
/// how the executive hands snapshots to planners.
#[derive(Debug, Clone)]
pub struct RibbonManager {
    ribbons: Vec<Ribbon>,
    heuristic: HeuristicKind,
    turning_radius: f64,
    k: usize,
    line_width: f64,
}

impl RibbonManager {
    pub fn new(heuristic: HeuristicKind, turning_radius: f64, k: usize) -> Self {
        Self {
            ribbons: Vec::new(),
            heuristic,
            turning_radius,
            k: k.max(1),
            line_width: DEFAULT_LINE_WIDTH,
        }
    }

    pub fn set_heuristic(&mut self, heuristic: HeuristicKind) {
        self.heuristic = heuristic;
    }

    pub fn set_line_width(&mut self, line_width: f64) {
        self.line_width = line_width;
    }

    pub fn set_turning_radius(&mut self, turning_radius: f64) {
        self.turning_radius = turning_radius;
    }

    #[inline]
    pub fn line_width(&self) -> f64 {
        self.line_width
    }

    pub fn ribbons(&self) -> &[Ribbon] {
        &self.ribbons
    }

    /// Add a survey line.
    pub fn add(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.ribbons.push(Ribbon::new(x1, y1, x2, y2));
    }

    /// Mark coverage at a point on every ribbon within lateral tolerance.
    pub fn cover(&mut self, x: f64, y: f64, strict: bool) {
        let half_width = self.line_width / 2.0;
        for ribbon in &mut self.ribbons {
            ribbon.cover(x, y, half_width, strict);
        }
    }

    /// Sweep coverage along the chord from `(x1, y1)` to `(x2, y2)`.
    pub fn cover_between(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, strict: bool) {
        let length = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
        let step = (self.line_width / 2.0).max(0.1);
        let steps = (length / step).ceil() as usize;
        for i in 0..=steps {
            let f = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
            self.cover(x1 + f * (x2 - x1), y1 + f * (y2 - y1), strict);
        }
    }

    /// Every ribbon covered?
    pub fn done(&self) -> bool {
        self.ribbons.iter().all(Ribbon::done)
    }

    /// Summed uncovered length over all ribbons.
    pub fn total_uncovered_length(&self) -> f64 {
        self.ribbons.iter().map(Ribbon::uncovered_length).sum()
    }

    /// Uncovered spans with their entry poses.
    pub fn uncovered_spans(&self) -> Vec<UncoveredSpan> {
        self.ribbons
            .iter()
            .filter_map(|r| {
                let (ta, tb) = r.uncovered_extent()?;
                let (ax, ay) = r.point_at(ta);
                let (bx, by) = r.point_at(tb);
                Some(UncoveredSpan {
                    ax,
                    ay,
                    bx,
                    by,
                    length: tb - ta,
                })
            })
            .collect()
    }

    /// Entry state of the uncovered endpoint nearest to `state`.
    pub fn nearest_uncovered_endpoint(&self, state: &State) -> Option<State> {
        let mut best: Option<(f64, State)> = None;
        for span in self.uncovered_spans() {
            for entry in [span.entry_at_a(), span.entry_at_b()] {
                let d = state.distance_to(&entry);
                if best.as_ref().is_none_or(|(bd, _)| d < *bd) {
                    best = Some((d, entry));
                }
            }
        }
        best.map(|(_, s)| s)
    }

    /// Estimated cost-to-go in seconds to finish covering from `state`.
    pub fn heuristic_cost(&self, state: &State, max_speed: f64) -> f64 {
        heuristic::cost(
            self.heuristic,
            state,
            &self.uncovered_spans(),
            self.turning_radius,
            self.k,
            max_speed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn manager() -> RibbonManager {
        RibbonManager::new(HeuristicKind::MaxDistance, 8.0, 2)
    }

    #[test]
    fn test_cover_along_full_ribbon_finishes_it() {
        // Drive the whole segment with non-strict covering: done.
        let mut m = manager();
        m.add(0.0, 0.0, 100.0, 0.0);
        assert!(!m.done());
        m.cover_between(0.0, 0.0, 100.0, 0.0, false);
        assert!(m.done());
        assert_relative_eq!(m.total_uncovered_length(), 0.0);
    }

    #[test]
    fn test_partial_coverage_leaves_remainder() {
        let mut m = manager();
        m.add(0.0, 0.0, 100.0, 0.0);
        m.cover_between(0.0, 0.0, 40.0, 0.0, false);
        assert!(!m.done());
        let remaining = m.total_uncovered_length();
        assert!(remaining < 62.0 && remaining > 55.0, "remaining {}", remaining);
    }

    #[test]
    fn test_lateral_tolerance() {
        let mut m = manager();
        m.add(0.0, 0.0, 100.0, 0.0);
        // passes half the line width above the ribbon: still covers
        m.cover_between(0.0, 0.9, 100.0, 0.9, false);
        assert!(m.done());

        let mut far = manager();
        far.add(0.0, 0.0, 100.0, 0.0);
        // passes well outside the tolerance: covers nothing
        far.cover_between(0.0, 5.0, 100.0, 5.0, false);
        assert_relative_eq!(far.total_uncovered_length(), 100.0);
    }

    #[test]
    fn test_strict_cover_ignores_points_beyond_endpoints() {
        let mut m = manager();
        m.add(0.0, 0.0, 100.0, 0.0);
        m.cover(-10.0, 0.0, true);
        assert_relative_eq!(m.total_uncovered_length(), 100.0);
        // non-strict clamps onto the endpoint
        m.cover(-0.4, 0.0, false);
        assert!(m.total_uncovered_length() < 100.0);
    }

    #[test]
    fn test_short_ribbon_is_born_done() {
        let mut m = manager();
        m.add(0.0, 0.0, 0.5, 0.0);
        assert!(m.done());
    }

    #[test]
    fn test_residual_sliver_is_dropped() {
        let mut m = manager();
        m.add(0.0, 0.0, 10.0, 0.0);
        // cover all but a sliver shorter than the threshold
        m.cover_between(0.0, 0.0, 9.4, 0.0, false);
        assert!(m.done());
    }

    #[test]
    fn test_clone_shares_no_state() {
        let mut m = manager();
        m.add(0.0, 0.0, 100.0, 0.0);
        let snapshot = m.clone();
        m.cover_between(0.0, 0.0, 100.0, 0.0, false);
        assert!(m.done());
        assert!(!snapshot.done());
        assert_relative_eq!(snapshot.total_uncovered_length(), 100.0);
    }

    #[test]
    fn test_nearest_uncovered_endpoint() {
        let mut m = manager();
        m.add(10.0, 0.0, 50.0, 0.0);
        m.add(200.0, 0.0, 300.0, 0.0);
        let state = State::new(0.0, 0.0, 0.0, 1.0, 0.0);
        let entry = m.nearest_uncovered_endpoint(&state).unwrap();
        assert_relative_eq!(entry.x, 10.0);
        assert_relative_eq!(entry.y, 0.0);
        // heading east, into the ribbon
        assert_relative_eq!(entry.heading, FRAC_PI_2);
    }
}
