//! Timed Dubins segments and plans.
//!
//! A [`DubinsSegment`] is one constant-speed, constant-radius Dubins curve
//! with a start time; a [`DubinsPlan`] is an ordered sequence of segments
//! whose time spans do not overlap. Plans are produced by planners, spliced
//! into suffixes by the executive, and sampled by the controller interface.

use crate::dubins::DubinsPath;
use crate::error::{PlanError, Result};
use crate::state::State;

/// Sampling density of [`DubinsPlan::half_second_samples`] in seconds.
pub const PLAN_TIME_DENSITY: f64 = 0.5;

/// One Dubins curve travelled at constant speed, anchored at a start time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DubinsSegment {
    path: DubinsPath,
    speed: f64,
    start_time: f64,
}

impl DubinsSegment {
    /// Wrap a Dubins path with a speed and start time.
    pub fn new(path: DubinsPath, speed: f64, start_time: f64) -> Self {
        Self {
            path,
            speed,
            start_time,
        }
    }

    /// Shortest segment connecting two states.
    ///
    /// Speed and start time come from `from`; the goal contributes only its
    /// pose.
    pub fn between_states(from: &State, to: &State, rho: f64) -> Result<Self> {
        let path = DubinsPath::shortest(from.configuration(), to.configuration(), rho)?;
        Ok(Self::new(path, from.speed, from.time))
    }

    /// The underlying geometry.
    #[inline]
    pub fn path(&self) -> &DubinsPath {
        &self.path
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    #[inline]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// `start_time + arc_length / speed`.
    #[inline]
    pub fn end_time(&self) -> f64 {
        self.start_time + self.path.length() / self.speed
    }

    /// Whether `time` falls within `[start_time, end_time]`.
    #[inline]
    pub fn contains_time(&self, time: f64) -> bool {
        self.start_time <= time && time <= self.end_time()
    }

    /// State at the given time.
    pub fn sample(&self, time: f64) -> Result<State> {
        if !self.contains_time(time) {
            return Err(PlanError::OutOfRange {
                time,
                start: self.start_time,
                end: self.end_time(),
            });
        }
        let arc = self.speed * (time - self.start_time);
        let q = self.path.sample(arc)?;
        Ok(State {
            x: q[0],
            y: q[1],
            heading: State::heading_from_yaw(q[2]),
            speed: self.speed,
            time,
        })
    }

    /// End state of the segment.
    pub fn end_state(&self) -> State {
        let q = self.path.endpoint();
        State {
            x: q[0],
            y: q[1],
            heading: State::heading_from_yaw(q[2]),
            speed: self.speed,
            time: self.end_time(),
        }
    }
}

/// An ordered sequence of non-overlapping Dubins segments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DubinsPlan {
    segments: Vec<DubinsSegment>,
    dangerous: bool,
}

impl DubinsPlan {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Push a segment onto the tail.
    ///
    /// The caller is responsible for temporal monotonicity: the new segment
    /// must not start before the current end of the plan.
    pub fn append(&mut self, segment: DubinsSegment) {
        self.segments.push(segment);
    }

    /// Append every segment of another plan.
    pub fn extend(&mut self, other: &DubinsPlan) {
        self.segments.extend_from_slice(&other.segments);
    }

    #[inline]
    pub fn segments(&self) -> &[DubinsSegment] {
        &self.segments
    }

    /// Start time of the first segment.
    pub fn start_time(&self) -> Result<f64> {
        self.segments
            .first()
            .map(DubinsSegment::start_time)
            .ok_or(PlanError::EmptyPlan)
    }

    /// End time of the last segment.
    pub fn end_time(&self) -> Result<f64> {
        self.segments
            .last()
            .map(DubinsSegment::end_time)
            .ok_or(PlanError::EmptyPlan)
    }

    /// Total time span covered by the plan; zero when empty.
    pub fn total_time(&self) -> f64 {
        match (self.start_time(), self.end_time()) {
            (Ok(start), Ok(end)) => end - start,
            _ => 0.0,
        }
    }

    /// Whether any segment contains `time`.
    pub fn contains_time(&self, time: f64) -> bool {
        self.segments.iter().any(|s| s.contains_time(time))
    }

    /// State at the given time, from the first containing segment.
    pub fn sample(&self, time: f64) -> Result<State> {
        for segment in &self.segments {
            if segment.contains_time(time) {
                return segment.sample(time);
            }
        }
        Err(PlanError::OutOfRange {
            time,
            start: self.start_time().unwrap_or(f64::NAN),
            end: self.end_time().unwrap_or(f64::NAN),
        })
    }

    /// Drop every segment that ends before `start_time`.
    ///
    /// Remaining segments are not retimed, so the new head may still start
    /// earlier than `start_time`. The plan may become empty.
    pub fn change_into_suffix(&mut self, start_time: f64) {
        let first_kept = self
            .segments
            .iter()
            .position(|s| s.end_time() >= start_time)
            .unwrap_or(self.segments.len());
        self.segments.drain(..first_kept);
    }

    /// Samples at [`PLAN_TIME_DENSITY`] spacing from the start of the plan.
    pub fn half_second_samples(&self) -> Vec<State> {
        let mut result = Vec::new();
        let (Ok(start), Ok(end)) = (self.start_time(), self.end_time()) else {
            return result;
        };
        let mut time = start;
        while time < end {
            if let Ok(state) = self.sample(time) {
                result.push(state);
            }
            time += PLAN_TIME_DENSITY;
        }
        result
    }

    /// Advisory flag: the plan traverses non-zero dynamic obstacle cost.
    #[inline]
    pub fn dangerous(&self) -> bool {
        self.dangerous
    }

    pub fn set_dangerous(&mut self, dangerous: bool) {
        self.dangerous = dangerous;
    }
}
