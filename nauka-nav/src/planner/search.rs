//! Shared search plumbing for the graph planners.
//!
//! Vertices live in an arena and refer to their parents by index, so the
//! search tree has no reference cycles and tracing back an incumbent is a
//! walk over `Vec` entries.

use super::{COLLISION_PENALTY_FACTOR, TIME_PENALTY_FACTOR};
use crate::map::Map;
use crate::obstacles::DynamicObstaclesManager;
use crate::ribbon::RibbonManager;
use nauka_plan::{DubinsPlan, DubinsSegment, State};
use std::cmp::Ordering;

/// States along a segment at the collision-checking arc increment,
/// endpoints included.
pub fn sample_states(segment: &DubinsSegment, increment: f64) -> Vec<State> {
    let duration = segment.end_time() - segment.start_time();
    let dt = increment / segment.speed().max(1e-6);
    let steps = (duration / dt).ceil().max(1.0) as usize;
    let mut result = Vec::with_capacity(steps + 1);
    for i in 0..=steps {
        let time = segment.start_time() + duration * i as f64 / steps as f64;
        if let Ok(state) = segment.sample(time) {
            result.push(state);
        }
    }
    result
}

/// Outcome of walking one candidate edge.
#[derive(Debug, Clone, Copy)]
pub struct EdgeEvaluation {
    /// False when the edge crosses a blocked cell
    pub feasible: bool,
    /// Time spent on the edge, seconds
    pub duration: f64,
    /// Integrated dynamic-obstacle cost
    pub collision: f64,
}

impl EdgeEvaluation {
    /// Blended edge cost.
    pub fn cost(&self) -> f64 {
        self.duration * TIME_PENALTY_FACTOR + self.collision * COLLISION_PENALTY_FACTOR
    }

    fn infeasible() -> Self {
        Self {
            feasible: false,
            duration: 0.0,
            collision: 0.0,
        }
    }
}

/// Walk an edge, checking the static map, integrating dynamic-obstacle cost
/// and optionally attributing ribbon coverage along the way.
pub fn evaluate_edge(
    segment: &DubinsSegment,
    map: &dyn Map,
    obstacles: &dyn DynamicObstaclesManager,
    increment: f64,
    mut cover: Option<&mut RibbonManager>,
) -> EdgeEvaluation {
    let samples = sample_states(segment, increment);
    if samples.is_empty() {
        return EdgeEvaluation::infeasible();
    }
    let dt = if samples.len() > 1 {
        (segment.end_time() - segment.start_time()) / (samples.len() - 1) as f64
    } else {
        0.0
    };
    let mut collision = 0.0;
    for state in &samples {
        if map.is_blocked(state.x, state.y) {
            return EdgeEvaluation::infeasible();
        }
        collision += obstacles.collision_at_state(state, false) * dt;
        if let Some(ribbons) = cover.as_deref_mut() {
            ribbons.cover(state.x, state.y, true);
        }
    }
    EdgeEvaluation {
        feasible: true,
        duration: segment.end_time() - segment.start_time(),
        collision,
    }
}

/// A search-tree vertex.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub state: State,
    /// Arena index of the parent, if any
    pub parent: Option<usize>,
    /// Edge from the parent to this vertex
    pub segment: Option<DubinsSegment>,
    /// Coverage state after traversing the path to this vertex
    pub ribbons: RibbonManager,
    /// Cost from the root
    pub g: f64,
    /// Heuristic cost-to-go
    pub h: f64,
    /// Dynamic-obstacle cost accumulated from the root
    pub collision: f64,
}

impl Vertex {
    #[inline]
    pub fn f(&self) -> f64 {
        self.g + self.h
    }
}

/// Flat vertex store with parent-index links.
#[derive(Debug, Default)]
pub struct Arena {
    vertices: Vec<Vertex>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, vertex: Vertex) -> usize {
        self.vertices.push(vertex);
        self.vertices.len() - 1
    }

    #[inline]
    pub fn get(&self, index: usize) -> &Vertex {
        &self.vertices[index]
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Rebuild the plan ending at `index` by walking parent links.
    ///
    /// The dangerous flag is set when the traced path accumulated any
    /// dynamic-obstacle cost.
    pub fn trace_plan(&self, index: usize) -> DubinsPlan {
        let mut segments = Vec::new();
        let mut current = Some(index);
        let dangerous = self.vertices[index].collision > 0.0;
        while let Some(i) = current {
            let vertex = &self.vertices[i];
            if let Some(segment) = vertex.segment {
                segments.push(segment);
            }
            current = vertex.parent;
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

/// Open-set entry ordered for a min-heap on (f, h, g, insertion order).
#[derive(Debug, Clone, Copy)]
pub struct HeapNode {
    pub index: usize,
    pub f: f64,
    pub h: f64,
    pub g: f64,
    /// Insertion sequence number, the final tie-break
    pub seq: usize,
}

impl PartialEq for HeapNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapNode {}

impl Ord for HeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; lower f wins, then lower h, then
        // lower g, then earlier insertion.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.h.partial_cmp(&self.h).unwrap_or(Ordering::Equal))
            .then_with(|| other.g.partial_cmp(&self.g).unwrap_or(Ordering::Equal))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
