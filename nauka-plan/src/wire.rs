//! Wire format for plans exchanged with the trajectory follower.
//!
//! Field names are fixed by the downstream controller and must not change.

use crate::dubins::{DubinsPath, PathType};
use crate::error::Result;
use crate::plan::{DubinsPlan, DubinsSegment};
use serde::{Deserialize, Serialize};

/// One Dubins path on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DubinsPathMsg {
    pub initial_x: f64,
    pub initial_y: f64,
    pub initial_yaw: f64,
    pub length0: f64,
    pub length1: f64,
    pub length2: f64,
    #[serde(rename = "type")]
    pub path_type: u8,
    pub rho: f64,
    pub speed: f64,
    pub start_time: f64,
}

/// A full plan on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMsg {
    pub paths: Vec<DubinsPathMsg>,
    pub endtime: f64,
}

impl From<&DubinsSegment> for DubinsPathMsg {
    fn from(segment: &DubinsSegment) -> Self {
        let path = segment.path();
        Self {
            initial_x: path.qi[0],
            initial_y: path.qi[1],
            initial_yaw: path.qi[2],
            length0: path.param[0],
            length1: path.param[1],
            length2: path.param[2],
            path_type: path.kind.index(),
            rho: path.rho,
            speed: segment.speed(),
            start_time: segment.start_time(),
        }
    }
}

impl DubinsPathMsg {
    /// Reconstruct the timed segment this message describes.
    pub fn to_segment(&self) -> Result<DubinsSegment> {
        let path = DubinsPath {
            qi: [self.initial_x, self.initial_y, self.initial_yaw],
            param: [self.length0, self.length1, self.length2],
            rho: self.rho,
            kind: PathType::from_index(self.path_type)?,
        };
        Ok(DubinsSegment::new(path, self.speed, self.start_time))
    }
}

impl From<&DubinsPlan> for PlanMsg {
    fn from(plan: &DubinsPlan) -> Self {
        Self {
            paths: plan.segments().iter().map(DubinsPathMsg::from).collect(),
            endtime: plan.end_time().unwrap_or(0.0),
        }
    }
}

impl PlanMsg {
    /// Reconstruct the plan this message describes.
    pub fn to_plan(&self) -> Result<DubinsPlan> {
        let mut plan = DubinsPlan::new();
        for msg in &self.paths {
            plan.append(msg.to_segment()?);
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::State;
    use approx::assert_relative_eq;

    fn curvy_plan() -> DubinsPlan {
        let a = State::new(0.0, 0.0, 0.3, 2.0, 100.0);
        let b = State::new(40.0, 25.0, 1.8, 2.0, 0.0);
        let first = DubinsSegment::between_states(&a, &b, 8.0).unwrap();
        let mid = first.end_state();
        let c = State::new(80.0, -10.0, -0.5, 2.0, 0.0);
        let second = DubinsSegment::between_states(&mid, &c, 8.0).unwrap();
        let mut plan = DubinsPlan::new();
        plan.append(first);
        plan.append(second);
        plan
    }

    #[test]
    fn test_round_trip_preserves_samples() {
        // Serialize to the wire, reconstruct, and compare at every
        // half-second offset.
        let plan = curvy_plan();
        let msg = PlanMsg::from(&plan);
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: PlanMsg = serde_json::from_str(&json).unwrap();
        let rebuilt = parsed.to_plan().unwrap();

        let original = plan.half_second_samples();
        let recovered = rebuilt.half_second_samples();
        assert_eq!(original.len(), recovered.len());
        for (a, b) in original.iter().zip(&recovered) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
            assert_relative_eq!(a.heading, b.heading, epsilon = 1e-9);
            assert_relative_eq!(a.time, b.time, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_wire_field_names() {
        let plan = curvy_plan();
        let json = serde_json::to_string(&PlanMsg::from(&plan)).unwrap();
        for field in [
            "initial_x",
            "initial_yaw",
            "length0",
            "\"type\"",
            "rho",
            "start_time",
            "endtime",
        ] {
            assert!(json.contains(field), "missing wire field {}", field);
        }
    }

    #[test]
    fn test_unknown_path_type_rejected() {
        let mut msg = PlanMsg::from(&curvy_plan());
        msg.paths[0].path_type = 9;
        assert!(msg.to_plan().is_err());
    }
}
