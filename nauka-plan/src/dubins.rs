//! Shortest Dubins paths between planar poses.
//!
//! A Dubins path is the shortest path between two poses for a vehicle that
//! can only travel forward, either straight or turning at a fixed minimum
//! radius. Every shortest path is one of six words made of L (left arc),
//! R (right arc) and S (straight) segments. A path is stored unwrapped as
//! `(qi, param, kind, rho)`: the initial configuration, the three segment
//! lengths normalised by the turning radius, the word, and the radius.
//!
//! Configurations are `[x, y, yaw]` with yaw counter-clockwise from +x; the
//! compass-heading conversion happens in the [`crate::state`] layer.

use crate::error::{PlanError, Result};
use std::f64::consts::PI;

/// Tolerance applied when sampling at the very end of a path.
const END_SLACK: f64 = 1e-6;

/// Normalize an angle into `[0, 2π)`.
#[inline]
pub fn mod2pi(theta: f64) -> f64 {
    let two_pi = 2.0 * PI;
    let r = theta % two_pi;
    if r < 0.0 { r + two_pi } else { r }
}

/// Normalize an angle into `(-π, π]`.
#[inline]
pub fn normalize_angle(theta: f64) -> f64 {
    let r = mod2pi(theta);
    if r > PI { r - 2.0 * PI } else { r }
}

/// The six Dubins words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathType {
    Lsl,
    Lsr,
    Rsl,
    Rsr,
    Rlr,
    Lrl,
}

/// One leg of a Dubins word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Left,
    Straight,
    Right,
}

impl PathType {
    /// All six words, in wire-index order.
    pub const ALL: [PathType; 6] = [
        PathType::Lsl,
        PathType::Lsr,
        PathType::Rsl,
        PathType::Rsr,
        PathType::Rlr,
        PathType::Lrl,
    ];

    /// Stable index used by the wire format.
    pub fn index(self) -> u8 {
        match self {
            PathType::Lsl => 0,
            PathType::Lsr => 1,
            PathType::Rsl => 2,
            PathType::Rsr => 3,
            PathType::Rlr => 4,
            PathType::Lrl => 5,
        }
    }

    /// Inverse of [`PathType::index`].
    pub fn from_index(index: u8) -> Result<Self> {
        match index {
            0 => Ok(PathType::Lsl),
            1 => Ok(PathType::Lsr),
            2 => Ok(PathType::Rsl),
            3 => Ok(PathType::Rsr),
            4 => Ok(PathType::Rlr),
            5 => Ok(PathType::Lrl),
            other => Err(PlanError::UnknownPathType(other)),
        }
    }

    fn segments(self) -> [SegmentKind; 3] {
        use SegmentKind::*;
        match self {
            PathType::Lsl => [Left, Straight, Left],
            PathType::Lsr => [Left, Straight, Right],
            PathType::Rsl => [Right, Straight, Left],
            PathType::Rsr => [Right, Straight, Right],
            PathType::Rlr => [Right, Left, Right],
            PathType::Lrl => [Left, Right, Left],
        }
    }
}

/// An unwrapped Dubins path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DubinsPath {
    /// Initial configuration `[x, y, yaw]`
    pub qi: [f64; 3],
    /// Segment lengths normalised by `rho`
    pub param: [f64; 3],
    /// Turning radius in meters
    pub rho: f64,
    /// The word
    pub kind: PathType,
}

impl DubinsPath {
    /// Shortest path from `q0` to `q1` with turning radius `rho`.
    ///
    /// Evaluates all six words and keeps the shortest feasible one.
    pub fn shortest(q0: [f64; 3], q1: [f64; 3], rho: f64) -> Result<DubinsPath> {
        let mut best: Option<DubinsPath> = None;
        for kind in PathType::ALL {
            if let Ok(path) = Self::with_type(q0, q1, rho, kind) {
                match &best {
                    Some(b) if b.length() <= path.length() => {}
                    _ => best = Some(path),
                }
            }
        }
        best.ok_or(PlanError::NoPath)
    }

    /// Path of a specific word from `q0` to `q1`, if it exists.
    pub fn with_type(q0: [f64; 3], q1: [f64; 3], rho: f64, kind: PathType) -> Result<DubinsPath> {
        let dx = q1[0] - q0[0];
        let dy = q1[1] - q0[1];
        let big_d = (dx * dx + dy * dy).sqrt();
        let d = big_d / rho;
        // Angle of the inter-pose chord; zero-length chords keep theta 0.
        let theta = if d > 0.0 { mod2pi(dy.atan2(dx)) } else { 0.0 };
        let alpha = mod2pi(q0[2] - theta);
        let beta = mod2pi(q1[2] - theta);

        let param = word_params(alpha, beta, d, kind).ok_or(PlanError::NoPath)?;
        Ok(DubinsPath {
            qi: q0,
            param,
            rho,
            kind,
        })
    }

    /// Total arc length in meters.
    #[inline]
    pub fn length(&self) -> f64 {
        (self.param[0] + self.param[1] + self.param[2]) * self.rho
    }

    /// Configuration at arc length `t` along the path.
    ///
    /// `t` may overshoot the end by a small slack to absorb rounding; beyond
    /// that the call fails `OutOfRange`.
    pub fn sample(&self, t: f64) -> Result<[f64; 3]> {
        let length = self.length();
        if t < -END_SLACK || t > length + END_SLACK {
            return Err(PlanError::OutOfRange {
                time: t,
                start: 0.0,
                end: length,
            });
        }
        let tprime = (t / self.rho).clamp(0.0, self.param[0] + self.param[1] + self.param[2]);
        let kinds = self.kind.segments();

        // Work in the unit-radius frame rooted at the origin.
        let q0 = [0.0, 0.0, self.qi[2]];
        let q1 = dubins_segment(self.param[0], q0, kinds[0]);
        let q2 = dubins_segment(self.param[1], q1, kinds[1]);

        let q = if tprime < self.param[0] {
            dubins_segment(tprime, q0, kinds[0])
        } else if tprime < self.param[0] + self.param[1] {
            dubins_segment(tprime - self.param[0], q1, kinds[1])
        } else {
            dubins_segment(tprime - self.param[0] - self.param[1], q2, kinds[2])
        };

        Ok([
            q[0] * self.rho + self.qi[0],
            q[1] * self.rho + self.qi[1],
            mod2pi(q[2]),
        ])
    }

    /// End configuration of the path.
    pub fn endpoint(&self) -> [f64; 3] {
        // length() is within the sampling slack by construction
        self.sample(self.length()).expect("endpoint is on the path")
    }
}

/// Advance a configuration along one unit-radius segment.
fn dubins_segment(t: f64, qi: [f64; 3], kind: SegmentKind) -> [f64; 3] {
    let (st, ct) = qi[2].sin_cos();
    match kind {
        SegmentKind::Left => [
            qi[0] + (qi[2] + t).sin() - st,
            qi[1] - (qi[2] + t).cos() + ct,
            qi[2] + t,
        ],
        SegmentKind::Right => [
            qi[0] - (qi[2] - t).sin() + st,
            qi[1] + (qi[2] - t).cos() - ct,
            qi[2] - t,
        ],
        SegmentKind::Straight => [qi[0] + ct * t, qi[1] + st * t, qi[2]],
    }
}

/// Normalised segment lengths for one word, if that word is feasible.
fn word_params(alpha: f64, beta: f64, d: f64, kind: PathType) -> Option<[f64; 3]> {
    let (sa, ca) = alpha.sin_cos();
    let (sb, cb) = beta.sin_cos();
    let c_ab = (alpha - beta).cos();

    match kind {
        PathType::Lsl => {
            let tmp0 = d + sa - sb;
            let p_sq = 2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sa - sb);
            if p_sq < 0.0 {
                return None;
            }
            let tmp1 = (cb - ca).atan2(tmp0);
            Some([mod2pi(tmp1 - alpha), p_sq.sqrt(), mod2pi(beta - tmp1)])
        }
        PathType::Rsr => {
            let tmp0 = d - sa + sb;
            let p_sq = 2.0 + d * d - 2.0 * c_ab + 2.0 * d * (sb - sa);
            if p_sq < 0.0 {
                return None;
            }
            let tmp1 = (ca - cb).atan2(tmp0);
            Some([mod2pi(alpha - tmp1), p_sq.sqrt(), mod2pi(tmp1 - beta)])
        }
        PathType::Lsr => {
            let p_sq = -2.0 + d * d + 2.0 * c_ab + 2.0 * d * (sa + sb);
            if p_sq < 0.0 {
                return None;
            }
            let p = p_sq.sqrt();
            let tmp = (-ca - cb).atan2(d + sa + sb) - (-2.0f64).atan2(p);
            Some([mod2pi(tmp - alpha), p, mod2pi(tmp - mod2pi(beta))])
        }
        PathType::Rsl => {
            let p_sq = -2.0 + d * d + 2.0 * c_ab - 2.0 * d * (sa + sb);
            if p_sq < 0.0 {
                return None;
            }
            let p = p_sq.sqrt();
            let tmp = (ca + cb).atan2(d - sa - sb) - 2.0f64.atan2(p);
            Some([mod2pi(alpha - tmp), p, mod2pi(beta - tmp)])
        }
        PathType::Rlr => {
            let tmp0 = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sa - sb)) / 8.0;
            let phi = (ca - cb).atan2(d - sa + sb);
            if tmp0.abs() > 1.0 {
                return None;
            }
            let p = mod2pi(2.0 * PI - tmp0.acos());
            let t = mod2pi(alpha - phi + mod2pi(p / 2.0));
            Some([t, p, mod2pi(alpha - beta - t + mod2pi(p))])
        }
        PathType::Lrl => {
            let tmp0 = (6.0 - d * d + 2.0 * c_ab + 2.0 * d * (sb - sa)) / 8.0;
            let phi = (ca - cb).atan2(d + sa - sb);
            if tmp0.abs() > 1.0 {
                return None;
            }
            let p = mod2pi(2.0 * PI - tmp0.acos());
            let t = mod2pi(-alpha - phi + p / 2.0);
            Some([t, p, mod2pi(mod2pi(beta) - alpha - t + mod2pi(p))])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_straight_line_is_degenerate_csc() {
        // Collinear poses: the shortest path is essentially a straight run.
        let path = DubinsPath::shortest([0.0, 0.0, 0.0], [10.0, 0.0, 0.0], 2.0).unwrap();
        assert_relative_eq!(path.length(), 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_endpoint_reaches_goal() {
        let q0 = [0.0, 0.0, 0.5];
        let q1 = [7.0, -3.0, 2.5];
        let path = DubinsPath::shortest(q0, q1, 1.5).unwrap();
        let end = path.endpoint();
        assert_relative_eq!(end[0], q1[0], epsilon = 1e-6);
        assert_relative_eq!(end[1], q1[1], epsilon = 1e-6);
        assert_relative_eq!(mod2pi(end[2]), mod2pi(q1[2]), epsilon = 1e-6);
    }

    #[test]
    fn test_length_lower_bounded_by_euclidean() {
        let q0 = [0.0, 0.0, 1.0];
        let q1 = [5.0, 4.0, -2.0];
        let path = DubinsPath::shortest(q0, q1, 1.0).unwrap();
        let euclid = (q1[0] * q1[0] + q1[1] * q1[1]).sqrt();
        assert!(path.length() >= euclid - 1e-9);
    }

    #[test]
    fn test_sample_start_matches_qi() {
        let q0 = [3.0, -2.0, 0.7];
        let path = DubinsPath::shortest(q0, [10.0, 5.0, 1.0], 2.0).unwrap();
        let s = path.sample(0.0).unwrap();
        assert_relative_eq!(s[0], q0[0], epsilon = 1e-9);
        assert_relative_eq!(s[1], q0[1], epsilon = 1e-9);
    }

    #[test]
    fn test_sample_out_of_range() {
        let path = DubinsPath::shortest([0.0, 0.0, 0.0], [10.0, 0.0, 0.0], 2.0).unwrap();
        assert!(path.sample(-1.0).is_err());
        assert!(path.sample(path.length() + 1.0).is_err());
    }

    #[test]
    fn test_sample_is_continuous() {
        let path = DubinsPath::shortest([0.0, 0.0, 0.0], [4.0, 4.0, 3.0], 1.0).unwrap();
        let mut prev = path.sample(0.0).unwrap();
        let step = path.length() / 200.0;
        for i in 1..=200 {
            let q = path.sample(step * i as f64).unwrap();
            let jump = ((q[0] - prev[0]).powi(2) + (q[1] - prev[1]).powi(2)).sqrt();
            // No jump can exceed the arc step itself
            assert!(jump <= step + 1e-6, "discontinuity at sample {}", i);
            prev = q;
        }
    }

    #[test]
    fn test_turn_in_place_short_radius() {
        // Same position, opposite heading: needs arcs, length ≥ π·rho.
        let path = DubinsPath::shortest([0.0, 0.0, 0.0], [0.0, 0.0, PI], 1.0).unwrap();
        assert!(path.length() >= PI - 1e-9);
    }

    #[test]
    fn test_path_type_round_trip() {
        for kind in PathType::ALL {
            assert_eq!(PathType::from_index(kind.index()).unwrap(), kind);
        }
        assert!(PathType::from_index(6).is_err());
    }
}
