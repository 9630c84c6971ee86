//! # Nauka-Plan: Plan Model for ASV Coverage Planning
//!
//! Shared data model for the Nauka path planner: vehicle states, Dubins
//! curve geometry, time-parameterised plans, and the wire format exchanged
//! with the trajectory follower.
//!
//! ## Coordinate Frame
//!
//! Positions are local Cartesian map coordinates in meters. Vehicle headings
//! are compass convention (radians clockwise from north); the Dubins layer
//! works in mathematical yaw (radians counter-clockwise from east). The
//! conversion is `yaw = π/2 − heading` and is handled at the [`State`]
//! boundary.
//!
//! ## Architecture
//!
//! - [`state`]: Pose + speed + time samples of the vehicle
//! - [`dubins`]: Shortest curvature-constrained paths between poses
//! - [`plan`]: Timed Dubins segments and ordered plans
//! - [`wire`]: Serializable plan messages for the controller interface

pub mod dubins;
pub mod error;
pub mod plan;
pub mod state;
pub mod wire;

pub use dubins::{DubinsPath, PathType};
pub use error::{PlanError, Result};
pub use plan::{DubinsPlan, DubinsSegment, PLAN_TIME_DENSITY};
pub use state::State;
pub use wire::{DubinsPathMsg, PlanMsg};
