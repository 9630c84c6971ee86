//! # Nauka-Nav: Planning Core for ASV Ribbon Coverage
//!
//! The planning core of an autonomous surface vehicle that drives a boat
//! along a set of *ribbons* (survey lines to be covered) while avoiding
//! static and dynamic obstacles.
//!
//! ## Architecture
//!
//! - [`executive`]: The soft-real-time replanning loop. Owns the ribbon
//!   manager, obstacle managers, map slot and vehicle state; snapshots them
//!   each cycle and hands the snapshots to a planner under a wall-clock
//!   budget.
//! - [`planner`]: Three interchangeable planners over one trait: a reactive
//!   potential-field integrator, an anytime A\* over a Dubins edge graph,
//!   and a BIT\* that plans once to a goal pose.
//! - [`ribbon`]: Coverage accounting and TSP-flavoured cost-to-go
//!   heuristics.
//! - [`obstacles`]: Binary footprint and Gaussian dynamic obstacle models
//!   behind one collision-cost trait.
//! - [`map`]: Static occupancy queries.
//! - [`trajectory`]: The outbound interface to the trajectory follower.
//!
//! ## Data Flow
//!
//! ```text
//!  odometry / tracks / goals           TrajectoryPublisher
//!          │                                   ▲
//!          ▼                                   │ plans, stats, display
//!   ┌─────────────┐   snapshots   ┌────────────┴─┐
//!   │  Executive  ├──────────────►│   Planner    │
//!   │ (worker +   │               │ (PF / A* /   │
//!   │  state)     │◄──────────────┤   BIT*)      │
//!   └─────────────┘  DubinsPlan   └──────────────┘
//! ```

pub mod config;
pub mod error;
pub mod executive;
pub mod map;
pub mod obstacles;
pub mod planner;
pub mod ribbon;
pub mod trajectory;

pub use config::{NavConfig, PlannerConfig, WhichPlanner};
pub use error::{NavError, Result};
pub use executive::{Executive, PlannerState};
pub use map::{EmptyMap, GridMap, Map};
pub use obstacles::{
    BinaryDynamicObstaclesManager, DynamicObstaclesManager, GaussianDynamicObstaclesManager,
};
pub use planner::{AStarPlanner, BitStarPlanner, Planner, PotentialFieldPlanner, Stats};
pub use ribbon::{HeuristicKind, Ribbon, RibbonManager};
pub use trajectory::TrajectoryPublisher;
