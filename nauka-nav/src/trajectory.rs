//! Outbound interface to the trajectory follower and display layer.

use crate::error::Result;
use crate::planner::Stats;
use crate::ribbon::RibbonManager;
use nauka_plan::{DubinsPlan, State};

/// Everything the executive publishes, implemented by the external
/// transport. Display calls are best-effort; `publish_plan` is the one
/// round-trip that matters: the controller answers with the state the next
/// plan must begin from.
pub trait TrajectoryPublisher: Send + Sync {
    /// Wall-clock time in seconds. All plan times are in this clock.
    fn get_time(&self) -> f64;

    /// Hand a plan to the controller; returns the state at which the next
    /// plan should start.
    fn publish_plan(&self, plan: &DubinsPlan, planning_time_ideal: f64) -> Result<State>;

    /// Per-cycle planner statistics.
    fn publish_stats(
        &self,
        stats: &Stats,
        collision_penalty: f64,
        score: f64,
        last_plan_achievable: bool,
    );

    /// Once-per-task summary published when the planning loop exits.
    fn publish_task_level_stats(
        &self,
        wall_clock_time: f64,
        cumulative_collision_penalty: f64,
        total_penalty: f64,
        uncovered_length: f64,
    );

    /// Display a trajectory (half-second samples).
    fn display_trajectory(&self, samples: &[State], clear_previous: bool, dangerous: bool) {
        let _ = (samples, clear_previous, dangerous);
    }

    /// Display the current ribbon set.
    fn display_ribbons(&self, ribbons: &RibbonManager) {
        let _ = ribbons;
    }

    /// Display the current map by path; empty string clears it.
    fn display_map(&self, path: &str) {
        let _ = path;
    }

    /// All ribbons are covered; the task is complete.
    fn all_done(&self);
}
