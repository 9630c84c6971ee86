//! The replanning executive.
//!
//! Owns the authoritative ribbon manager, obstacle managers, map slot and
//! last vehicle state, and runs the soft-real-time planning loop on a worker
//! thread. Each cycle it snapshots the shared state under its locks, selects
//! a planner, plans under the remaining wall-clock budget, hands the plan to
//! the controller and decides from the controller's answer whether the plan
//! survives into the next cycle.
//!
//! Cancellation is cooperative: the worker observes the state flag at the
//! top of each cycle and after blocking steps; a cancelled planner still
//! runs to its time bound but its output is discarded with the cycle.

use crate::config::{NavConfig, PlannerConfig, WhichPlanner};
use crate::error::{NavError, Result};
use crate::map::{EmptyMap, GridMap, Map};
use crate::obstacles::{
    BinaryDynamicObstaclesManager, DynamicObstaclesManager, GaussianDynamicObstaclesManager,
    IgnoreObstacles,
};
use crate::planner::{
    AStarPlanner, BitStarPlanner, Planner, PotentialFieldPlanner, Stats, COLLISION_PENALTY_FACTOR,
    TIME_PENALTY_FACTOR,
};
use crate::ribbon::{HeuristicKind, RibbonManager};
use crate::trajectory::TrajectoryPublisher;
use nauka_plan::{DubinsPlan, State};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Portion of the planning period reserved for everything that is not
/// planning: snapshotting, publishing, the controller round-trip.
const PLANNING_TIME_OVERHEAD: f64 = 0.1;

/// Coverage is only attributed while the heading-change rate stays at or
/// below this, rad/s. A boat sliding through a turn is not surveying.
const COVERAGE_HEADING_RATE_MAX: f64 = 0.5;

/// Bounded wait for a cancellation in flight before a new start gives up.
const START_TIMEOUT: Duration = Duration::from_secs(2);

/// Retain the previous plan as the seed for the next cycle.
const REUSE_PLAN_ENABLED: bool = true;

/// Experimental per-cycle turning radius shrink.
const RADIUS_SHRINK_ENABLED: bool = false;
const RADIUS_SHRINK_AMOUNT: f64 = 0.05;

/// Planner lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    Inactive,
    Running,
    Cancelled,
}

/// Constructs a planner for a cycle. Injectable for tests and alternative
/// planner implementations.
pub type PlannerFactory = Box<dyn Fn(WhichPlanner) -> Box<dyn Planner> + Send + Sync>;

/// Mutable settings shared between the transport threads and the worker.
struct Settings {
    planner_config: PlannerConfig,
    which_planner: WhichPlanner,
    use_gaussian_dynamic_obstacles: bool,
    ignore_dynamic_obstacles: bool,
    planning_time: f64,
}

/// Pending map swap posted by the loader thread.
#[derive(Default)]
struct MapSlot {
    new_map: Option<Arc<dyn Map>>,
}

/// Last vehicle state as reported by odometry, with the previous heading
/// sample for the coverage-rate gate.
#[derive(Default)]
struct VehicleTrack {
    last_state: Option<State>,
    last_heading: f64,
    last_update_time: f64,
}

struct Shared {
    planner_state: Mutex<PlannerState>,
    cancel_cv: Condvar,
    ribbons: Mutex<RibbonManager>,
    binary_obstacles: Mutex<BinaryDynamicObstaclesManager>,
    gaussian_obstacles: Mutex<GaussianDynamicObstaclesManager>,
    map_slot: Mutex<MapSlot>,
    vehicle: Mutex<VehicleTrack>,
    settings: Mutex<Settings>,
    planner_factory: Mutex<Option<PlannerFactory>>,
}

impl Shared {
    fn cancelled(&self) -> bool {
        *self.planner_state.lock() == PlannerState::Cancelled
    }

    fn make_planner(&self, which: WhichPlanner) -> Box<dyn Planner> {
        if let Some(factory) = self.planner_factory.lock().as_ref() {
            return factory(which);
        }
        match which {
            WhichPlanner::PotentialField => Box::new(PotentialFieldPlanner::new()),
            WhichPlanner::AStar => Box::new(AStarPlanner::new()),
            WhichPlanner::BitStar => Box::new(BitStarPlanner::new()),
        }
    }
}

/// The replanning scheduler.
pub struct Executive {
    shared: Arc<Shared>,
    publisher: Arc<dyn TrajectoryPublisher>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Executive {
    pub fn new(publisher: Arc<dyn TrajectoryPublisher>) -> Self {
        Self::with_config(publisher, &NavConfig::default())
    }

    pub fn with_config(publisher: Arc<dyn TrajectoryPublisher>, config: &NavConfig) -> Self {
        let heuristic = config
            .heuristic_kind()
            .unwrap_or(HeuristicKind::TspPointRobotNoSplitAllRibbons);
        let mut ribbons = RibbonManager::new(heuristic, config.turning_radius, config.k);
        ribbons.set_line_width(config.line_width);
        let shared = Shared {
            planner_state: Mutex::new(PlannerState::Inactive),
            cancel_cv: Condvar::new(),
            ribbons: Mutex::new(ribbons),
            binary_obstacles: Mutex::new(BinaryDynamicObstaclesManager::new()),
            gaussian_obstacles: Mutex::new(GaussianDynamicObstaclesManager::new()),
            map_slot: Mutex::new(MapSlot::default()),
            vehicle: Mutex::new(VehicleTrack::default()),
            settings: Mutex::new(Settings {
                planner_config: PlannerConfig::from_nav_config(config),
                which_planner: config.which_planner,
                use_gaussian_dynamic_obstacles: config.use_gaussian_dynamic_obstacles,
                ignore_dynamic_obstacles: config.ignore_dynamic_obstacles,
                planning_time: config.planning_time,
            }),
            planner_factory: Mutex::new(None),
        };
        Self {
            shared: Arc::new(shared),
            publisher,
            worker: Mutex::new(None),
        }
    }

    /// Inject a planner constructor used for every subsequent cycle.
    pub fn set_planner_factory(&self, factory: PlannerFactory) {
        *self.shared.planner_factory.lock() = Some(factory);
    }

    /// Current lifecycle state.
    pub fn planner_state(&self) -> PlannerState {
        *self.shared.planner_state.lock()
    }

    /// Current search horizon, visible for monitoring the failure back-off.
    pub fn time_horizon(&self) -> f64 {
        self.shared.settings.lock().planner_config.time_horizon
    }

    // ---- inbound events -------------------------------------------------

    /// Odometry update: record the vehicle state and attribute coverage,
    /// gated by the heading-change rate.
    pub fn update_covered(&self, x: f64, y: f64, speed: f64, heading: f64, t: f64) {
        let mut vehicle = self.shared.vehicle.lock();
        let rate_ok = match vehicle.last_state {
            Some(_) => {
                let dt = (t - vehicle.last_update_time).max(1e-3);
                ((vehicle.last_heading - heading) / dt).abs() <= COVERAGE_HEADING_RATE_MAX
            }
            None => true,
        };
        if rate_ok {
            self.shared.ribbons.lock().cover(x, y, false);
        }
        vehicle.last_heading = heading;
        vehicle.last_update_time = t;
        vehicle.last_state = Some(State::new(x, y, heading, speed, t));
    }

    /// Replanning period presented downstream.
    pub fn set_planning_time(&self, planning_time: f64) {
        self.shared.settings.lock().planning_time = planning_time;
    }

    pub fn add_ribbon(&self, x1: f64, y1: f64, x2: f64, y2: f64) {
        self.shared.ribbons.lock().add(x1, y1, x2, y2);
        tracing::info!("added ribbon ({}, {}) - ({}, {})", x1, y1, x2, y2);
    }

    /// Reset the ribbon manager to the K-ribbons point-robot heuristic.
    pub fn clear_ribbons(&self) {
        let turning_radius = self.shared.settings.lock().planner_config.turning_radius;
        let mut ribbons = self.shared.ribbons.lock();
        let mut fresh = RibbonManager::new(
            HeuristicKind::TspPointRobotNoSplitKRibbons,
            turning_radius,
            2,
        );
        fresh.set_line_width(ribbons.line_width());
        *ribbons = fresh;
    }

    /// Track update for another vessel, feeding both obstacle models.
    pub fn update_dynamic_obstacle(&self, mmsi: u32, obstacle: State, width: f64, length: f64) {
        self.shared.binary_obstacles.lock().update(
            mmsi,
            obstacle.x,
            obstacle.y,
            obstacle.heading,
            obstacle.speed,
            obstacle.time,
            width,
            length,
        );
        self.shared.gaussian_obstacles.lock().update(
            mmsi,
            obstacle.x,
            obstacle.y,
            obstacle.heading,
            obstacle.speed,
            obstacle.time,
        );
    }

    /// Post an already-loaded map into the slot.
    pub fn set_map(&self, map: Arc<dyn Map>) {
        self.shared.map_slot.lock().new_map = Some(map);
    }

    /// Load a map file on a detached worker and post it into the slot.
    ///
    /// `.map` paths parse as ASCII grids; anything else is a georeferenced
    /// format owned by an external collaborator, so the slot is left
    /// unchanged with a warning. An empty path clears to the empty map.
    /// Errors are swallowed here; the mission continues on the old map.
    pub fn refresh_map(&self, path: String, latitude: f64, longitude: f64) {
        let shared = Arc::clone(&self.shared);
        let publisher = Arc::clone(&self.publisher);
        let result = std::thread::Builder::new()
            .name("map-loader".into())
            .spawn(move || {
                let mut slot = shared.map_slot.lock();
                if path.is_empty() {
                    slot.new_map = Some(Arc::new(EmptyMap));
                    tracing::info!("map cleared, using empty map");
                    publisher.display_map("");
                    return;
                }
                if !path.ends_with(".map") {
                    tracing::warn!(
                        "georeferenced map at {} ({}, {}) must be loaded externally; keeping current map",
                        path,
                        latitude,
                        longitude
                    );
                    return;
                }
                match GridMap::from_map_file(std::path::Path::new(&path)) {
                    Ok(map) => {
                        slot.new_map = Some(Arc::new(map));
                        tracing::info!("loaded map file {}", path);
                        publisher.display_map(&path);
                    }
                    Err(e) => {
                        tracing::warn!("error loading map at {}: {}; map not updated", path, e);
                    }
                }
            });
        if let Err(e) = result {
            tracing::warn!("failed to spawn map loader: {}", e);
        }
    }

    /// Apply a full configuration update.
    pub fn set_configuration(&self, config: &NavConfig) {
        let mut settings = self.shared.settings.lock();
        let map = settings.planner_config.map().clone();
        let mut planner_config = PlannerConfig::from_nav_config(config);
        planner_config.set_map(map);
        settings.planner_config = planner_config;
        settings.which_planner = config.which_planner;
        settings.use_gaussian_dynamic_obstacles = config.use_gaussian_dynamic_obstacles;
        settings.ignore_dynamic_obstacles = config.ignore_dynamic_obstacles;
        settings.planning_time = config.planning_time;
        drop(settings);

        let mut ribbons = self.shared.ribbons.lock();
        match config.heuristic_kind() {
            Some(kind) => ribbons.set_heuristic(kind),
            None => tracing::warn!("unknown heuristic index {}, ignoring", config.heuristic),
        }
        ribbons.set_line_width(config.line_width);
        ribbons.set_turning_radius(config.turning_radius);
    }

    /// Start the planning worker.
    ///
    /// A no-op while already running. A start issued while a cancellation is
    /// still draining waits up to two seconds for the worker to go inactive
    /// and refuses with [`NavError::StartTimeout`] if it does not.
    pub fn start_planner(&self) -> Result<()> {
        let mut state = self.shared.planner_state.lock();
        if *state == PlannerState::Running {
            return Ok(());
        }
        if *state == PlannerState::Cancelled {
            let timed_out = self
                .shared
                .cancel_cv
                .wait_while_for(&mut state, |s| *s == PlannerState::Cancelled, START_TIMEOUT)
                .timed_out();
            if timed_out {
                tracing::error!(
                    "planner start timed out: cancel flag still set from a previous run"
                );
                return Err(NavError::StartTimeout);
            }
        }
        *state = PlannerState::Running;
        drop(state);

        // reap a finished worker before spawning the next
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }

        let shared = Arc::clone(&self.shared);
        let publisher = Arc::clone(&self.publisher);
        let handle = std::thread::Builder::new()
            .name("planner".into())
            .spawn(move || plan_loop(shared, publisher))
            .map_err(|e| NavError::Config(format!("failed to spawn planner thread: {}", e)))?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Request cooperative cancellation of the planning worker.
    pub fn cancel_planner(&self) {
        let mut state = self.shared.planner_state.lock();
        if *state == PlannerState::Running {
            *state = PlannerState::Cancelled;
            tracing::info!("setting cancelled state");
        }
    }

    /// Cancel and wait for the worker to drain.
    pub fn terminate(&self) {
        self.cancel_planner();
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Executive {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// One planning worker run, from start to cancellation or completion.
fn plan_loop(shared: Arc<Shared>, publisher: Arc<dyn TrajectoryPublisher>) {
    let trial_start = publisher.get_time();
    let mut cumulative_collision_penalty = 0.0;
    let mut stats = Stats::default();
    let mut last_plan_achievable = false;
    let mut failure_count = 0u32;
    let mut start_state: Option<State> = None;
    let mut radius_shrink = 0.0;

    tracing::info!("planner worker started");

    loop {
        let cycle_start = publisher.get_time();

        if shared.cancelled() {
            break;
        }

        // mission complete?
        {
            let ribbons = shared.ribbons.lock();
            if ribbons.done() {
                tracing::info!("finished covering ribbons");
                publisher.all_done();
                break;
            }
            publisher.display_ribbons(&ribbons);
        }

        let (mut config, which_planner, use_gaussian, ignore_obstacles, planning_time) = {
            let settings = shared.settings.lock();
            (
                settings.planner_config.clone(),
                settings.which_planner,
                settings.use_gaussian_dynamic_obstacles,
                settings.ignore_dynamic_obstacles,
                settings.planning_time,
            )
        };
        let planning_time_actual = planning_time - PLANNING_TIME_OVERHEAD;

        // continuation state: the controller's answer from last cycle, or an
        // extrapolation of the last odometry fix to the start of the next plan
        let last_state = shared.vehicle.lock().last_state;
        let Some(last_state) = last_state else {
            tracing::warn!("no vehicle state yet, skipping cycle");
            std::thread::sleep(Duration::from_secs_f64(planning_time_actual.max(0.05)));
            continue;
        };
        let start = start_state.take().unwrap_or_else(|| {
            last_state.push(cycle_start + planning_time_actual - last_state.time)
        });

        // swap in a freshly loaded map without waiting on the loader
        if let Some(mut slot) = shared.map_slot.try_lock() {
            if let Some(map) = slot.new_map.take() {
                config.set_map(map.clone());
                shared.settings.lock().planner_config.set_map(map);
            }
            if config.map().is_blocked(start.x, start.y) {
                tracing::warn!(
                    "start state ({:.1}, {:.1}) is blocked per the most recent map; continuing",
                    start.x,
                    start.y
                );
            }
        }

        if !REUSE_PLAN_ENABLED {
            stats.plan = DubinsPlan::new();
        }
        if !stats.plan.empty() {
            stats.plan.change_into_suffix(start.time);
        }

        if RADIUS_SHRINK_ENABLED {
            let mut settings = shared.settings.lock();
            settings.planner_config.turning_radius -= RADIUS_SHRINK_AMOUNT;
            settings.planner_config.coverage_turning_radius -= RADIUS_SHRINK_AMOUNT;
            config.turning_radius = settings.planner_config.turning_radius;
            config.coverage_turning_radius = settings.planner_config.coverage_turning_radius;
            radius_shrink += RADIUS_SHRINK_AMOUNT;
        }

        // instantaneous collision penalty at the last known vehicle state
        let collision_penalty = if use_gaussian {
            shared
                .gaussian_obstacles
                .lock()
                .collision_at_state(&last_state, false)
        } else {
            shared
                .binary_obstacles
                .lock()
                .collision_at_state(&last_state, false)
        };
        cumulative_collision_penalty += collision_penalty;

        // snapshots: the planner never sees shared mutable state
        let obstacles_handle: Arc<dyn DynamicObstaclesManager> = if ignore_obstacles {
            Arc::new(IgnoreObstacles)
        } else if use_gaussian {
            Arc::new(shared.gaussian_obstacles.lock().clone())
        } else {
            Arc::new(shared.binary_obstacles.lock().clone())
        };
        config.set_obstacles(obstacles_handle);

        let mut ribbons_copy = shared.ribbons.lock().clone();
        // the strip from the last fix to the projected start will have been
        // driven by the time the new plan begins
        ribbons_copy.cover_between(last_state.x, last_state.y, start.x, start.y, false);

        // plan, unless BIT* already holds a live plan
        let skip_planning = which_planner == WhichPlanner::BitStar && !stats.plan.empty();
        if skip_planning {
            tracing::info!("BIT* already has a plan, skipping planning this cycle");
        } else {
            let remaining = planning_time_actual - (publisher.get_time() - cycle_start);
            let previous = std::mem::take(&mut stats.plan);
            let mut planner = shared.make_planner(which_planner);
            match planner.plan(ribbons_copy, &start, &config, previous, remaining) {
                Ok(result) => stats = result,
                Err(e) => {
                    tracing::warn!("planner failed: {}; proceeding with empty plan", e);
                    stats = Stats::failure();
                }
            }
        }

        publisher.publish_stats(
            &stats,
            collision_penalty * COLLISION_PENALTY_FACTOR,
            0.0,
            last_plan_achievable,
        );

        // hold the real-time bound
        let elapsed = publisher.get_time() - cycle_start;
        let sleep_time = planning_time_actual - elapsed;
        if sleep_time > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(sleep_time));
        }

        publisher.display_trajectory(
            &stats.plan.half_second_samples(),
            true,
            stats.plan.dangerous(),
        );

        if !stats.plan.empty() {
            failure_count = 0;
            let next = match publisher.publish_plan(&stats.plan, planning_time) {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!("controller unreachable: {}; pausing", e);
                    // cancel so the loop drains on the next check
                    let mut state = shared.planner_state.lock();
                    if *state == PlannerState::Running {
                        *state = PlannerState::Cancelled;
                    }
                    continue;
                }
            };
            // a cancelled controller may answer with a time outside the plan
            if !stats.plan.contains_time(next.time) && shared.cancelled() {
                break;
            }
            let expected = stats.plan.sample(next.time).ok();
            match expected {
                Some(expected) if next.is_co_located(&expected) => {
                    // on track: the plan survives as the next seed
                    start_state = Some(next);
                    last_plan_achievable = true;
                    if RADIUS_SHRINK_ENABLED {
                        radius_shrink += RADIUS_SHRINK_AMOUNT;
                    }
                }
                _ => {
                    // the controller deviated: drop the plan and any
                    // accumulated radius shrink
                    stats.plan = DubinsPlan::new();
                    last_plan_achievable = false;
                    if RADIUS_SHRINK_ENABLED && radius_shrink > 0.0 {
                        let mut settings = shared.settings.lock();
                        settings.planner_config.turning_radius += radius_shrink;
                        settings.planner_config.coverage_turning_radius += radius_shrink;
                        radius_shrink = 0.0;
                    }
                }
            }
        } else {
            tracing::warn!("planner returned empty trajectory");
            failure_count += 1;
            if failure_count > 2 {
                let mut settings = shared.settings.lock();
                let halved = settings.planner_config.time_horizon / 2.0;
                settings.planner_config.time_horizon =
                    halved.max(settings.planner_config.time_minimum);
                tracing::warn!(
                    "failed {} times in a row, reducing time horizon to {}",
                    failure_count,
                    settings.planner_config.time_horizon
                );
                failure_count = 0;
            }
        }
    }

    // task-level stats, published exactly once on exit
    let trial_end = publisher.get_time();
    let wall_clock = trial_end - trial_start;
    let collision_penalty_total = cumulative_collision_penalty * COLLISION_PENALTY_FACTOR;
    let time_penalty = wall_clock * TIME_PENALTY_FACTOR;
    let uncovered_length = shared.ribbons.lock().total_uncovered_length();
    publisher.publish_task_level_stats(
        wall_clock,
        collision_penalty_total,
        time_penalty + collision_penalty_total,
        uncovered_length,
    );

    let mut state = shared.planner_state.lock();
    tracing::info!("setting inactive state");
    *state = PlannerState::Inactive;
    shared.cancel_cv.notify_all();
}
