//! End-to-end tests for the replanning executive, driven through a mock
//! trajectory publisher and spy planners injected via the planner factory.

use nauka_nav::config::{NavConfig, WhichPlanner};
use nauka_nav::executive::{Executive, PlannerState};
use nauka_nav::obstacles::DynamicObstaclesManager;
use nauka_nav::planner::{Planner, Stats};
use nauka_nav::trajectory::TrajectoryPublisher;
use nauka_plan::{DubinsPlan, DubinsSegment, State};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Poll `condition` until it holds or `timeout` expires.
fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[derive(Default)]
struct PublisherLog {
    plans_published: usize,
    achievable_flags: Vec<bool>,
    all_done: bool,
    task_stats: Vec<(f64, f64, f64, f64)>,
}

/// Scripted controller: answers `publish_plan` with a state sampled from the
/// plan (on-track) or a far-away state (deviating).
struct MockPublisher {
    epoch: Instant,
    deviate: bool,
    log: Mutex<PublisherLog>,
}

impl MockPublisher {
    fn new(deviate: bool) -> Self {
        Self {
            epoch: Instant::now(),
            deviate,
            log: Mutex::new(PublisherLog::default()),
        }
    }
}

impl TrajectoryPublisher for MockPublisher {
    fn get_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn publish_plan(&self, plan: &DubinsPlan, planning_time_ideal: f64) -> nauka_nav::Result<State> {
        self.log.lock().plans_published += 1;
        let start = plan.start_time().unwrap();
        let end = plan.end_time().unwrap();
        let time = (start + planning_time_ideal).min((start + end) / 2.0);
        if self.deviate {
            // report a position nowhere near the plan
            return Ok(State::new(9999.0, 9999.0, 0.0, 2.0, time));
        }
        Ok(plan.sample(time).unwrap())
    }

    fn publish_stats(
        &self,
        _stats: &Stats,
        _collision_penalty: f64,
        _score: f64,
        last_plan_achievable: bool,
    ) {
        self.log.lock().achievable_flags.push(last_plan_achievable);
    }

    fn publish_task_level_stats(
        &self,
        wall_clock_time: f64,
        cumulative_collision_penalty: f64,
        total_penalty: f64,
        uncovered_length: f64,
    ) {
        self.log.lock().task_stats.push((
            wall_clock_time,
            cumulative_collision_penalty,
            total_penalty,
            uncovered_length,
        ));
    }

    fn all_done(&self) {
        self.log.lock().all_done = true;
    }
}

/// Spy planner: counts invocations, records whether the previous plan was
/// empty, and returns either a long straight plan or nothing.
struct SpyPlanner {
    calls: Arc<AtomicUsize>,
    previous_empty: Arc<Mutex<Vec<bool>>>,
    produce_plan: bool,
}

impl Planner for SpyPlanner {
    fn plan(
        &mut self,
        _ribbons: nauka_nav::RibbonManager,
        start: &State,
        _config: &nauka_nav::PlannerConfig,
        previous: DubinsPlan,
        _time_remaining: f64,
    ) -> nauka_nav::Result<Stats> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.previous_empty.lock().push(previous.empty());
        if !self.produce_plan {
            return Ok(Stats::failure());
        }
        // two minutes of straight running from the requested start
        let mut from = *start;
        from.speed = 2.0;
        let target = from.push(120.0);
        let segment = DubinsSegment::between_states(&from, &target, 8.0)?;
        let mut plan = DubinsPlan::new();
        plan.append(segment);
        Ok(Stats {
            plan,
            final_cost: 120.0,
            ..Default::default()
        })
    }
}

/// Records the collision cost the configured obstacle manager reports at a
/// fixed probe point, and plans nothing.
struct ProbePlanner {
    probe: (f64, f64),
    probed: Arc<Mutex<Vec<f64>>>,
}

impl Planner for ProbePlanner {
    fn plan(
        &mut self,
        _ribbons: nauka_nav::RibbonManager,
        start: &State,
        config: &nauka_nav::PlannerConfig,
        _previous: DubinsPlan,
        _time_remaining: f64,
    ) -> nauka_nav::Result<Stats> {
        self.probed.lock().push(config.obstacles().collision_exists(
            self.probe.0,
            self.probe.1,
            start.time,
            false,
        ));
        Ok(Stats::failure())
    }
}

fn install_probe(executive: &Executive, probe: (f64, f64)) -> Arc<Mutex<Vec<f64>>> {
    let probed = Arc::new(Mutex::new(Vec::new()));
    let shared = Arc::clone(&probed);
    executive.set_planner_factory(Box::new(move |_which| {
        Box::new(ProbePlanner {
            probe,
            probed: Arc::clone(&shared),
        }) as Box<dyn Planner>
    }));
    probed
}

struct Spy {
    calls: Arc<AtomicUsize>,
    previous_empty: Arc<Mutex<Vec<bool>>>,
}

fn install_spy(executive: &Executive, produce_plan: bool) -> Spy {
    let calls = Arc::new(AtomicUsize::new(0));
    let previous_empty = Arc::new(Mutex::new(Vec::new()));
    let spy = Spy {
        calls: Arc::clone(&calls),
        previous_empty: Arc::clone(&previous_empty),
    };
    executive.set_planner_factory(Box::new(move |_which| {
        Box::new(SpyPlanner {
            calls: Arc::clone(&calls),
            previous_empty: Arc::clone(&previous_empty),
            produce_plan,
        }) as Box<dyn Planner>
    }));
    spy
}

fn fast_config(which_planner: WhichPlanner) -> NavConfig {
    NavConfig {
        which_planner,
        planning_time: 0.3,
        time_horizon: 60.0,
        time_minimum: 15.0,
        ..Default::default()
    }
}

#[test]
fn test_all_done_published_when_no_ribbons_remain() {
    let publisher = Arc::new(MockPublisher::new(false));
    let executive = Executive::new(Arc::clone(&publisher) as _);
    executive.start_planner().unwrap();

    assert!(wait_for(
        || publisher.log.lock().all_done,
        Duration::from_secs(3)
    ));
    assert!(wait_for(
        || executive.planner_state() == PlannerState::Inactive,
        Duration::from_secs(3)
    ));
    // task-level stats published exactly once
    assert_eq!(publisher.log.lock().task_stats.len(), 1);
}

#[test]
fn test_double_start_is_noop_and_restart_works() {
    let publisher = Arc::new(MockPublisher::new(false));
    let executive = Executive::with_config(
        Arc::clone(&publisher) as _,
        &fast_config(WhichPlanner::AStar),
    );
    let _spy = install_spy(&executive, true);
    executive.add_ribbon(0.0, 1000.0, 100.0, 1000.0);
    executive.update_covered(0.0, 0.0, 2.0, 0.0, publisher.get_time());

    executive.start_planner().unwrap();
    assert!(wait_for(
        || executive.planner_state() == PlannerState::Running,
        Duration::from_secs(2)
    ));
    // double start: still running, no error
    executive.start_planner().unwrap();
    assert_eq!(executive.planner_state(), PlannerState::Running);

    executive.cancel_planner();
    assert!(wait_for(
        || executive.planner_state() == PlannerState::Inactive,
        Duration::from_secs(3)
    ));

    // a fresh start after the worker drained
    executive.start_planner().unwrap();
    assert!(wait_for(
        || executive.planner_state() == PlannerState::Running,
        Duration::from_secs(2)
    ));
    executive.terminate();
}

#[test]
fn test_bitstar_does_not_replan_while_plan_is_alive() {
    let publisher = Arc::new(MockPublisher::new(false));
    let executive = Executive::with_config(
        Arc::clone(&publisher) as _,
        &fast_config(WhichPlanner::BitStar),
    );
    let spy = install_spy(&executive, true);
    // a ribbon far away keeps the mission unfinished
    executive.add_ribbon(0.0, 1000.0, 100.0, 1000.0);
    executive.update_covered(0.0, 0.0, 2.0, 0.0, publisher.get_time());

    executive.start_planner().unwrap();
    // wait for several full cycles
    assert!(wait_for(
        || publisher.log.lock().plans_published >= 3,
        Duration::from_secs(5)
    ));
    executive.terminate();

    // the plan stayed non-empty, so BIT* planned exactly once
    assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failure_backoff_halves_time_horizon() {
    let publisher = Arc::new(MockPublisher::new(false));
    let mut config = fast_config(WhichPlanner::AStar);
    config.planning_time = 0.15;
    let executive = Executive::with_config(Arc::clone(&publisher) as _, &config);
    let _spy = install_spy(&executive, false);
    executive.add_ribbon(0.0, 1000.0, 100.0, 1000.0);
    executive.update_covered(0.0, 0.0, 2.0, 0.0, publisher.get_time());

    assert_eq!(executive.time_horizon(), 60.0);
    executive.start_planner().unwrap();

    // three consecutive failures: 60 -> 30
    assert!(wait_for(
        || (executive.time_horizon() - 30.0).abs() < 1e-9,
        Duration::from_secs(5)
    ));
    // three more: 30 -> 15, the configured minimum
    assert!(wait_for(
        || (executive.time_horizon() - 15.0).abs() < 1e-9,
        Duration::from_secs(5)
    ));
    // and it never sinks below the floor
    std::thread::sleep(Duration::from_millis(800));
    assert!(executive.time_horizon() >= 15.0 - 1e-9);
    executive.terminate();
}

#[test]
fn test_ignore_dynamic_obstacles_gates_planner_costs() {
    let obstacle_position = (50.0, 1000.0);

    // ignore on: the planner must see zero cost at the tracked vessel
    let publisher = Arc::new(MockPublisher::new(false));
    let mut config = fast_config(WhichPlanner::AStar);
    config.use_gaussian_dynamic_obstacles = true;
    config.ignore_dynamic_obstacles = true;
    let executive = Executive::with_config(Arc::clone(&publisher) as _, &config);
    let probed = install_probe(&executive, obstacle_position);
    executive.add_ribbon(0.0, 1000.0, 100.0, 1000.0);
    let now = publisher.get_time();
    executive.update_dynamic_obstacle(
        1,
        State::new(obstacle_position.0, obstacle_position.1, 0.0, 0.0, now),
        5.0,
        5.0,
    );
    executive.update_covered(0.0, 0.0, 2.0, 0.0, now);
    executive.start_planner().unwrap();
    assert!(wait_for(|| probed.lock().len() >= 2, Duration::from_secs(5)));
    executive.terminate();
    assert!(probed.lock().iter().all(|&cost| cost == 0.0));

    // ignore off: the same setup reports positive Gaussian cost
    let publisher = Arc::new(MockPublisher::new(false));
    let mut config = fast_config(WhichPlanner::AStar);
    config.use_gaussian_dynamic_obstacles = true;
    let executive = Executive::with_config(Arc::clone(&publisher) as _, &config);
    let probed = install_probe(&executive, obstacle_position);
    executive.add_ribbon(0.0, 1000.0, 100.0, 1000.0);
    let now = publisher.get_time();
    executive.update_dynamic_obstacle(
        1,
        State::new(obstacle_position.0, obstacle_position.1, 0.0, 0.0, now),
        5.0,
        5.0,
    );
    executive.update_covered(0.0, 0.0, 2.0, 0.0, now);
    executive.start_planner().unwrap();
    assert!(wait_for(|| probed.lock().len() >= 2, Duration::from_secs(5)));
    executive.terminate();
    assert!(probed.lock().iter().all(|&cost| cost > 0.0));
}

#[test]
fn test_controller_deviation_drops_plan() {
    let publisher = Arc::new(MockPublisher::new(true));
    let executive = Executive::with_config(
        Arc::clone(&publisher) as _,
        &fast_config(WhichPlanner::AStar),
    );
    let spy = install_spy(&executive, true);
    executive.add_ribbon(0.0, 1000.0, 100.0, 1000.0);
    executive.update_covered(0.0, 0.0, 2.0, 0.0, publisher.get_time());

    executive.start_planner().unwrap();
    assert!(wait_for(
        || spy.calls.load(Ordering::SeqCst) >= 3,
        Duration::from_secs(5)
    ));
    executive.terminate();

    // the controller deviated every cycle, so every planning call began
    // from an empty previous plan
    let previous_empty = spy.previous_empty.lock();
    assert!(previous_empty.len() >= 3);
    assert!(previous_empty.iter().all(|&empty| empty));

    // and the deviation was reported downstream
    let log = publisher.log.lock();
    assert!(log.plans_published >= 2);
    assert!(log.achievable_flags.iter().any(|&flag| !flag));
}
