// src/planning/interpolation.rs
// Joint-space interpolation backend. Walks the straight segment from start to
// goal, recording every sample as an explored state, so the service can run
// and be exercised without an external planner attached.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::{
    BenchmarkOutcome, BenchmarkRequest, BenchmarkResult, BenchmarkRun, EngineStatus, ExploredStateRecord,
    JointTrajectory, PlanErrorCode, PlanRequest, PlanResponse, PlanningEngine, SolveOutcome, TrajectoryPoint,
};
use crate::ConfigError;
use crate::robot::SceneSnapshot;
use crate::robot::model::{JointGroup, KinematicModel};

const BOUNDS_MARGIN: f64 = 1e-9;
const MAX_PREALLOCATED: usize = 4096;

/// Tuning of the interpolation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// Largest per-joint change between consecutive samples
    pub max_step: f64,
    /// Per-joint velocity used to time the trajectory
    pub max_velocity: f64,
    /// Samples the engine may explore per second of planning budget
    pub max_samples_per_second: f64,
    /// Largest run count a benchmark request may ask for
    pub max_benchmark_runs: u32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        InterpolationConfig {
            max_step: 0.05,
            max_velocity: 0.5,
            max_samples_per_second: 10_000.0,
            max_benchmark_runs: 1000,
        }
    }
}

/// Straight-line joint-space planner.
pub struct InterpolationEngine {
    config: InterpolationConfig,
    last_explored: Option<Arc<ExploredStateRecord>>,
    solves: u64,
    successes: u64,
}

impl InterpolationEngine {
    /// Creates the engine, rejecting non-positive step or velocity.
    pub fn new(config: InterpolationConfig) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("max_step", config.max_step),
            ("max_velocity", config.max_velocity),
            ("max_samples_per_second", config.max_samples_per_second),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidValue { field: name.to_string(), reason: format!("must be positive, got {value}") });
            }
        }
        Ok(InterpolationEngine { config, last_explored: None, solves: 0, successes: 0 })
    }

    fn plan(&self, scene: &SceneSnapshot, request: &PlanRequest) -> Result<JointTrajectory, Failure> {
        let model = scene.model();
        let group = model.group(&request.group_name).ok_or(Failure::bare(PlanErrorCode::InvalidGroupName))?;

        let start = match &request.start_positions {
            Some(start) => start.clone(),
            None => scene
                .robot_state()
                .group_positions(&request.group_name)
                .map_err(|_| Failure::bare(PlanErrorCode::InvalidStartState))?,
        };
        if !within_bounds(model, group, &start, BOUNDS_MARGIN) {
            return Err(Failure::bare(PlanErrorCode::InvalidStartState));
        }
        let goal = &request.goal;
        if !(goal.tolerance.is_finite() && goal.tolerance >= 0.0)
            || !within_bounds(model, group, &goal.positions, goal.tolerance + BOUNDS_MARGIN)
        {
            return Err(Failure::bare(PlanErrorCode::InvalidGoalConstraints));
        }

        let largest_move = start
            .iter()
            .zip(&goal.positions)
            .map(|(s, g)| (g - s).abs())
            .fold(0.0, f64::max);
        if !largest_move.is_finite() {
            return Err(Failure::bare(PlanErrorCode::InvalidGoalConstraints));
        }
        // Float-to-int `as` saturates; keep `steps + 1` representable.
        let steps = ((largest_move / self.config.max_step).ceil().max(1.0) as usize).min(usize::MAX - 1);
        let budget = if request.allowed_planning_time.is_finite() && request.allowed_planning_time > 0.0 {
            (self.config.max_samples_per_second * request.allowed_planning_time).floor() as usize
        } else {
            0
        };
        let dt = largest_move / steps as f64 / self.config.max_velocity;

        let capacity = (steps + 1).min(budget).min(MAX_PREALLOCATED);
        let mut explored = Vec::with_capacity(capacity);
        let mut points = Vec::with_capacity(capacity);
        for i in 0..=steps {
            if explored.len() >= budget {
                debug!("Sample budget of {} exhausted after {} of {} samples", budget, i, steps + 1);
                return Err(Failure { code: PlanErrorCode::Timeout, explored: Some(explored) });
            }
            let t = i as f64 / steps as f64;
            let q: Vec<f64> = start.iter().zip(&goal.positions).map(|(s, g)| s + (g - s) * t).collect();
            explored.push(q.clone());
            points.push(TrajectoryPoint { positions: q, time_from_start: dt * i as f64 });
        }

        Ok(JointTrajectory {
            group_name: request.group_name.clone(),
            joint_names: model.group_joint_names(group),
            points,
        })
    }
}

struct Failure {
    code: PlanErrorCode,
    explored: Option<Vec<Vec<f64>>>,
}

impl Failure {
    fn bare(code: PlanErrorCode) -> Self {
        Failure { code, explored: None }
    }
}

fn within_bounds(model: &KinematicModel, group: &JointGroup, values: &[f64], margin: f64) -> bool {
    values.len() == group.variable_count()
        && model.group_joint_models(group).zip(values).all(|(joint, &q)| joint.satisfies_bounds(q, margin))
}

impl PlanningEngine for InterpolationEngine {
    fn solve(&mut self, scene: &SceneSnapshot, request: &PlanRequest) -> SolveOutcome {
        let started = Instant::now();
        self.last_explored = None;
        self.solves += 1;

        let record = |states: Vec<Vec<f64>>| {
            Arc::new(ExploredStateRecord { group_name: request.group_name.clone(), states })
        };
        let (success, response) = match self.plan(scene, request) {
            Ok(trajectory) => {
                self.successes += 1;
                self.last_explored = Some(record(trajectory.points.iter().map(|p| p.positions.clone()).collect()));
                let response = PlanResponse {
                    error_code: PlanErrorCode::Success,
                    trajectory: Some(trajectory),
                    planning_time: started.elapsed().as_secs_f64(),
                };
                (true, response)
            }
            Err(failure) => {
                self.last_explored = failure.explored.map(record);
                (false, PlanResponse::failure(failure.code, started.elapsed().as_secs_f64()))
            }
        };
        info!(
            "Interpolation solve for group '{}': {} ({} explored states)",
            request.group_name,
            response.error_code,
            self.last_explored.as_ref().map_or(0, |r| r.len())
        );
        SolveOutcome { success, response }
    }

    fn benchmark(&mut self, scene: &SceneSnapshot, request: &BenchmarkRequest) -> BenchmarkOutcome {
        if request.runs > self.config.max_benchmark_runs {
            warn!(
                "Benchmark '{}' asks for {} runs, more than the allowed {}",
                request.label, request.runs, self.config.max_benchmark_runs
            );
            return BenchmarkOutcome { success: false, result: BenchmarkResult { label: request.label.clone(), runs: Vec::new() } };
        }
        let capacity = (request.runs as usize).min(MAX_PREALLOCATED);
        let mut result = BenchmarkResult { label: request.label.clone(), runs: Vec::with_capacity(capacity) };
        for _ in 0..request.runs {
            let outcome = self.solve(scene, &request.problem);
            result.runs.push(BenchmarkRun {
                success: outcome.success,
                error_code: outcome.response.error_code,
                planning_time: outcome.response.planning_time,
                path_length: outcome.response.trajectory.as_ref().map_or(0.0, |t| t.path_length()),
                explored_states: self.last_explored.as_ref().map_or(0, |r| r.len()),
            });
        }
        BenchmarkOutcome { success: result.success_count() > 0, result }
    }

    fn last_explored_states(&self) -> Option<Arc<ExploredStateRecord>> {
        self.last_explored.clone()
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            name: "interpolation".to_string(),
            details: vec![
                format!("max step {} per sample, max velocity {}", self.config.max_step, self.config.max_velocity),
                format!("sample budget {} per second of planning time", self.config.max_samples_per_second),
                format!("{} solves served, {} successful", self.solves, self.successes),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::model::tests::TWO_LINK_ARM;
    use crate::robot::{KinematicModel, KinematicState};
    use crate::planning::JointGoal;
    use approx::assert_relative_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn scene() -> SceneSnapshot {
        let model = Arc::new(KinematicModel::from_yaml_str(TWO_LINK_ARM).unwrap());
        SceneSnapshot::new(KinematicState::new(model))
    }

    fn engine(max_step: f64) -> InterpolationEngine {
        InterpolationEngine::new(InterpolationConfig { max_step, ..Default::default() }).unwrap()
    }

    fn request(goal: [f64; 2]) -> PlanRequest {
        PlanRequest {
            group_name: "arm".into(),
            start_positions: None,
            goal: JointGoal { positions: goal.to_vec(), tolerance: 1e-3 },
            allowed_planning_time: 1.0,
            num_planning_attempts: 1,
        }
    }

    #[rstest]
    fn samples_straight_segment_and_records_it(scene: SceneSnapshot) {
        let mut engine = engine(0.25);
        let outcome = engine.solve(&scene, &request([1.0, -0.5]));

        assert!(outcome.success);
        let traj = outcome.response.trajectory.unwrap();
        assert_eq!(traj.joint_names, vec!["shoulder", "elbow"]);
        assert_eq!(traj.points.len(), 5);
        assert_eq!(traj.points[4].positions, vec![1.0, -0.5]);
        assert_relative_eq!(traj.duration(), 2.0);

        let record = engine.last_explored_states().unwrap();
        assert_eq!(record.group_name, "arm");
        assert_eq!(record.len(), 5);
        assert_eq!(record.states[2], vec![0.5, -0.25]);
    }

    #[rstest]
    #[case::unknown_group("legs", [0.0, 0.0], PlanErrorCode::InvalidGroupName)]
    #[case::goal_out_of_limits("arm", [4.0, 0.0], PlanErrorCode::InvalidGoalConstraints)]
    fn invalid_requests_fail_without_record(
        scene: SceneSnapshot,
        #[case] group: &str,
        #[case] goal: [f64; 2],
        #[case] code: PlanErrorCode,
    ) {
        let mut engine = engine(0.1);
        engine.solve(&scene, &request([0.1, 0.1]));
        assert!(engine.last_explored_states().is_some());

        let mut req = request(goal);
        req.group_name = group.into();
        let outcome = engine.solve(&scene, &req);
        assert!(!outcome.success);
        assert_eq!(outcome.response.error_code, code);
        assert!(outcome.response.trajectory.is_none());
        assert!(engine.last_explored_states().is_none());
    }

    #[rstest]
    fn exhausted_budget_keeps_partial_record(scene: SceneSnapshot) {
        let mut engine = InterpolationEngine::new(InterpolationConfig {
            max_step: 0.1,
            max_velocity: 1.0,
            max_samples_per_second: 3.0,
            ..Default::default()
        })
        .unwrap();
        let outcome = engine.solve(&scene, &request([1.0, 0.0]));

        assert!(!outcome.success);
        assert_eq!(outcome.response.error_code, PlanErrorCode::Timeout);
        assert_eq!(engine.last_explored_states().unwrap().len(), 3);
    }

    #[rstest]
    fn benchmark_aggregates_runs(scene: SceneSnapshot) {
        let mut engine = engine(0.5);
        let outcome = engine.benchmark(
            &scene,
            &BenchmarkRequest { problem: request([1.0, 0.0]), runs: 3, label: "reach".into() },
        );
        assert!(outcome.success);
        assert_eq!(outcome.result.label, "reach");
        assert_eq!(outcome.result.success_count(), 3);
        assert!(outcome.result.runs.iter().all(|r| r.explored_states == 3));
        assert_relative_eq!(outcome.result.mean_path_length(), 1.0);

        let empty = engine.benchmark(&scene, &BenchmarkRequest { problem: request([1.0, 0.0]), runs: 0, label: String::new() });
        assert!(!empty.success);
    }

    const TURNTABLE: &str = r#"
name: turntable
root_link: base
joints:
  - { name: spin, type: continuous, parent: base, child: plate }
groups:
  - { name: table, joints: [spin] }
"#;

    fn turntable_request(start: f64, goal: f64) -> (SceneSnapshot, PlanRequest) {
        let model = Arc::new(KinematicModel::from_yaml_str(TURNTABLE).unwrap());
        let request = PlanRequest {
            group_name: "table".into(),
            start_positions: Some(vec![start]),
            goal: JointGoal { positions: vec![goal], tolerance: 1e-3 },
            allowed_planning_time: 1.0,
            num_planning_attempts: 1,
        };
        (SceneSnapshot::new(KinematicState::new(model)), request)
    }

    #[rstest]
    #[case::far_goal(1e13)]
    #[case::astronomical_goal(1e300)]
    fn unbounded_goal_runs_out_of_budget(#[case] goal: f64) {
        let (scene, request) = turntable_request(0.0, goal);
        let mut engine = engine(0.05);
        let outcome = engine.solve(&scene, &request);

        assert!(!outcome.success);
        assert_eq!(outcome.response.error_code, PlanErrorCode::Timeout);
        assert_eq!(engine.last_explored_states().unwrap().len(), 10_000);
    }

    #[test]
    fn overflowing_joint_distance_is_an_invalid_goal() {
        let (scene, request) = turntable_request(-1e308, 1e308);
        let outcome = engine(0.05).solve(&scene, &request);
        assert_eq!(outcome.response.error_code, PlanErrorCode::InvalidGoalConstraints);
    }

    #[rstest]
    fn oversized_benchmark_is_refused_without_running(scene: SceneSnapshot) {
        let mut engine = engine(0.5);
        let outcome = engine.benchmark(
            &scene,
            &BenchmarkRequest { problem: request([1.0, 0.0]), runs: i32::MAX as u32, label: "huge".into() },
        );
        assert!(!outcome.success);
        assert!(outcome.result.runs.is_empty());
        assert!(engine.last_explored_states().is_none());
    }

    #[test]
    fn rejects_non_positive_tuning() {
        assert!(InterpolationEngine::new(InterpolationConfig { max_step: 0.0, ..Default::default() }).is_err());
        assert!(InterpolationEngine::new(InterpolationConfig { max_velocity: f64::NAN, ..Default::default() }).is_err());
    }
}
