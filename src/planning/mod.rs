//! Planning requests, results and the engine capability.
//!
//! The service never plans on its own: it hands a [`SceneSnapshot`] and a
//! request to a [`PlanningEngine`] and passes the outcome back unchanged. Any
//! backend implementing the trait can be plugged in; [`InterpolationEngine`]
//! is the one bundled with the crate.

mod interpolation;

pub use interpolation::{InterpolationConfig, InterpolationEngine};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::robot::SceneSnapshot;

/// Request to plan a motion for one joint group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Joint group to move
    pub group_name: String,
    /// Start configuration of the group; the scene's current state when absent
    #[serde(default)]
    pub start_positions: Option<Vec<f64>>,
    /// Goal configuration
    pub goal: JointGoal,
    /// Planning budget in seconds
    #[serde(default = "default_planning_time")]
    pub allowed_planning_time: f64,
    /// How many attempts the engine may make
    #[serde(default = "default_attempts")]
    pub num_planning_attempts: u32,
}

/// Joint-space goal with a per-joint tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointGoal {
    /// Target value of every group variable, in group order
    pub positions: Vec<f64>,
    /// Allowed deviation per joint
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_planning_time() -> f64 {
    5.0
}

fn default_attempts() -> u32 {
    1
}

fn default_tolerance() -> f64 {
    1e-3
}

/// Outcome codes carried in a [`PlanResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanErrorCode {
    /// A trajectory was found
    Success,
    /// No trajectory was found
    PlanningFailed,
    /// The request names a group the robot does not have
    InvalidGroupName,
    /// Goal has the wrong size or violates joint limits
    InvalidGoalConstraints,
    /// Start has the wrong size or violates joint limits
    InvalidStartState,
    /// The planning budget ran out
    Timeout,
}

impl fmt::Display for PlanErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            PlanErrorCode::Success => "success",
            PlanErrorCode::PlanningFailed => "planning failed",
            PlanErrorCode::InvalidGroupName => "invalid group name",
            PlanErrorCode::InvalidGoalConstraints => "invalid goal constraints",
            PlanErrorCode::InvalidStartState => "invalid start state",
            PlanErrorCode::Timeout => "timed out",
        };
        f.write_str(text)
    }
}

/// Result of one planning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    /// What happened
    pub error_code: PlanErrorCode,
    /// Trajectory, present only on success
    pub trajectory: Option<JointTrajectory>,
    /// Wall time spent planning, in seconds
    pub planning_time: f64,
}

impl PlanResponse {
    /// Response carrying no trajectory.
    pub fn failure(error_code: PlanErrorCode, planning_time: f64) -> Self {
        PlanResponse { error_code, trajectory: None, planning_time }
    }
}

/// Timed joint-space path of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointTrajectory {
    /// Group the trajectory moves
    pub group_name: String,
    /// Joint names in variable order
    pub joint_names: Vec<String>,
    /// Waypoints, first is the start
    pub points: Vec<TrajectoryPoint>,
}

/// One waypoint of a [`JointTrajectory`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Joint values in variable order
    pub positions: Vec<f64>,
    /// Seconds since the start of the trajectory
    pub time_from_start: f64,
}

impl JointTrajectory {
    /// Sum of joint-space distances between consecutive waypoints.
    pub fn path_length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| joint_distance(&w[0].positions, &w[1].positions))
            .sum()
    }

    /// Time of the final waypoint
    pub fn duration(&self) -> f64 {
        self.points.last().map_or(0.0, |p| p.time_from_start)
    }
}

/// Euclidean distance between two joint vectors of equal length.
pub fn joint_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

/// Request to evaluate one planning problem repeatedly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    /// Problem every run solves
    pub problem: PlanRequest,
    /// Number of runs
    pub runs: u32,
    /// Free-form label echoed into the result
    #[serde(default)]
    pub label: String,
}

/// Metrics of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    /// Whether the run found a trajectory
    pub success: bool,
    /// Outcome code of the run
    pub error_code: PlanErrorCode,
    /// Planning time in seconds
    pub planning_time: f64,
    /// Joint-space path length, zero on failure
    pub path_length: f64,
    /// Number of states the engine explored
    pub explored_states: usize,
}

/// Collected metrics of a benchmark.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Label from the request
    pub label: String,
    /// Per-run metrics, in run order
    pub runs: Vec<BenchmarkRun>,
}

impl BenchmarkResult {
    /// Runs that found a trajectory
    pub fn success_count(&self) -> usize {
        self.runs.iter().filter(|r| r.success).count()
    }

    /// Mean planning time over all runs
    pub fn mean_planning_time(&self) -> f64 {
        mean(self.runs.iter().map(|r| r.planning_time))
    }

    /// Mean path length over successful runs
    pub fn mean_path_length(&self) -> f64 {
        mean(self.runs.iter().filter(|r| r.success).map(|r| r.path_length))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// What a solve produced: the success flag and the response payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    /// Whether the engine considers the solve successful
    pub success: bool,
    /// Response to return to the caller
    pub response: PlanResponse,
}

/// What a benchmark produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkOutcome {
    /// Whether the engine considers the benchmark successful
    pub success: bool,
    /// Metrics to return to the caller
    pub result: BenchmarkResult,
}

/// Configurations sampled by the engine during its most recent solve.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExploredStateRecord {
    /// Group the configurations belong to
    pub group_name: String,
    /// Group variable values, in exploration order
    pub states: Vec<Vec<f64>>,
}

impl ExploredStateRecord {
    /// Number of explored configurations
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether nothing was explored
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Engine self-description for status reports.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    /// Engine name
    pub name: String,
    /// One line per reported fact
    pub details: Vec<String>,
}

/// Motion-planning backend driven by the dispatcher.
///
/// Engines keep a record of the states explored by their most recent solve.
/// The record must be replaced (or cleared) at the start of every solve, so a
/// record read right after `solve` returns always belongs to that solve.
#[cfg_attr(test, mockall::automock)]
pub trait PlanningEngine: Send {
    /// Plans for `request` against `scene`. Failures are reported in the outcome.
    fn solve(&mut self, scene: &SceneSnapshot, request: &PlanRequest) -> SolveOutcome;

    /// Runs `request.runs` solves and collects their metrics.
    fn benchmark(&mut self, scene: &SceneSnapshot, request: &BenchmarkRequest) -> BenchmarkOutcome;

    /// States explored by the most recent solve, if the engine retained any.
    fn last_explored_states(&self) -> Option<Arc<ExploredStateRecord>>;

    /// Engine-internal status.
    fn status(&self) -> EngineStatus;
}
