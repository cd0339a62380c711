// src/ros_interface/messages.rs
// Conversions between the planner's types and ROS messages.

use r2r::builtin_interfaces::msg::{Duration as RosDuration, Time as RosTime};
use r2r::geometry_msgs::msg::{Point, Pose, Quaternion, Vector3};
use r2r::moveit_msgs::msg::{MotionPlanRequest, MotionPlanResponse, MoveItErrorCodes};
use r2r::std_msgs::msg::{ColorRGBA, Header};
use r2r::trajectory_msgs::msg::{JointTrajectory as RosJointTrajectory, JointTrajectoryPoint};
use r2r::visualization_msgs::msg::{Marker, MarkerArray};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::planning::{BenchmarkRequest, JointGoal, PlanErrorCode, PlanRequest, PlanResponse};
use crate::robot::KinematicModel;
use crate::visualization::{MarkerBatch, MarkerRecord, MarkerShape};

// visualization_msgs/Marker constants
const MARKER_SPHERE: i32 = 2;
const MARKER_ADD: i32 = 0;

// moveit_msgs/MoveItErrorCodes constants
const MOVEIT_SUCCESS: i32 = 1;
const MOVEIT_PLANNING_FAILED: i32 = -1;
const MOVEIT_TIMED_OUT: i32 = -6;
const MOVEIT_INVALID_GROUP_NAME: i32 = -15;
const MOVEIT_INVALID_GOAL_CONSTRAINTS: i32 = -16;
const MOVEIT_INVALID_ROBOT_STATE: i32 = -17;

/// Converts a wall-clock instant to a ROS time stamp.
pub fn to_ros_time(t: SystemTime) -> RosTime {
    let since_epoch = t.duration_since(UNIX_EPOCH).unwrap_or_default();
    RosTime {
        sec: i32::try_from(since_epoch.as_secs()).unwrap_or(i32::MAX),
        nanosec: since_epoch.subsec_nanos(),
    }
}

/// Converts a span to a ROS duration.
pub fn to_ros_duration(d: Duration) -> RosDuration {
    RosDuration {
        sec: i32::try_from(d.as_secs()).unwrap_or(i32::MAX),
        nanosec: d.subsec_nanos(),
    }
}

fn to_ros_marker(m: &MarkerRecord) -> Marker {
    Marker {
        header: Header { stamp: to_ros_time(m.stamp), frame_id: m.frame_id.clone() },
        ns: m.namespace.clone(),
        id: i32::try_from(m.id).unwrap_or(i32::MAX),
        type_: match m.shape {
            MarkerShape::Sphere => MARKER_SPHERE,
        },
        action: MARKER_ADD,
        pose: Pose {
            position: Point { x: m.position.x, y: m.position.y, z: m.position.z },
            orientation: Quaternion {
                x: m.orientation.i,
                y: m.orientation.j,
                z: m.orientation.k,
                w: m.orientation.w,
            },
        },
        scale: Vector3 { x: m.scale.x, y: m.scale.y, z: m.scale.z },
        color: ColorRGBA { r: m.color.r, g: m.color.g, b: m.color.b, a: m.color.a },
        lifetime: to_ros_duration(m.lifetime),
        ..Default::default()
    }
}

/// Converts a batch to one marker array message.
pub fn to_marker_array(batch: &MarkerBatch) -> MarkerArray {
    MarkerArray { markers: batch.markers.iter().map(to_ros_marker).collect() }
}

/// Builds a [`PlanRequest`] from a MoveIt request.
///
/// The start state and the first goal's joint constraints are reordered into
/// the group's variable order. Fails with the error code to send back when the
/// request cannot be expressed in joint space for the group.
pub fn plan_request_from_ros(req: &MotionPlanRequest, model: &KinematicModel) -> Result<PlanRequest, PlanErrorCode> {
    let group = model.group(&req.group_name).ok_or(PlanErrorCode::InvalidGroupName)?;
    let joint_names = model.group_joint_names(group);

    let js = &req.start_state.joint_state;
    let start_positions = if js.name.is_empty() {
        None
    } else {
        let lookup = |name: &String| js.name.iter().position(|n| n == name).and_then(|i| js.position.get(i).copied());
        let start: Option<Vec<f64>> = joint_names.iter().map(lookup).collect();
        Some(start.ok_or(PlanErrorCode::InvalidStartState)?)
    };

    let constraints = req.goal_constraints.first().ok_or(PlanErrorCode::InvalidGoalConstraints)?;
    let mut tolerance = f64::INFINITY;
    let mut positions = Vec::with_capacity(joint_names.len());
    for name in &joint_names {
        let c = constraints
            .joint_constraints
            .iter()
            .find(|c| &c.joint_name == name)
            .ok_or(PlanErrorCode::InvalidGoalConstraints)?;
        tolerance = tolerance.min(c.tolerance_above).min(c.tolerance_below);
        positions.push(c.position);
    }

    Ok(PlanRequest {
        group_name: req.group_name.clone(),
        start_positions,
        goal: JointGoal { positions, tolerance: if tolerance.is_finite() { tolerance.max(0.0) } else { 0.0 } },
        allowed_planning_time: req.allowed_planning_time,
        num_planning_attempts: u32::try_from(req.num_planning_attempts).unwrap_or(0).max(1),
    })
}

/// Benchmark framing over the plan request type: attempts become runs.
pub fn benchmark_request_from_ros(req: &MotionPlanRequest, model: &KinematicModel) -> Result<BenchmarkRequest, PlanErrorCode> {
    let mut problem = plan_request_from_ros(req, model)?;
    let runs = problem.num_planning_attempts;
    problem.num_planning_attempts = 1;
    Ok(BenchmarkRequest {
        problem,
        runs,
        label: if req.planner_id.is_empty() { req.group_name.clone() } else { req.planner_id.clone() },
    })
}

fn to_moveit_code(code: PlanErrorCode) -> i32 {
    match code {
        PlanErrorCode::Success => MOVEIT_SUCCESS,
        PlanErrorCode::PlanningFailed => MOVEIT_PLANNING_FAILED,
        PlanErrorCode::InvalidGroupName => MOVEIT_INVALID_GROUP_NAME,
        PlanErrorCode::InvalidGoalConstraints => MOVEIT_INVALID_GOAL_CONSTRAINTS,
        PlanErrorCode::InvalidStartState => MOVEIT_INVALID_ROBOT_STATE,
        PlanErrorCode::Timeout => MOVEIT_TIMED_OUT,
    }
}

/// Converts a [`PlanResponse`] to a MoveIt response.
pub fn plan_response_to_ros(group_name: &str, frame_id: &str, res: &PlanResponse) -> MotionPlanResponse {
    let mut out = MotionPlanResponse {
        group_name: group_name.to_string(),
        planning_time: res.planning_time,
        error_code: MoveItErrorCodes { val: to_moveit_code(res.error_code), ..Default::default() },
        ..Default::default()
    };
    if let Some(traj) = &res.trajectory {
        out.trajectory.joint_trajectory = RosJointTrajectory {
            header: Header { frame_id: frame_id.to_string(), ..Default::default() },
            joint_names: traj.joint_names.clone(),
            points: traj
                .points
                .iter()
                .map(|p| JointTrajectoryPoint {
                    positions: p.positions.clone(),
                    time_from_start: to_ros_duration(Duration::from_secs_f64(p.time_from_start.max(0.0))),
                    ..Default::default()
                })
                .collect(),
        };
        if let Some(first) = traj.points.first() {
            out.trajectory_start.joint_state.name = traj.joint_names.clone();
            out.trajectory_start.joint_state.position = first.positions.clone();
        }
    }
    out
}

/// Reply carrying only an error code and a planning time.
pub fn bare_response(group_name: &str, code: PlanErrorCode, planning_time: f64) -> MotionPlanResponse {
    plan_response_to_ros(group_name, "", &PlanResponse::failure(code, planning_time))
}

