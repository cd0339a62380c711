// End-to-end checks of the planning service: bootstrap, plan and benchmark
// dispatch, and the marker batches the exploration visualizer publishes.

use approx::assert_relative_eq;
use ompl_planner::planning::{BenchmarkRequest, JointGoal, PlanErrorCode};
use ompl_planner::visualization::MarkerShape;
use ompl_planner::{
    ColorRgba, ConfigError, InterpolationEngine, MemorySink, PlanRequest, PlannerConfig, PlannerError, PlanningService,
    bootstrap,
};
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;

const ARM: &str = r#"
name: planar_arm
root_link: base_link
joints:
  - name: shoulder
    type: revolute
    parent: base_link
    child: upper_arm
    axis: [0, 0, 1]
    limits: { lower: -3.14, upper: 3.14 }
  - name: elbow
    type: revolute
    parent: upper_arm
    child: forearm
    origin: { xyz: [1.0, 0, 0] }
    axis: [0, 0, 1]
    limits: { lower: -3.14, upper: 3.14 }
  - name: wrist_fixed
    type: fixed
    parent: forearm
    child: tool
    origin: { xyz: [1.0, 0, 0] }
groups:
  - name: arm
    joints: [shoulder, elbow]
"#;

struct Harness {
    service: PlanningService<InterpolationEngine>,
    sink: Arc<MemorySink>,
}

fn harness_with(config: PlannerConfig) -> Harness {
    let sink = Arc::new(MemorySink::new());
    let service = bootstrap(&config, ARM, sink.clone()).unwrap();
    Harness { service, sink }
}

fn tool_config() -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.visualization.link_name = "tool".to_string();
    config
}

#[fixture]
fn harness() -> Harness {
    harness_with(tool_config())
}

fn request(start: [f64; 2], goal: [f64; 2]) -> PlanRequest {
    PlanRequest {
        group_name: "arm".to_string(),
        start_positions: Some(start.to_vec()),
        goal: JointGoal { positions: goal.to_vec(), tolerance: 1e-3 },
        allowed_planning_time: 5.0,
        num_planning_attempts: 1,
    }
}

#[rstest]
fn successful_plan_publishes_one_marker_per_explored_state(mut harness: Harness) {
    // Two steps of 0.05 rad on the shoulder: three explored states
    let outcome = harness.service.dispatcher.handle_plan(&request([0.0, 0.0], [0.1, 0.0])).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.response.error_code, PlanErrorCode::Success);

    let batches = harness.sink.batches();
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.frame_id, "base_link");
    assert_eq!(batch.namespace, "planner_data");

    for (i, marker) in batch.markers.iter().enumerate() {
        assert_eq!(marker.id, i);
        assert_eq!(marker.frame_id, batch.frame_id);
        assert_eq!(marker.stamp, batch.stamp);
        assert_eq!(marker.namespace, "planner_data");
        assert_eq!(marker.shape, MarkerShape::Sphere);
        assert_eq!(marker.color, ColorRgba::RED);
        assert_relative_eq!(marker.scale.x, 0.035);
        assert_relative_eq!(marker.scale.y, 0.035);
        assert_relative_eq!(marker.scale.z, 0.035);
        assert!(marker.lifetime > Duration::ZERO);

        let angle = 0.05 * i as f64;
        assert_relative_eq!(marker.position.x, 2.0 * angle.cos(), epsilon = 1e-9);
        assert_relative_eq!(marker.position.y, 2.0 * angle.sin(), epsilon = 1e-9);
        assert_relative_eq!(marker.position.z, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn failed_plan_still_visualizes_partial_exploration() {
    // A budget of 8 samples per second for 0.25 s stops after two samples
    let mut config = tool_config();
    config.engine.max_samples_per_second = 8.0;
    let mut harness = harness_with(config);

    let mut req = request([0.0, 0.0], [0.5, 0.0]);
    req.allowed_planning_time = 0.25;
    let outcome = harness.service.dispatcher.handle_plan(&req).unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.response.error_code, PlanErrorCode::Timeout);
    assert!(outcome.response.trajectory.is_none());

    let batches = harness.sink.batches();
    assert_eq!(batches.len(), 1);
    let ids: Vec<_> = batches[0].markers.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![0, 1]);
}

#[rstest]
#[case::zero_budget(request([0.0, 0.0], [0.1, 0.0]), 0.0)]
#[case::goal_out_of_bounds(request([0.0, 0.0], [4.0, 0.0]), 5.0)]
fn nothing_explored_means_nothing_published(
    mut harness: Harness,
    #[case] mut req: PlanRequest,
    #[case] allowed_planning_time: f64,
) {
    req.allowed_planning_time = allowed_planning_time;
    let outcome = harness.service.dispatcher.handle_plan(&req).unwrap();
    assert!(!outcome.success);
    assert!(harness.sink.batches().is_empty());
}

#[test]
fn unresolvable_link_leaves_the_response_untouched() {
    let mut config = PlannerConfig::default();
    config.visualization.link_name = "r_wrist_roll_link".to_string();
    let mut harness = harness_with(config);

    let outcome = harness.service.dispatcher.handle_plan(&request([0.0, 0.0], [0.1, 0.0])).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.response.trajectory.map(|t| t.points.len()), Some(3));
    assert!(harness.sink.batches().is_empty());
}

#[rstest]
fn benchmark_publishes_no_markers(mut harness: Harness) {
    let bench = BenchmarkRequest { problem: request([0.0, 0.0], [0.1, 0.0]), runs: 3, label: "straight".to_string() };
    let outcome = harness.service.dispatcher.handle_benchmark(&bench).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.result.label, "straight");
    assert_eq!(outcome.result.runs.len(), 3);
    assert_eq!(outcome.result.success_count(), 3);
    assert_relative_eq!(outcome.result.mean_path_length(), 0.1, epsilon = 1e-9);
    assert!(harness.sink.batches().is_empty());

    let status = harness.service.dispatcher.report_status();
    assert_eq!(status.benchmarks_served, 1);
    assert_eq!(status.plans_served, 0);
}

#[rstest]
fn sequential_requests_never_reuse_earlier_states(mut harness: Harness) {
    let dispatcher = &mut harness.service.dispatcher;

    dispatcher.handle_plan(&request([0.0, 0.0], [0.1, 0.0])).unwrap();

    // Unknown group: the engine explores nothing, so nothing new is published
    let mut unknown = request([0.0, 0.0], [0.1, 0.0]);
    unknown.group_name = "gripper".to_string();
    let outcome = dispatcher.handle_plan(&unknown).unwrap();
    assert_eq!(outcome.response.error_code, PlanErrorCode::InvalidGroupName);

    // One step on the elbow: two states, both with the tool near (2, 0)
    dispatcher.handle_plan(&request([0.0, 0.0], [0.0, 0.05])).unwrap();

    let batches = harness.sink.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 3);
    assert_eq!(batches[1].len(), 2);
    assert_relative_eq!(batches[1].markers[1].position.x, 1.0 + 0.05_f64.cos(), epsilon = 1e-9);
    assert_relative_eq!(batches[1].markers[1].position.y, 0.05_f64.sin(), epsilon = 1e-9);
    assert_eq!(harness.service.dispatcher.report_status().plans_served, 3);
}

#[rstest]
#[case::empty("")]
#[case::not_yaml("robot: [unterminated")]
#[case::unknown_parent("name: r\nroot_link: base\njoints:\n  - { name: j, type: fixed, parent: nowhere, child: tip }\n")]
#[case::no_groups("name: r\nroot_link: base\n")]
fn invalid_robot_description_is_fatal(#[case] description: &str) {
    let sink = Arc::new(MemorySink::new());
    let result = bootstrap(&tool_config(), description, sink.clone());
    assert!(matches!(result, Err(PlannerError::Config(_))));
    assert!(sink.batches().is_empty());
}

#[test]
fn missing_robot_description_is_reported() {
    let result = ompl_planner::service::load_robot_description(None, &tool_config());
    assert!(matches!(result, Err(ConfigError::MissingRobotDescription)));
}

#[test]
fn configuration_round_trips_through_yaml() {
    let config = PlannerConfig::from_yaml_str(
        "visualization:\n  link_name: tool\n  lifetime_secs: 2.5\nengine:\n  max_step: 0.1\n",
    )
    .unwrap();
    assert_eq!(config.visualization.link_name, "tool");
    assert_relative_eq!(config.visualization.scale, 0.035);
    assert_relative_eq!(config.engine.max_step, 0.1);
    assert_eq!(config.plan_service, "plan_kinematic_path");

    let mut harness = harness_with(config);
    harness.service.dispatcher.handle_plan(&request([0.0, 0.0], [0.2, 0.0])).unwrap();
    let batches = harness.sink.batches();
    assert_eq!(batches[0].len(), 3);
    assert_eq!(batches[0].markers[0].lifetime, Duration::from_millis(2500));
}
