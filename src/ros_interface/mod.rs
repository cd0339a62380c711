//! ROS 2 interface for the planner node
//!
//! This module handles all communication with ROS 2, including:
//! - Reading the robot description parameter
//! - Serving the plan and benchmark services
//! - Publishing explored-state markers and benchmark metrics
//! - Tracking joint states for the scene monitor

mod messages;
mod publisher;
mod subscriber;

pub use messages::{benchmark_request_from_ros, plan_request_from_ros, plan_response_to_ros, to_marker_array};
pub use publisher::MarkerPublisher;

use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use futures::{Stream, StreamExt};
use log::{error, info, warn};
use r2r::moveit_msgs::srv::GetMotionPlan;
use r2r::{Context, Node, ParameterValue, QosProfile, ServiceRequest};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::planning::{PlanErrorCode, PlanningEngine};
use crate::service::{Dispatcher, PlanningService};
use crate::{PlannerConfig, PlannerError};
use messages::bare_response;

/// ROS error types
#[derive(Debug, thiserror::Error)]
pub enum RosError {
    /// Error raised by the ROS client library
    #[error("ROS error: {0}")]
    Client(#[from] r2r::Error),
    /// A service task could not be started
    #[error("cannot spawn task: {0}")]
    Spawn(String),
}

impl From<RosError> for PlannerError {
    fn from(e: RosError) -> Self {
        PlannerError::Ros(e.to_string())
    }
}

/// The `ompl_planning` node before it starts serving.
pub struct PlannerNode {
    node: Node,
    config: PlannerConfig,
}

impl PlannerNode {
    /// Creates the ROS node named in the configuration.
    pub fn create(config: PlannerConfig) -> Result<Self, RosError> {
        let context = Context::create()?;
        let node = Node::create(context, &config.node_name, "")?;
        info!("ROS 2 node '{}' initialized", config.node_name);
        Ok(PlannerNode { node, config })
    }

    /// Robot description parameter, if set to a string.
    pub fn robot_description(&self) -> Option<String> {
        let params = self.node.params.lock().ok()?;
        match params.get(&self.config.robot_description_param).map(|p| &p.value) {
            Some(ParameterValue::String(text)) => Some(text.clone()),
            Some(other) => {
                warn!("Parameter '{}' is not a string: {:?}", self.config.robot_description_param, other);
                None
            }
            None => None,
        }
    }

    /// Advertises the marker array topic.
    pub fn marker_publisher(&mut self) -> Result<MarkerPublisher, RosError> {
        let topic = private_name(&self.config.visualization.topic);
        Ok(MarkerPublisher::new(&mut self.node, &topic, self.config.visualization.queue_depth)?)
    }

    /// Registers the services, reports status and spins until shut down.
    pub fn serve<E: PlanningEngine + 'static>(mut self, service: PlanningService<E>) -> Result<(), RosError> {
        let PlanningService { monitor, dispatcher } = service;
        let model = Arc::clone(monitor.model());
        let frame = model.planning_frame().to_string();

        let plan_requests = self
            .node
            .create_service::<GetMotionPlan::Service>(&private_name(&self.config.plan_service), QosProfile::default())?;
        let benchmark_requests = self
            .node
            .create_service::<GetMotionPlan::Service>(&private_name(&self.config.benchmark_service), QosProfile::default())?;
        let results = self.node.create_publisher::<r2r::std_msgs::msg::String>(
            &private_name(&self.config.benchmark_results_topic),
            QosProfile::default(),
        )?;
        let joint_states = subscriber::joint_state_stream(&mut self.node, &self.config.joint_states_topic)?;

        dispatcher.report_status();
        let dispatcher = Arc::new(Mutex::new(dispatcher));

        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        spawner
            .spawn_local(subscriber::track_joint_states(joint_states, Arc::clone(&monitor)))
            .map_err(|e| RosError::Spawn(e.to_string()))?;

        let plan_dispatcher = Arc::clone(&dispatcher);
        let plan_model = Arc::clone(&model);
        let plan_frame = frame.clone();
        spawner
            .spawn_local(serve_requests(plan_requests, move |req| {
                let group = req.group_name.clone();
                let request = match plan_request_from_ros(&req, &plan_model) {
                    Ok(request) => request,
                    Err(code) => return bare_response(&group, code, 0.0),
                };
                match lock(&plan_dispatcher).and_then(|mut d| d.handle_plan(&request).map_err(|e| e.to_string())) {
                    Ok(outcome) => plan_response_to_ros(&group, &plan_frame, &outcome.response),
                    Err(e) => {
                        error!("Planning request not dispatched: {}", e);
                        bare_response(&group, PlanErrorCode::PlanningFailed, 0.0)
                    }
                }
            }))
            .map_err(|e| RosError::Spawn(e.to_string()))?;

        let bench_dispatcher = Arc::clone(&dispatcher);
        let bench_model = Arc::clone(&model);
        spawner
            .spawn_local(serve_requests(benchmark_requests, move |req| {
                let group = req.group_name.clone();
                let request = match benchmark_request_from_ros(&req, &bench_model) {
                    Ok(request) => request,
                    Err(code) => return bare_response(&group, code, 0.0),
                };
                match lock(&bench_dispatcher).and_then(|mut d| d.handle_benchmark(&request).map_err(|e| e.to_string())) {
                    Ok(outcome) => {
                        let result = &outcome.result;
                        match serde_yaml::to_string(result) {
                            Ok(data) => {
                                if let Err(e) = results.publish(&r2r::std_msgs::msg::String { data }) {
                                    warn!("Failed to publish benchmark results: {}", e);
                                }
                            }
                            Err(e) => warn!("Failed to encode benchmark results: {}", e),
                        }
                        let code = if outcome.success { PlanErrorCode::Success } else { PlanErrorCode::PlanningFailed };
                        bare_response(&group, code, result.mean_planning_time())
                    }
                    Err(e) => {
                        error!("Benchmark request not dispatched: {}", e);
                        bare_response(&group, PlanErrorCode::PlanningFailed, 0.0)
                    }
                }
            }))
            .map_err(|e| RosError::Spawn(e.to_string()))?;

        info!("Serving '{}' and '{}'", self.config.plan_service, self.config.benchmark_service);
        loop {
            self.node.spin_once(Duration::from_millis(100));
            pool.run_until_stalled();
        }
    }
}

fn private_name(name: &str) -> String {
    format!("~/{}", name.trim_start_matches('/'))
}

fn lock<E: PlanningEngine>(
    dispatcher: &Mutex<Dispatcher<E>>,
) -> Result<std::sync::MutexGuard<'_, Dispatcher<E>>, String> {
    dispatcher.lock().map_err(|_| "dispatcher lock poisoned".to_string())
}

/// Answers every request on `requests` with `handle`, one at a time.
async fn serve_requests<F>(mut requests: impl Stream<Item = ServiceRequest<GetMotionPlan::Service>> + Unpin, mut handle: F)
where
    F: FnMut(r2r::moveit_msgs::msg::MotionPlanRequest) -> r2r::moveit_msgs::msg::MotionPlanResponse,
{
    while let Some(req) = requests.next().await {
        let response = handle(req.message.motion_plan_request.clone());
        if let Err(e) = req.respond(GetMotionPlan::Response { motion_plan_response: response }) {
            warn!("Failed to send service response: {}", e);
        }
    }
}

