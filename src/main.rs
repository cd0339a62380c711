// src/main.rs
// Entry point for the `ompl_planning` node: loads the robot description,
// brings up the scene monitor and dispatcher, then serves plan and benchmark
// requests until the process is shut down.

use log::{error, info};
use ompl_planner::ros_interface::PlannerNode;
use ompl_planner::service::load_robot_description;
use ompl_planner::{MarkerSink, PlannerConfig, PlannerError, bootstrap};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    // Initialize logging for debugging
    env_logger::init();
    info!("Starting ompl_planning...");

    // Optional YAML configuration as the only argument
    let config = match std::env::args().nth(1) {
        Some(path) => match PlannerConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Cannot load configuration '{}': {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => PlannerConfig::default(),
    };

    let mut node = match PlannerNode::create(config.clone()) {
        Ok(node) => node,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let sink: Arc<dyn MarkerSink> = match node.marker_publisher() {
        Ok(publisher) => Arc::new(publisher),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // No services are registered unless the scene is fully configured
    let service = match load_robot_description(node.robot_description(), &config)
        .map_err(PlannerError::from)
        .and_then(|description| bootstrap(&config, &description, sink))
    {
        Ok(service) => service,
        Err(e) => {
            error!("Planning scene not configured: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match node.serve(service) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
