// src/service/bootstrap.rs
// Startup sequence: robot description -> scene monitor -> dispatcher. Nothing
// is handed to a transport unless every step succeeded, so a broken robot
// description can never lead to registered plan or benchmark operations.

use log::{error, info};
use std::path::Path;
use std::sync::Arc;

use super::Dispatcher;
use crate::robot::{SceneMonitor, SceneProvider};
use crate::planning::{InterpolationEngine, PlanningEngine};
use crate::visualization::{ExplorationVisualizer, MarkerSink};
use crate::{ConfigError, PlannerConfig, PlannerError};

/// A configured scene monitor and the dispatcher bound to it.
pub struct PlanningService<E: PlanningEngine> {
    /// Monitor feeding snapshots to the dispatcher; transports push joint states into it
    pub monitor: Arc<SceneMonitor>,
    /// The request dispatcher
    pub dispatcher: Dispatcher<E>,
}

/// Picks the robot description: the parameter value when set, otherwise the
/// file named in the configuration.
pub fn load_robot_description(parameter: Option<String>, config: &PlannerConfig) -> Result<String, ConfigError> {
    if let Some(text) = parameter.filter(|t| !t.trim().is_empty()) {
        return Ok(text);
    }
    match &config.robot_description_file {
        Some(path) => read_description_file(path),
        None => Err(ConfigError::MissingRobotDescription),
    }
}

fn read_description_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.to_path_buf(), reason: e.to_string() })
}

/// Bootstraps with the bundled interpolation engine.
pub fn bootstrap(
    config: &PlannerConfig,
    robot_description: &str,
    sink: Arc<dyn MarkerSink>,
) -> Result<PlanningService<InterpolationEngine>, PlannerError> {
    let engine = InterpolationEngine::new(config.engine.clone())?;
    bootstrap_with_engine(config, robot_description, engine, sink)
}

/// Builds the scene monitor, checks it is configured, starts state tracking
/// and binds a dispatcher (plus the exploration visualizer when enabled).
pub fn bootstrap_with_engine<E: PlanningEngine>(
    config: &PlannerConfig,
    robot_description: &str,
    engine: E,
    sink: Arc<dyn MarkerSink>,
) -> Result<PlanningService<E>, PlannerError> {
    config.validate().inspect_err(|e| error!("Invalid planner configuration: {}", e))?;
    let monitor = SceneMonitor::from_robot_description(robot_description).inspect_err(|e| {
        error!("Planning scene not configured: {}", e);
    })?;
    if !monitor.is_configured() {
        error!("Planning scene not configured: robot '{}' has no joint groups", monitor.model().name());
        return Err(ConfigError::SceneNotConfigured(monitor.model().name().to_string()).into());
    }
    let monitor = Arc::new(monitor);
    monitor.start_state_monitor()?;

    let provider: Arc<dyn SceneProvider> = monitor.clone();
    let mut dispatcher = Dispatcher::new(engine, provider);
    if config.visualization.enabled {
        let visualizer = ExplorationVisualizer::from_config(&config.visualization, sink)?;
        info!("Visualizing explored states of link '{}'", visualizer.link_name());
        dispatcher.add_hook(Box::new(visualizer));
    }

    Ok(PlanningService { monitor, dispatcher })
}
