//! OMPL planner front end
//!
//! Serves motion-planning and benchmarking requests on top of a pluggable
//! planning engine and renders the states the engine explored during each
//! solve as sphere markers tracing one robot link, computed with forward
//! kinematics over the robot's kinematic model.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod robot;
mod error;
pub mod planning;
#[cfg(feature = "ros")]
pub mod ros_interface;
pub mod service;
pub mod visualization;

// Re-export commonly used items for easier access
pub use robot::{KinematicModel, KinematicState, SceneMonitor, SceneProvider, SceneSnapshot};
pub use error::{
    ConfigError, DispatchError, KinematicsError, PublishError, ResolveError, SceneError, VisualizationError,
};
pub use planning::{InterpolationConfig, InterpolationEngine, PlanRequest, PlanResponse, PlanningEngine};
pub use service::{Dispatcher, PlanningService, PostSolveHook, SolveEvent, bootstrap};
pub use visualization::{ColorRgba, ExplorationVisualizer, MarkerBatch, MarkerSink, MemorySink};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration of the planner node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Node name
    pub node_name: String,
    /// Plan service name, inside the node's private namespace
    pub plan_service: String,
    /// Benchmark service name, inside the node's private namespace
    pub benchmark_service: String,
    /// Topic benchmark metrics are published on as YAML
    pub benchmark_results_topic: String,
    /// Name of the parameter holding the robot description
    pub robot_description_param: String,
    /// File read when the parameter is unset
    pub robot_description_file: Option<PathBuf>,
    /// Joint state topic feeding the scene monitor
    pub joint_states_topic: String,
    /// Explored-state visualization
    pub visualization: VisualizationConfig,
    /// Bundled interpolation engine
    pub engine: InterpolationConfig,
}

/// Explored-state visualization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Register the visualizer at all
    pub enabled: bool,
    /// Link whose positions are traced
    pub link_name: String,
    /// Marker array topic, inside the node's private namespace
    pub topic: String,
    /// Marker namespace
    pub namespace: String,
    /// Sphere diameter
    pub scale: f64,
    /// Sphere color
    pub color: ColorRgba,
    /// Marker lifetime in seconds
    pub lifetime_secs: f64,
    /// Publisher queue depth
    pub queue_depth: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            node_name: "ompl_planning".to_string(),
            plan_service: "plan_kinematic_path".to_string(),
            benchmark_service: "benchmark_planning_problem".to_string(),
            benchmark_results_topic: "benchmark_results".to_string(),
            robot_description_param: "robot_description".to_string(),
            robot_description_file: None,
            joint_states_topic: "/joint_states".to_string(),
            visualization: VisualizationConfig::default(),
            engine: InterpolationConfig::default(),
        }
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        VisualizationConfig {
            enabled: true,
            link_name: "r_wrist_roll_link".to_string(),
            topic: "visualization_marker_array".to_string(),
            namespace: "planner_data".to_string(),
            scale: 0.035,
            color: ColorRgba::RED,
            lifetime_secs: 10.0,
            queue_depth: 5,
        }
    }
}

impl VisualizationConfig {
    /// Marker lifetime as a [`Duration`]; must be positive and representable.
    pub fn lifetime(&self) -> Result<Duration, ConfigError> {
        match Duration::try_from_secs_f64(self.lifetime_secs) {
            Ok(lifetime) if !lifetime.is_zero() => Ok(lifetime),
            _ => Err(ConfigError::InvalidValue {
                field: "visualization.lifetime_secs".to_string(),
                reason: format!("must be a positive duration, got {}", self.lifetime_secs),
            }),
        }
    }
}

impl PlannerConfig {
    /// Parses a YAML configuration; missing fields take their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PlannerConfig = serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io { path: path.to_path_buf(), reason: e.to_string() })?;
        Self::from_yaml_str(&text)
    }

    /// Checks values serde cannot constrain. Loading runs this; configurations
    /// built in code are checked again by [`bootstrap`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let viz = &self.visualization;
        if viz.enabled && viz.link_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "visualization.link_name".to_string(),
                reason: "must name a link".to_string(),
            });
        }
        if !(viz.scale.is_finite() && viz.scale > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "visualization.scale".to_string(),
                reason: format!("must be positive, got {}", viz.scale),
            });
        }
        viz.lifetime()?;
        Ok(())
    }
}

/// Planner service error types
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    /// Startup configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Scene could not be read
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
    /// Request could not be dispatched
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    /// Transport failure
    #[error("ROS error: {0}")]
    Ros(String),
}
