//! Exploration visualization.
//!
//! After every plan request the [`ExplorationVisualizer`] turns the engine's
//! explored states into sphere markers tracing one link, and hands the batch
//! to a [`MarkerSink`]. Visualization is diagnostic only; nothing here can
//! change the outcome of a request.

mod markers;
mod resolver;

pub use markers::{ColorRgba, MarkerBatch, MarkerRecord, MarkerShape, MarkerStyle, build_batch};
pub use resolver::{resolve_link_position, resolve_record};

use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::robot::SceneSnapshot;
use crate::planning::ExploredStateRecord;
use crate::service::{PostSolveHook, SolveEvent};
use crate::{ConfigError, PublishError, VisualizationConfig, VisualizationError};

/// Destination of marker batches.
#[cfg_attr(test, mockall::automock)]
pub trait MarkerSink: Send + Sync {
    /// Publishes one batch as a single message.
    fn publish(&self, batch: &MarkerBatch) -> Result<(), PublishError>;
}

/// Keeps published batches in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<MarkerBatch>>,
}

impl MemorySink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of every batch published so far, oldest first
    pub fn batches(&self) -> Vec<MarkerBatch> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl MarkerSink for MemorySink {
    fn publish(&self, batch: &MarkerBatch) -> Result<(), PublishError> {
        self.batches
            .lock()
            .map_err(|_| PublishError::Unavailable("memory sink lock poisoned".to_string()))?
            .push(batch.clone());
        Ok(())
    }
}

/// Post-solve hook rendering the explored states of one link.
pub struct ExplorationVisualizer {
    link_name: String,
    style: MarkerStyle,
    sink: Arc<dyn MarkerSink>,
}

impl ExplorationVisualizer {
    /// Visualizes `link_name` with `style`, publishing to `sink`.
    pub fn new(link_name: impl Into<String>, style: MarkerStyle, sink: Arc<dyn MarkerSink>) -> Self {
        ExplorationVisualizer { link_name: link_name.into(), style, sink }
    }

    /// Builds the visualizer described by the configuration.
    pub fn from_config(config: &VisualizationConfig, sink: Arc<dyn MarkerSink>) -> Result<Self, ConfigError> {
        let style = MarkerStyle {
            namespace: config.namespace.clone(),
            shape: MarkerShape::Sphere,
            scale: config.scale,
            color: config.color,
            lifetime: config.lifetime()?,
        };
        Ok(Self::new(config.link_name.clone(), style, sink))
    }

    /// Link whose positions are rendered
    pub fn link_name(&self) -> &str {
        &self.link_name
    }

    /// Resolves the record against the scene and builds one batch.
    pub fn build(&self, scene: &SceneSnapshot, record: &ExploredStateRecord) -> Result<MarkerBatch, VisualizationError> {
        if record.is_empty() {
            return Err(VisualizationError::NoExploredStates);
        }
        let resolved = resolve_record(scene.robot_state(), record, &self.link_name);
        build_batch(resolved, scene.planning_frame(), SystemTime::now(), &self.style).ok_or_else(|| {
            VisualizationError::NothingResolved { link: self.link_name.clone(), attempted: record.len() }
        })
    }

    /// Builds and publishes; returns how many markers went out.
    pub fn visualize(&self, scene: &SceneSnapshot, record: &ExploredStateRecord) -> Result<usize, VisualizationError> {
        let batch = self.build(scene, record)?;
        self.sink.publish(&batch)?;
        Ok(batch.len())
    }
}

impl PostSolveHook for ExplorationVisualizer {
    fn name(&self) -> &str {
        "exploration_visualizer"
    }

    fn after_solve(&mut self, event: &SolveEvent<'_>) {
        let Some(record) = event.explored else {
            debug!("No explored states retained for the last solve; nothing to visualize");
            return;
        };
        match self.visualize(event.scene, record) {
            Ok(count) => info!(
                "Published {} of {} explored states for link '{}'",
                count,
                record.len(),
                self.link_name
            ),
            Err(VisualizationError::NoExploredStates) => debug!("Last solve explored no states"),
            Err(e) => warn!("Explored-state visualization skipped: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::model::tests::TWO_LINK_ARM;
    use crate::robot::{KinematicModel, KinematicState};
    use std::time::Duration;

    fn scene() -> SceneSnapshot {
        let model = Arc::new(KinematicModel::from_yaml_str(TWO_LINK_ARM).unwrap());
        SceneSnapshot::new(KinematicState::new(model))
    }

    fn record(states: Vec<Vec<f64>>) -> ExploredStateRecord {
        ExploredStateRecord { group_name: "arm".into(), states }
    }

    #[test]
    fn publishes_one_batch_per_record() {
        let mut sink = MockMarkerSink::new();
        sink.expect_publish()
            .withf(|b| b.len() == 3 && b.frame_id == "base_link")
            .times(1)
            .returning(|_| Ok(()));
        let viz = ExplorationVisualizer::new("tool", MarkerStyle::default(), Arc::new(sink));

        let count = viz.visualize(&scene(), &record(vec![vec![0.0, 0.0], vec![0.1, 0.0], vec![0.2, 0.0]])).unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn unknown_link_publishes_nothing() {
        let mut sink = MockMarkerSink::new();
        sink.expect_publish().never();
        let viz = ExplorationVisualizer::new("gripper", MarkerStyle::default(), Arc::new(sink));

        let err = viz.visualize(&scene(), &record(vec![vec![0.0, 0.0]])).unwrap_err();
        assert!(matches!(err, VisualizationError::NothingResolved { attempted: 1, .. }));
        assert!(matches!(
            viz.visualize(&scene(), &record(Vec::new())),
            Err(VisualizationError::NoExploredStates)
        ));
    }

    #[test]
    fn sink_failure_is_reported() {
        let mut sink = MockMarkerSink::new();
        sink.expect_publish().returning(|_| Err(PublishError::Unavailable("down".into())));
        let viz = ExplorationVisualizer::new("tool", MarkerStyle::default(), Arc::new(sink));
        assert!(matches!(
            viz.visualize(&scene(), &record(vec![vec![0.0, 0.0]])),
            Err(VisualizationError::Publish(_))
        ));
    }

    #[test]
    fn config_drives_style() {
        let config = VisualizationConfig { link_name: "tool".into(), scale: 0.1, lifetime_secs: 2.5, ..Default::default() };
        let sink = Arc::new(MemorySink::new());
        let viz = ExplorationVisualizer::from_config(&config, sink.clone()).unwrap();
        viz.visualize(&scene(), &record(vec![vec![0.0, 0.0]])).unwrap();

        let batch = &sink.batches()[0];
        assert_eq!(batch.markers[0].lifetime, Duration::from_millis(2500));
        assert_eq!(batch.markers[0].scale.x, 0.1);
    }

    #[test]
    fn unrepresentable_lifetime_is_a_config_error() {
        for lifetime_secs in [1e20, f64::INFINITY, 0.0] {
            let config = VisualizationConfig { lifetime_secs, ..Default::default() };
            assert!(matches!(
                ExplorationVisualizer::from_config(&config, Arc::new(MemorySink::new())),
                Err(ConfigError::InvalidValue { .. })
            ));
        }
    }
}
