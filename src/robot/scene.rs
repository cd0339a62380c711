// robot/scene.rs

// Scene snapshots and the monitor that produces them. A snapshot is an
// immutable, internally consistent view of the robot at one instant; requests
// take exactly one and read from it for their whole duration.

use log::{debug, info};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use super::model::KinematicModel;
use super::state::KinematicState;
use crate::{ConfigError, SceneError};

/// Read-only view of the robot and its planning frame.
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    planning_frame: String,
    state: KinematicState,
    captured_at: SystemTime,
}

impl SceneSnapshot {
    /// Wraps a state; the planning frame comes from its model.
    pub fn new(state: KinematicState) -> Self {
        SceneSnapshot {
            planning_frame: state.model().planning_frame().to_string(),
            state,
            captured_at: SystemTime::now(),
        }
    }

    /// Frame all positions derived from this snapshot are expressed in
    pub fn planning_frame(&self) -> &str {
        &self.planning_frame
    }

    /// Robot state at capture time, transforms up to date
    pub fn robot_state(&self) -> &KinematicState {
        &self.state
    }

    /// Kinematic model of the robot
    pub fn model(&self) -> &Arc<KinematicModel> {
        self.state.model()
    }

    /// When the snapshot was taken
    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }
}

/// Anything that can hand out the current scene.
#[cfg_attr(test, mockall::automock)]
pub trait SceneProvider: Send + Sync {
    /// Takes a consistent snapshot of the current scene.
    fn current_snapshot(&self) -> Result<Arc<SceneSnapshot>, SceneError>;
}

struct MonitoredState {
    current: KinematicState,
    monitoring: bool,
    updates: u64,
}

/// Tracks the robot state and serves snapshots of it.
pub struct SceneMonitor {
    model: Arc<KinematicModel>,
    inner: RwLock<MonitoredState>,
}

impl SceneMonitor {
    /// Builds a monitor for the robot described by `description` (YAML).
    pub fn from_robot_description(description: &str) -> Result<Self, ConfigError> {
        let model = Arc::new(KinematicModel::from_yaml_str(description)?);
        Ok(Self::with_model(model))
    }

    /// Builds a monitor around an existing model.
    pub fn with_model(model: Arc<KinematicModel>) -> Self {
        let current = KinematicState::new(Arc::clone(&model));
        SceneMonitor {
            model,
            inner: RwLock::new(MonitoredState { current, monitoring: false, updates: 0 }),
        }
    }

    /// A scene is configured once its robot has at least one plannable group.
    pub fn is_configured(&self) -> bool {
        !self.model.groups().is_empty()
    }

    /// Kinematic model of the monitored robot
    pub fn model(&self) -> &Arc<KinematicModel> {
        &self.model
    }

    /// Starts serving snapshots, seeded with the default configuration.
    pub fn start_state_monitor(&self) -> Result<(), SceneError> {
        let mut inner = self.inner.write().map_err(|_| SceneError::Poisoned)?;
        if !inner.monitoring {
            inner.current = KinematicState::new(Arc::clone(&self.model));
            inner.monitoring = true;
            info!("State monitor started for robot '{}'", self.model.name());
        }
        Ok(())
    }

    /// Whether [`start_state_monitor`](Self::start_state_monitor) has been called
    pub fn is_monitoring(&self) -> bool {
        self.inner.read().map(|i| i.monitoring).unwrap_or(false)
    }

    /// Applies a joint-state update. Names the model does not know are skipped.
    pub fn update_joint_positions(&self, names: &[String], positions: &[f64]) -> Result<usize, SceneError> {
        let mut inner = self.inner.write().map_err(|_| SceneError::Poisoned)?;
        let mut applied = 0;
        for (name, &value) in names.iter().zip(positions) {
            match inner.current.set_joint_position(name, value) {
                Ok(()) => applied += 1,
                Err(e) => debug!("Ignoring joint state entry: {}", e),
            }
        }
        if applied > 0 {
            inner.current.update_all_transforms();
            inner.updates += 1;
        }
        Ok(applied)
    }

    /// Number of joint-state updates applied so far
    pub fn update_count(&self) -> u64 {
        self.inner.read().map(|i| i.updates).unwrap_or(0)
    }
}

impl SceneProvider for SceneMonitor {
    fn current_snapshot(&self) -> Result<Arc<SceneSnapshot>, SceneError> {
        let inner = self.inner.read().map_err(|_| SceneError::Poisoned)?;
        if !inner.monitoring {
            return Err(SceneError::NotMonitoring);
        }
        Ok(Arc::new(SceneSnapshot::new(inner.current.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::model::tests::TWO_LINK_ARM;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn snapshot_requires_running_state_monitor() {
        let monitor = SceneMonitor::from_robot_description(TWO_LINK_ARM).unwrap();
        assert!(monitor.is_configured());
        assert!(matches!(monitor.current_snapshot(), Err(SceneError::NotMonitoring)));

        monitor.start_state_monitor().unwrap();
        let snapshot = monitor.current_snapshot().unwrap();
        assert_eq!(snapshot.planning_frame(), "base_link");
    }

    #[test]
    fn joint_updates_reach_later_snapshots_only() {
        let monitor = SceneMonitor::from_robot_description(TWO_LINK_ARM).unwrap();
        monitor.start_state_monitor().unwrap();
        let before = monitor.current_snapshot().unwrap();

        let names = vec!["shoulder".to_string(), "bogus".to_string()];
        let applied = monitor.update_joint_positions(&names, &[std::f64::consts::PI, 1.0]).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(monitor.update_count(), 1);

        let after = monitor.current_snapshot().unwrap();
        assert_relative_eq!(before.robot_state().link_position("tool").unwrap(), Point3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(
            after.robot_state().link_position("tool").unwrap(),
            Point3::new(-2.0, 0.0, 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn robot_without_groups_is_not_configured() {
        let monitor = SceneMonitor::from_robot_description("name: bare\nroot_link: base\n").unwrap();
        assert!(!monitor.is_configured());
    }
}
