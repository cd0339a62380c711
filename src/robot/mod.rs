// robot/mod.rs

// Robot-side foundation for the planner service: the kinematic model loaded
// from the robot description, kinematic states with forward kinematics, and
// the scene monitor that serves consistent snapshots to request handlers.

pub mod model;
pub mod scene;
pub mod state;

pub use model::{JointKind, JointLimits, KinematicModel, RobotDescription};
pub use scene::{SceneMonitor, SceneProvider, SceneSnapshot};
pub use state::KinematicState;
